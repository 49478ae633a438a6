// src/inspect.rs

//! Reads an existing database's structure into a Schema Model. Dialect
//! specific; the core only consumes the trait and ships one reference,
//! fixture-only implementation behind the `sqlite` feature.

use bitflags::bitflags;
use glob::Pattern;
use thiserror::Error;

use crate::schema::{Realm, Schema};

#[derive(Debug, Error)]
pub enum InspectError {
    #[error("schema {0:?} does not exist")]
    NotExist(String),

    #[error("invalid exclude pattern {0:?}: {1}")]
    BadPattern(String, glob::PatternError),

    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type InspectResult<T> = Result<T, InspectError>;

bitflags! {
    /// Which kinds of objects to load. Zero (the `Default` value) means
    /// "everything" -- callers opt into a narrower scan by setting bits,
    /// they never need to OR every variant together to get the common case.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Mode: u32 {
        const SCHEMAS  = 1 << 0;
        const TABLES   = 1 << 1;
        const VIEWS    = 1 << 2;
        const FUNCS    = 1 << 3;
        const TYPES    = 1 << 4;
        const OBJECTS  = 1 << 5;
        const TRIGGERS = 1 << 6;
    }
}

impl Mode {
    fn wants(&self, bit: Mode) -> bool {
        self.is_empty() || self.contains(bit)
    }
}

/// One compiled `schema.table.column` exclude pattern, with an optional
/// `[type=kind]` selector restricting which object kind it applies to.
struct ExcludePattern {
    schema: Pattern,
    object: Pattern,
    column: Pattern,
    kind: Option<String>,
}

impl ExcludePattern {
    fn parse(raw: &str) -> InspectResult<Self> {
        let (body, kind) = match raw.rfind("[type=") {
            Some(idx) if raw.ends_with(']') => {
                (&raw[..idx], Some(raw[idx + 6..raw.len() - 1].to_string()))
            }
            _ => (raw, None),
        };
        let mut parts = body.splitn(3, '.');
        let schema = parts.next().unwrap_or("*");
        let object = parts.next().unwrap_or("*");
        let column = parts.next().unwrap_or("*");
        Ok(Self {
            schema: Pattern::new(schema).map_err(|e| InspectError::BadPattern(raw.to_string(), e))?,
            object: Pattern::new(object).map_err(|e| InspectError::BadPattern(raw.to_string(), e))?,
            column: Pattern::new(column).map_err(|e| InspectError::BadPattern(raw.to_string(), e))?,
            kind,
        })
    }

    fn matches_table(&self, schema: &str, table: &str) -> bool {
        self.schema.matches(schema)
            && self.object.matches(table)
            && self.kind.as_deref().is_none_or(|k| k == "table")
    }

    fn matches_view(&self, schema: &str, view: &str) -> bool {
        self.schema.matches(schema)
            && self.object.matches(view)
            && self.kind.as_deref().is_none_or(|k| k == "view")
    }

    fn matches_column(&self, schema: &str, table: &str, column: &str) -> bool {
        self.schema.matches(schema) && self.object.matches(table) && self.column.matches(column)
    }
}

/// Compiles and applies a set of exclude globs to a realm in place,
/// dropping matched tables/views wholesale and matched columns (plus any
/// index/foreign-key referencing them) from the rest.
pub fn exclude_realm(realm: &mut Realm, patterns: &[String]) -> InspectResult<()> {
    let compiled: Vec<ExcludePattern> =
        patterns.iter().map(|p| ExcludePattern::parse(p)).collect::<InspectResult<_>>()?;

    for schema in &mut realm.schemas {
        let schema_name = schema.name.clone();

        schema.tables.retain(|t| !compiled.iter().any(|p| p.matches_table(&schema_name, &t.name)));
        schema.views.retain(|v| !compiled.iter().any(|p| p.matches_view(&schema_name, &v.name)));

        for table in &mut schema.tables {
            let excluded_columns: Vec<String> = table
                .columns
                .iter()
                .filter(|c| compiled.iter().any(|p| p.matches_column(&schema_name, &table.name, &c.name)))
                .map(|c| c.name.clone())
                .collect();
            if excluded_columns.is_empty() {
                continue;
            }
            table.columns.retain(|c| !excluded_columns.contains(&c.name));
            table.indexes.retain(|idx| {
                !idx.parts.iter().any(|p| match &p.target {
                    crate::schema::IndexPartTarget::Column(name) => excluded_columns.contains(name),
                    crate::schema::IndexPartTarget::Expr(_) => false,
                })
            });
            table
                .foreign_keys
                .retain(|fk| !fk.columns.iter().any(|c| excluded_columns.contains(c)));
        }
    }
    Ok(())
}

/// Options shared by both realm- and schema-scoped inspection calls.
#[derive(Debug, Clone, Default)]
pub struct InspectOptions {
    pub schemas: Option<Vec<String>>,
    pub exclude: Vec<String>,
    pub mode: Mode,
}

/// Dialect-supplied read path from a live connection into the Schema
/// Model. The core never implements this for a real production database;
/// [`sqlite`] ships only as a fixture for exercising diff/plan/executor
/// against something that behaves like a database.
pub trait Inspector {
    fn inspect_realm(&self, opts: &InspectOptions) -> InspectResult<Realm>;
    fn inspect_schema(&self, name: &str, opts: &InspectOptions) -> InspectResult<Schema>;
}

#[cfg(feature = "sqlite")]
mod sqlite_inspector {
    use super::*;
    use crate::schema::{Column, Table};
    use rusqlite::Connection;

    /// Reads `sqlite_master` plus `PRAGMA table_info` into a single
    /// unnamed schema -- SQLite has no schema namespace of its own, so
    /// everything lands under `"main"`.
    pub struct SqliteInspector<'a> {
        conn: &'a Connection,
    }

    impl<'a> SqliteInspector<'a> {
        pub fn new(conn: &'a Connection) -> Self {
            Self { conn }
        }

        fn read_schema(&self, name: &str) -> InspectResult<Schema> {
            let mut schema = Schema::new(name);
            let mut stmt = self
                .conn
                .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")?;
            let table_names: Vec<String> =
                stmt.query_map([], |row| row.get(0))?.collect::<rusqlite::Result<_>>()?;

            for table_name in table_names {
                let mut table = Table::new(&table_name);
                let mut cols = self.conn.prepare(&format!("PRAGMA table_info({table_name})"))?;
                let rows = cols.query_map([], |row| {
                    let name: String = row.get(1)?;
                    let raw_type: String = row.get(2)?;
                    let notnull: i64 = row.get(3)?;
                    Ok((name, raw_type, notnull == 0))
                })?;
                for row in rows {
                    let (name, raw_type, nullable) = row?;
                    let mut column = Column::new(name, crate::schema::Type::Unsupported { raw: raw_type.clone() });
                    column.raw_type = raw_type;
                    column.nullable = nullable;
                    table.columns.push(column);
                }
                schema.tables.push(table);
            }
            Ok(schema)
        }
    }

    impl Inspector for SqliteInspector<'_> {
        fn inspect_realm(&self, opts: &InspectOptions) -> InspectResult<Realm> {
            let mut realm = Realm::new();
            if opts.mode.wants(Mode::TABLES) || opts.mode.wants(Mode::SCHEMAS) {
                realm.schemas.push(self.read_schema("main")?);
            }
            if !opts.exclude.is_empty() {
                exclude_realm(&mut realm, &opts.exclude)?;
            }
            Ok(realm)
        }

        fn inspect_schema(&self, name: &str, opts: &InspectOptions) -> InspectResult<Schema> {
            if name != "main" {
                return Err(InspectError::NotExist(name.to_string()));
            }
            let mut schema = self.read_schema(name)?;
            if !opts.exclude.is_empty() {
                let mut realm = Realm { schemas: vec![schema], attrs: Default::default() };
                exclude_realm(&mut realm, &opts.exclude)?;
                schema = realm.schemas.remove(0);
            }
            Ok(schema)
        }
    }
}

#[cfg(feature = "sqlite")]
pub use sqlite_inspector::SqliteInspector;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, Table, Type};

    fn sample_realm() -> Realm {
        let mut realm = Realm::new();
        let mut schema = Schema::new("shop");
        let mut t1 = Table::new("t1");
        t1.columns.push(Column::new("id", Type::Integer { bits: 64, unsigned: false }));
        t1.columns.push(Column::new("secret", Type::String { size: None }));
        schema.add_table(t1);
        schema.add_table(Table::new("t2"));
        schema.add_view(crate::schema::View::new("v1", "SELECT 1"));
        realm.add_schema(schema);
        realm
    }

    #[test]
    fn exclude_removes_matching_tables_in_matching_schemas() {
        let mut realm = sample_realm();
        exclude_realm(&mut realm, &["s*.t2".to_string()]).unwrap();
        let schema = realm.schema("shop").unwrap();
        assert!(schema.table("t1").is_some());
        assert!(schema.table("t2").is_none());
    }

    #[test]
    fn exclude_removes_matching_columns_across_all_tables() {
        let mut realm = sample_realm();
        exclude_realm(&mut realm, &["*.t1.secret".to_string()]).unwrap();
        let table = realm.schema("shop").unwrap().table("t1").unwrap();
        assert!(table.columns.iter().all(|c| c.name != "secret"));
        assert!(table.columns.iter().any(|c| c.name == "id"));
    }

    #[test]
    fn exclude_with_type_selector_restricts_to_views() {
        let mut realm = sample_realm();
        exclude_realm(&mut realm, &["*.*[type=view]".to_string()]).unwrap();
        let schema = realm.schema("shop").unwrap();
        assert!(schema.views.is_empty());
        assert!(schema.table("t1").is_some());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_inspector_reads_tables_and_columns() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE widgets (id INTEGER NOT NULL, name TEXT);").unwrap();
        let inspector = SqliteInspector::new(&conn);
        let realm = inspector.inspect_realm(&InspectOptions::default()).unwrap();
        let schema = realm.schema("main").unwrap();
        let table = schema.table("widgets").unwrap();
        assert_eq!(table.columns.len(), 2);
    }
}
