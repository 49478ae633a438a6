// src/sqlgen.rs

//! Dialect DDL builder.
//!
//! The core never parses or renders SQL on its own behalf; it hands a
//! [`Change`] to a [`DialectBuilder`] implementation and gets back text. The
//! default [`GenericDialect`] renders ANSI-flavored DDL and exists mainly so
//! the planner and its tests have something to drive without depending on a
//! concrete database crate.

use crate::diff::Change;
use crate::schema::{Column, ForeignKey, Index, Table, Type};
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq)]
pub struct UnsupportedType(pub String);

impl std::fmt::Display for UnsupportedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unsupported type: {}", self.0)
    }
}

impl std::error::Error for UnsupportedType {}

/// Accumulates a single SQL statement. Named after the fluent helpers real
/// dialect plug-ins reach for over and over: `p` appends a literal phrase,
/// `ident` quotes an identifier, `wrap` parenthesizes a sub-builder, and
/// `map_comma` joins a sequence with `, ` using a per-item closure.
#[derive(Debug, Default)]
pub struct Builder {
    buf: String,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn p(&mut self, phrase: &str) -> &mut Self {
        if !self.buf.is_empty() && !self.buf.ends_with(' ') && !phrase.is_empty() {
            self.buf.push(' ');
        }
        self.buf.push_str(phrase);
        self
    }

    pub fn ident(&mut self, dialect: &dyn DialectBuilder, name: &str) -> &mut Self {
        self.p(&dialect.quote_ident(name))
    }

    pub fn table(&mut self, dialect: &dyn DialectBuilder, table: &Table) -> &mut Self {
        self.ident(dialect, &table.name)
    }

    pub fn wrap(&mut self, f: impl FnOnce(&mut Builder)) -> &mut Self {
        let mut inner = Builder::new();
        f(&mut inner);
        if self.buf.ends_with(' ') || self.buf.is_empty() {
            let _ = write!(self.buf, "({})", inner.buf);
        } else {
            let _ = write!(self.buf, " ({})", inner.buf);
        }
        self
    }

    pub fn map_comma<T>(&mut self, items: &[T], f: impl Fn(&mut Builder, &T)) -> &mut Self {
        let mut inner = Builder::new();
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                inner.buf.push_str(", ");
            }
            f(&mut inner, item);
        }
        self.p(&inner.buf)
    }

    pub fn build(&self) -> String {
        self.buf.clone()
    }
}

/// What changed about an `ALTER TABLE ... RENAME` statement a dialect's own
/// SQL parser recognized. The core has no SQL parser of its own; a dialect
/// plug-in that does may implement [`RenameParser`] to feed rename
/// recognition back into the planner (§4.E step 4).
#[derive(Debug, Clone, PartialEq)]
pub enum RenameHint {
    Column { table: String, from: String, to: String },
    Index { from: String, to: String },
    Table { from: String, to: String },
}

/// No-op by default: most dialects never see raw client SQL to parse.
pub trait RenameParser {
    fn parse_rename(&self, _stmt: &str) -> Option<RenameHint> {
        None
    }
}

/// One rendered change: forward statement, optional reverse, and an
/// optional human comment. `transactional = false` signals the statement
/// cannot run inside a multi-statement transaction on this dialect (e.g.
/// `CREATE INDEX CONCURRENTLY` on Postgres).
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub cmd: String,
    pub reverse: Option<String>,
    pub comment: Option<String>,
    pub transactional: bool,
}

pub trait DialectBuilder {
    fn format_type(&self, ty: &Type) -> Result<String, UnsupportedType>;
    fn parse_type(&self, raw: &str) -> Type;
    fn quote_ident(&self, name: &str) -> String;

    /// Renders one change to SQL. `table` supplies the enclosing table's
    /// name when `change` is scoped under a `ModifyTable` (needed to render
    /// `CREATE INDEX ... ON <table>`, for instance); top-level changes like
    /// `AddTable`/`DropTable` pass `None`. Returning `None` tells the
    /// planner this dialect has nothing to say about the change (it is
    /// dropped silently from the plan -- used for changes that exist purely
    /// as bookkeeping, like `ModifyAttr` on dialects with no matching
    /// pragma).
    fn render(&self, change: &Change, table: Option<&str>) -> Option<Rendered>;
}

/// ANSI-ish reference dialect. Good enough to drive planner tests; real
/// deployments are expected to supply their own [`DialectBuilder`].
pub struct GenericDialect;

impl GenericDialect {
    fn column_def(&self, col: &Column) -> String {
        let mut b = Builder::new();
        b.ident(self, &col.name);
        b.p(&self.format_type(&col.ty).unwrap_or_else(|_| col.raw_type.clone()));
        if !col.nullable {
            b.p("NOT NULL");
        }
        if let Some(default) = &col.default {
            b.p("DEFAULT");
            b.p(&render_default(default));
        }
        b.build()
    }

    fn index_def(&self, idx: &Index, table_name: &str) -> String {
        let mut b = Builder::new();
        b.p(if idx.unique { "CREATE UNIQUE INDEX" } else { "CREATE INDEX" });
        b.ident(self, &idx.name);
        b.p("ON");
        b.ident(self, table_name);
        b.wrap(|inner| {
            inner.map_comma(&idx.parts, |b, part| {
                match &part.target {
                    crate::schema::IndexPartTarget::Column(name) => {
                        b.ident(self, name);
                    }
                    crate::schema::IndexPartTarget::Expr(expr) => {
                        b.p(expr);
                    }
                }
                if part.desc {
                    b.p("DESC");
                }
            });
        });
        if let Some(predicate) = &idx.predicate {
            b.p("WHERE");
            b.p(predicate);
        }
        b.build()
    }

    fn foreign_key_def(&self, fk: &ForeignKey) -> String {
        let mut b = Builder::new();
        b.p("CONSTRAINT");
        b.ident(self, &fk.symbol);
        b.p("FOREIGN KEY");
        b.wrap(|inner| {
            inner.map_comma(&fk.columns, |b, c| {
                b.ident(self, c);
            });
        });
        b.p("REFERENCES");
        b.ident(self, &fk.ref_table);
        b.wrap(|inner| {
            inner.map_comma(&fk.ref_columns, |b, c| {
                b.ident(self, c);
            });
        });
        if fk.on_update != crate::schema::ReferenceOption::NoAction {
            b.p("ON UPDATE");
            b.p(fk.on_update.as_str());
        }
        if fk.on_delete != crate::schema::ReferenceOption::NoAction {
            b.p("ON DELETE");
            b.p(fk.on_delete.as_str());
        }
        b.build()
    }
}

fn render_default(default: &crate::schema::ColumnDefault) -> String {
    use crate::schema::ColumnDefault::*;
    match default {
        Literal(s) => format!("'{s}'"),
        RawExpr(s) => s.clone(),
        Named { inner, .. } => render_default(inner),
    }
}

impl DialectBuilder for GenericDialect {
    fn format_type(&self, ty: &Type) -> Result<String, UnsupportedType> {
        Ok(match ty {
            Type::Bool => "BOOLEAN".to_string(),
            Type::Integer { bits, unsigned } => {
                let base = match bits {
                    16 => "SMALLINT",
                    32 => "INTEGER",
                    64 => "BIGINT",
                    other => return Err(UnsupportedType(format!("integer({other})"))),
                };
                if *unsigned {
                    format!("{base} UNSIGNED")
                } else {
                    base.to_string()
                }
            }
            Type::Decimal { precision, scale } => format!("DECIMAL({precision},{scale})"),
            Type::Float { bits: 32 } => "REAL".to_string(),
            Type::Float { .. } => "DOUBLE PRECISION".to_string(),
            Type::String { size: Some(n) } => format!("VARCHAR({n})"),
            Type::String { size: None } => "TEXT".to_string(),
            Type::Binary { size: Some(n) } => format!("VARBINARY({n})"),
            Type::Binary { size: None } => "BLOB".to_string(),
            Type::Time { precision } => format!("TIMESTAMP({precision})"),
            Type::Json => "JSON".to_string(),
            Type::Spatial => "GEOMETRY".to_string(),
            Type::Uuid => "UUID".to_string(),
            Type::Enum { name, .. } => name.clone().unwrap_or_else(|| "TEXT".to_string()),
            Type::Unsupported { raw } => return Err(UnsupportedType(raw.clone())),
        })
    }

    fn parse_type(&self, raw: &str) -> Type {
        let upper = raw.trim().to_uppercase();
        match upper.as_str() {
            "BOOLEAN" | "BOOL" => Type::Bool,
            "SMALLINT" => Type::Integer { bits: 16, unsigned: false },
            "INTEGER" | "INT" => Type::Integer { bits: 32, unsigned: false },
            "BIGINT" => Type::Integer { bits: 64, unsigned: false },
            "REAL" => Type::Float { bits: 32 },
            "DOUBLE PRECISION" => Type::Float { bits: 64 },
            "TEXT" => Type::String { size: None },
            "BLOB" => Type::Binary { size: None },
            "JSON" => Type::Json,
            "UUID" => Type::Uuid,
            _ => Type::Unsupported { raw: raw.to_string() },
        }
    }

    fn quote_ident(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn render(&self, change: &Change, table: Option<&str>) -> Option<Rendered> {
        match change {
            Change::AddSchema { name } => Some(Rendered {
                cmd: format!("CREATE SCHEMA {}", self.quote_ident(name)),
                reverse: Some(format!("DROP SCHEMA {}", self.quote_ident(name))),
                comment: None,
                transactional: true,
            }),
            Change::DropSchema { name } => Some(Rendered {
                cmd: format!("DROP SCHEMA {}", self.quote_ident(name)),
                reverse: None,
                comment: None,
                transactional: true,
            }),
            Change::AddTable { table } => {
                let mut b = Builder::new();
                b.p("CREATE TABLE");
                b.table(self, table);
                b.wrap(|inner| {
                    inner.map_comma(&table.columns, |b, c| {
                        b.p(&self.column_def(c));
                    });
                });
                Some(Rendered {
                    cmd: b.build(),
                    reverse: Some(format!("DROP TABLE {}", self.quote_ident(&table.name))),
                    comment: None,
                    transactional: true,
                })
            }
            Change::DropTable { table } => Some(Rendered {
                cmd: format!("DROP TABLE {}", self.quote_ident(&table.name)),
                reverse: None,
                comment: None,
                transactional: true,
            }),
            Change::AddColumn { column } => Some(Rendered {
                cmd: format!("ADD COLUMN {}", self.column_def(column)),
                reverse: Some(format!("DROP COLUMN {}", self.quote_ident(&column.name))),
                comment: None,
                transactional: true,
            }),
            Change::DropColumn { column } => Some(Rendered {
                cmd: format!("DROP COLUMN {}", self.quote_ident(&column.name)),
                reverse: None,
                comment: None,
                transactional: true,
            }),
            Change::ModifyColumn { to, .. } => Some(Rendered {
                cmd: format!("ALTER COLUMN {}", self.column_def(to)),
                reverse: None,
                comment: None,
                transactional: true,
            }),
            Change::AddIndex { index } => {
                let cmd = match table {
                    Some(name) => self.index_def(index, name),
                    None => {
                        let mut b = Builder::new();
                        b.p(if index.unique { "CREATE UNIQUE INDEX" } else { "CREATE INDEX" });
                        b.ident(self, &index.name);
                        b.build()
                    }
                };
                Some(Rendered {
                    cmd,
                    reverse: Some(format!("DROP INDEX {}", self.quote_ident(&index.name))),
                    comment: None,
                    transactional: true,
                })
            }
            Change::DropIndex { index } => Some(Rendered {
                cmd: format!("DROP INDEX {}", self.quote_ident(&index.name)),
                reverse: None,
                comment: None,
                transactional: true,
            }),
            Change::AddForeignKey { fk } => Some(Rendered {
                cmd: format!("ADD {}", self.foreign_key_def(fk)),
                reverse: Some(format!("DROP CONSTRAINT {}", self.quote_ident(&fk.symbol))),
                comment: None,
                transactional: true,
            }),
            Change::DropForeignKey { fk } => Some(Rendered {
                cmd: format!("DROP CONSTRAINT {}", self.quote_ident(&fk.symbol)),
                reverse: None,
                comment: None,
                transactional: true,
            }),
            Change::AddCheck { check } => {
                let name = check.name.as_deref().unwrap_or("");
                Some(Rendered {
                    cmd: format!("ADD CONSTRAINT {} CHECK ({})", self.quote_ident(name), check.expr),
                    reverse: check.name.as_ref().map(|n| format!("DROP CONSTRAINT {}", self.quote_ident(n))),
                    comment: None,
                    transactional: true,
                })
            }
            Change::DropCheck { check } => check.name.as_ref().map(|n| Rendered {
                cmd: format!("DROP CONSTRAINT {}", self.quote_ident(n)),
                reverse: None,
                comment: None,
                transactional: true,
            }),
            Change::RenameTable { from, to } => Some(Rendered {
                cmd: format!("ALTER TABLE {} RENAME TO {}", self.quote_ident(from), self.quote_ident(to)),
                reverse: Some(format!("ALTER TABLE {} RENAME TO {}", self.quote_ident(to), self.quote_ident(from))),
                comment: None,
                transactional: true,
            }),
            Change::RenameColumn { from, to } => Some(Rendered {
                cmd: format!("RENAME COLUMN {} TO {}", self.quote_ident(from), self.quote_ident(to)),
                reverse: Some(format!("RENAME COLUMN {} TO {}", self.quote_ident(to), self.quote_ident(from))),
                comment: None,
                transactional: true,
            }),
            Change::RenameIndex { from, to } => Some(Rendered {
                cmd: format!("ALTER INDEX {} RENAME TO {}", self.quote_ident(from), self.quote_ident(to)),
                reverse: Some(format!("ALTER INDEX {} RENAME TO {}", self.quote_ident(to), self.quote_ident(from))),
                comment: None,
                transactional: true,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;

    #[test]
    fn builder_wrap_parenthesizes_and_map_comma_joins() {
        let mut b = Builder::new();
        b.p("CREATE INDEX x ON t");
        b.wrap(|inner| {
            inner.map_comma(&["a", "b"], |b, item| {
                b.p(item);
            });
        });
        assert_eq!(b.build(), "CREATE INDEX x ON t (a, b)");
    }

    #[test]
    fn generic_dialect_formats_sized_string() {
        let dialect = GenericDialect;
        assert_eq!(
            dialect.format_type(&Type::String { size: Some(255) }).unwrap(),
            "VARCHAR(255)"
        );
    }

    #[test]
    fn generic_dialect_rejects_unsupported_integer_width() {
        let dialect = GenericDialect;
        assert!(dialect
            .format_type(&Type::Integer { bits: 8, unsigned: false })
            .is_err());
    }

    #[test]
    fn render_add_table_emits_reverse_drop() {
        let dialect = GenericDialect;
        let mut table = Table::new("users");
        table.add_column(Column::new("id", Type::Integer { bits: 64, unsigned: false }).not_null());
        let change = Change::AddTable { table };
        let rendered = dialect.render(&change, None).unwrap();
        assert!(rendered.cmd.starts_with("CREATE TABLE"));
        assert_eq!(rendered.reverse.as_deref(), Some("DROP TABLE \"users\""));
    }

    #[test]
    fn render_drop_table_has_no_reverse() {
        let dialect = GenericDialect;
        let change = Change::DropTable { table: Table::new("users") };
        let rendered = dialect.render(&change, None).unwrap();
        assert!(rendered.reverse.is_none());
    }
}
