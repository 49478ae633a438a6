// src/migrate/revision.rs

//! Persisted record of each migration file's application attempt, and the
//! storage interface the executor reads/writes it through.

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RevisionError {
    #[error("revision {0:?} does not exist")]
    NotExist(String),

    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type RevisionResult<T> = Result<T, RevisionError>;

bitflags! {
    /// What kind of application this revision records. Combinations outside
    /// the four defined bits are never produced by this crate but may be
    /// read back from a database another tool wrote to; they still need a
    /// text form (`unknown (<bits>)`) rather than a panic.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RevisionKind: u32 {
        const BASELINE = 1 << 0;
        const EXECUTE  = 1 << 1;
        const RESOLVED = 1 << 2;
    }
}

impl RevisionKind {
    /// Text form used in human-facing reports (`atlas migrate status`'s
    /// analog). Unknown combinations render as `unknown (<bits>)` so a
    /// corrupt or foreign-written row is visible instead of silently
    /// misreported.
    pub fn describe(&self) -> String {
        match *self {
            Self::BASELINE => "baseline".to_string(),
            Self::EXECUTE => "applied".to_string(),
            Self::RESOLVED => "manually set".to_string(),
            k if k.is_empty() => "0000".to_string(),
            k => format!("unknown ({})", k.bits()),
        }
    }
}

/// A persisted record of one migration file's application attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Revision {
    pub version: String,
    pub description: String,
    pub kind: RevisionKind,
    /// Statements successfully applied from this file.
    pub applied: usize,
    /// Statements present in the file at the time it was (first) applied.
    pub total: usize,
    /// Content hash of each already-applied statement, in order; used to
    /// detect tampering with a file between a partial failure and its
    /// resumed execution.
    pub partial_hashes: Vec<String>,
    pub error: Option<String>,
    pub error_stmt: Option<String>,
    pub executed_at: Option<DateTime<Utc>>,
    pub execution_time_ms: Option<i64>,
    /// Whole-file content hash at the time of apply.
    pub hash: String,
    pub operator_version: String,
}

impl Revision {
    pub fn new(version: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            description: description.into(),
            kind: RevisionKind::empty(),
            applied: 0,
            total: 0,
            partial_hashes: Vec::new(),
            error: None,
            error_stmt: None,
            executed_at: None,
            execution_time_ms: None,
            hash: String::new(),
            operator_version: String::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.applied >= self.total
    }

    pub fn baseline(version: impl Into<String>, operator_version: impl Into<String>) -> Self {
        Self {
            kind: RevisionKind::BASELINE,
            operator_version: operator_version.into(),
            executed_at: Some(Utc::now()),
            ..Self::new(version, "")
        }
    }
}

/// The physical location of a revision store, when one is meaningful (a
/// table name for a relational backend; absent for an in-memory one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableIdent {
    pub schema: Option<String>,
    pub name: String,
}

/// Storage contract for revisions. `init`/`exists` let the executor bootstrap
/// storage lazily rather than requiring a separate provisioning step.
pub trait RevisionStore {
    fn init(&mut self) -> RevisionResult<()>;
    fn exists(&self) -> RevisionResult<bool>;
    fn ident(&self) -> Option<TableIdent>;
    fn read_revisions(&self) -> RevisionResult<Vec<Revision>>;
    fn read_revision(&self, version: &str) -> RevisionResult<Revision>;
    fn write_revision(&mut self, revision: &Revision) -> RevisionResult<()>;
    fn delete_revision(&mut self, version: &str) -> RevisionResult<()>;
}

/// An in-memory store, mainly useful for tests and for `replay()`'s sandbox
/// runs where nothing should be persisted past the call.
#[derive(Debug, Default)]
pub struct MemoryRevisionStore {
    revisions: Vec<Revision>,
}

impl MemoryRevisionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RevisionStore for MemoryRevisionStore {
    fn init(&mut self) -> RevisionResult<()> {
        Ok(())
    }

    fn exists(&self) -> RevisionResult<bool> {
        Ok(true)
    }

    fn ident(&self) -> Option<TableIdent> {
        None
    }

    fn read_revisions(&self) -> RevisionResult<Vec<Revision>> {
        let mut revisions = self.revisions.clone();
        revisions.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(revisions)
    }

    fn read_revision(&self, version: &str) -> RevisionResult<Revision> {
        self.revisions
            .iter()
            .find(|r| r.version == version)
            .cloned()
            .ok_or_else(|| RevisionError::NotExist(version.to_string()))
    }

    fn write_revision(&mut self, revision: &Revision) -> RevisionResult<()> {
        match self.revisions.iter_mut().find(|r| r.version == revision.version) {
            Some(slot) => *slot = revision.clone(),
            None => self.revisions.push(revision.clone()),
        }
        Ok(())
    }

    fn delete_revision(&mut self, version: &str) -> RevisionResult<()> {
        self.revisions.retain(|r| r.version != version);
        Ok(())
    }
}

#[cfg(feature = "sqlite")]
mod sqlite_store {
    use super::*;
    use rusqlite::{params, Connection, OptionalExtension};

    /// SQLite-backed revision store. Bootstraps with a single
    /// `CREATE TABLE IF NOT EXISTS` plus an `ensure_columns` upgrade step --
    /// not a numbered migration ladder -- since this table has had one
    /// logical shape for the lifetime of the crate.
    pub struct SqliteRevisionStore<'a> {
        conn: &'a Connection,
        table: String,
    }

    impl<'a> SqliteRevisionStore<'a> {
        pub fn new(conn: &'a Connection) -> Self {
            Self { conn, table: "atlas_schema_revisions".to_string() }
        }

        fn ensure_columns(&self) -> rusqlite::Result<()> {
            let mut existing = std::collections::HashSet::new();
            let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({})", self.table))?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
            for name in rows {
                existing.insert(name?);
            }
            let wanted: &[(&str, &str)] = &[
                ("description", "TEXT NOT NULL DEFAULT ''"),
                ("kind", "INTEGER NOT NULL DEFAULT 0"),
                ("applied", "INTEGER NOT NULL DEFAULT 0"),
                ("total", "INTEGER NOT NULL DEFAULT 0"),
                ("partial_hashes", "TEXT NOT NULL DEFAULT ''"),
                ("error", "TEXT"),
                ("error_stmt", "TEXT"),
                ("executed_at", "TEXT"),
                ("execution_time_ms", "INTEGER"),
                ("hash", "TEXT NOT NULL DEFAULT ''"),
                ("operator_version", "TEXT NOT NULL DEFAULT ''"),
            ];
            for (name, decl) in wanted {
                if !existing.contains(*name) {
                    self.conn.execute(
                        &format!("ALTER TABLE {} ADD COLUMN {} {}", self.table, name, decl),
                        [],
                    )?;
                }
            }
            Ok(())
        }

        fn row_to_revision(row: &rusqlite::Row) -> rusqlite::Result<Revision> {
            let partial_hashes_raw: String = row.get("partial_hashes")?;
            let executed_at_raw: Option<String> = row.get("executed_at")?;
            Ok(Revision {
                version: row.get("version")?,
                description: row.get("description")?,
                kind: RevisionKind::from_bits_truncate(row.get::<_, i64>("kind")? as u32),
                applied: row.get::<_, i64>("applied")? as usize,
                total: row.get::<_, i64>("total")? as usize,
                partial_hashes: if partial_hashes_raw.is_empty() {
                    Vec::new()
                } else {
                    partial_hashes_raw.split(',').map(str::to_string).collect()
                },
                error: row.get("error")?,
                error_stmt: row.get("error_stmt")?,
                executed_at: executed_at_raw
                    .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                    .map(|dt| dt.with_timezone(&Utc)),
                execution_time_ms: row.get("execution_time_ms")?,
                hash: row.get("hash")?,
                operator_version: row.get("operator_version")?,
            })
        }
    }

    impl RevisionStore for SqliteRevisionStore<'_> {
        fn init(&mut self) -> RevisionResult<()> {
            self.conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} (version TEXT PRIMARY KEY)",
                self.table
            ))?;
            self.ensure_columns()?;
            Ok(())
        }

        fn exists(&self) -> RevisionResult<bool> {
            let count: i64 = self.conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name = ?1",
                params![self.table],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        }

        fn ident(&self) -> Option<TableIdent> {
            Some(TableIdent { schema: None, name: self.table.clone() })
        }

        fn read_revisions(&self) -> RevisionResult<Vec<Revision>> {
            let mut stmt = self
                .conn
                .prepare(&format!("SELECT * FROM {} ORDER BY version", self.table))?;
            let rows = stmt.query_map([], Self::row_to_revision)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        }

        fn read_revision(&self, version: &str) -> RevisionResult<Revision> {
            let mut stmt = self
                .conn
                .prepare(&format!("SELECT * FROM {} WHERE version = ?1", self.table))?;
            stmt.query_row(params![version], Self::row_to_revision)
                .optional()?
                .ok_or_else(|| RevisionError::NotExist(version.to_string()))
        }

        fn write_revision(&mut self, revision: &Revision) -> RevisionResult<()> {
            self.conn.execute(
                &format!(
                    "INSERT INTO {} (
                        version, description, kind, applied, total, partial_hashes,
                        error, error_stmt, executed_at, execution_time_ms, hash, operator_version
                    ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)
                    ON CONFLICT(version) DO UPDATE SET
                        description=excluded.description, kind=excluded.kind,
                        applied=excluded.applied, total=excluded.total,
                        partial_hashes=excluded.partial_hashes, error=excluded.error,
                        error_stmt=excluded.error_stmt, executed_at=excluded.executed_at,
                        execution_time_ms=excluded.execution_time_ms, hash=excluded.hash,
                        operator_version=excluded.operator_version",
                    self.table
                ),
                params![
                    revision.version,
                    revision.description,
                    revision.kind.bits() as i64,
                    revision.applied as i64,
                    revision.total as i64,
                    revision.partial_hashes.join(","),
                    revision.error,
                    revision.error_stmt,
                    revision.executed_at.map(|dt| dt.to_rfc3339()),
                    revision.execution_time_ms,
                    revision.hash,
                    revision.operator_version,
                ],
            )?;
            Ok(())
        }

        fn delete_revision(&mut self, version: &str) -> RevisionResult<()> {
            self.conn
                .execute(&format!("DELETE FROM {} WHERE version = ?1", self.table), params![version])?;
            Ok(())
        }
    }
}

#[cfg(feature = "sqlite")]
pub use sqlite_store::SqliteRevisionStore;
