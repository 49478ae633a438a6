// src/lib.rs

//! Dialect-neutral database schema management: a schema model, a diff
//! engine, a DDL planner, and a versioned migration engine with its own
//! executor, revision store, and migration-directory toolchain.
//!
//! # Architecture
//!
//! - Schema Model: in-memory, dialect-neutral representation of a realm's
//!   schemas, tables, views, funcs and procs ([`schema`])
//! - Inspector: reads a live database into a Schema Model ([`inspect`])
//! - Diff: compares two Schema Models into an ordered [`diff::Change`] list
//! - Planner: turns changes into an executable, dependency-ordered [`plan::Plan`]
//! - Migrate: a versioned migration directory, revision store, and executor
//!   that applies one against a database ([`migrate`])
//! - Dev-database Normalizer: canonicalizes a desired schema via sandbox
//!   round-trip ([`devdb`])

pub mod connection;
pub mod devdb;
pub mod diff;
mod error;
pub mod hash;
pub mod inspect;
pub mod migrate;
pub mod plan;
pub mod schema;
pub mod sqlgen;

pub use connection::{parse as parse_connection_url, ConnectionError, ConnectionInfo, ConnectionResult, DialectRegistry, Target};
pub use devdb::{normalize, DevDbError, DevDbResult, Sandbox, SourcePositions};
pub use diff::{realm_diff, schema_diff, table_diff, Change, ChangeKind, ChangeProto, DiffError, DiffOptions, DiffResult};
pub use error::{Error, Result};
pub use hash::{hash_bytes, hash_reader, Hash, Hasher};
pub use inspect::{exclude_realm, InspectError, InspectOptions, InspectResult, Inspector, Mode};
pub use migrate::{
    checkpoint_file, Directory, DirectoryError, Driver, ExecError, ExecOrder, Executor, ExecutorOptions, File,
    HashFile, LocalDir, Logger, LockTimeout, MemoryRevisionStore, Revision, RevisionError, RevisionKind,
    RevisionStore,
};
pub use plan::{plan, recognize_rename, Plan, PlanChange, PlanError, PlanOptions, PlanResult};
pub use schema::{Column, ForeignKey, Index, Realm, Schema, Table, Type, View};
pub use sqlgen::{DialectBuilder, GenericDialect, RenameHint, RenameParser, Rendered, UnsupportedType};

#[cfg(feature = "sqlite")]
pub use inspect::SqliteInspector;
#[cfg(feature = "sqlite")]
pub use migrate::SqliteRevisionStore;
