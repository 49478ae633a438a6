// src/migrate/mod.rs

//! Versioned migrations: an ordered directory of SQL files, a store that
//! remembers which ones have run, and an executor that reconciles the two
//! against a live database.

mod dir;
mod executor;
mod lexer;
mod log;
mod revision;

pub use dir::{Directory, DirectoryError, DirectoryResult, File, HashFile, LocalDir};
pub use executor::{checkpoint_file, Driver, ExecError, ExecOrder, ExecResult, Executor, ExecutorOptions, LockTimeout};
pub use lexer::{lex, stmts, Comment, LexResult, StmtDecl};
pub use log::{default_logger, FileEvent, LogRecord, Logger, RecordingLogger, SilentLogger, StmtEvent, TracingLogger};
pub use revision::{
    MemoryRevisionStore, Revision, RevisionError, RevisionKind, RevisionResult, RevisionStore, TableIdent,
};

#[cfg(feature = "sqlite")]
pub use revision::SqliteRevisionStore;
