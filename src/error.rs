// src/error.rs
//! Crate-root error type. Every public operation returns `Result<T>` with
//! this enum as its error currency; component-local error enums convert
//! in via `#[from]` rather than being returned directly.

use thiserror::Error;

use crate::connection::ConnectionError;
use crate::devdb::DevDbError;
use crate::diff::DiffError;
use crate::inspect::InspectError;
use crate::migrate::{DirectoryError, ExecError, RevisionError};
use crate::plan::PlanError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Diff(#[from] DiffError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Revision(#[from] RevisionError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Inspect(#[from] InspectError),

    #[error(transparent)]
    DevDb(#[from] DevDbError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("operation cancelled: {0}")]
    Cancelled(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
