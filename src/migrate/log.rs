// src/migrate/log.rs

//! Structured reporting of executor progress. Mirrors the shape of a
//! progress-tracking trait with several interchangeable implementations
//! rather than hard-wiring one reporting style into the executor itself.

use std::sync::{Arc, Mutex};

use tracing::{error, info};

/// One migration file about to be (or having been) processed.
#[derive(Debug, Clone)]
pub struct FileEvent {
    pub name: String,
    pub version: String,
    pub skip: bool,
}

/// One statement within a file about to be (or having been) executed.
#[derive(Debug, Clone)]
pub struct StmtEvent {
    pub text: String,
    pub redacted: bool,
}

/// Events an executor run reports, in the order they occur. Mirrors the
/// phases a single `execute_to` call passes through: one `LogExecution`,
/// then for each file a `LogFile` followed by a `LogStmt` per statement,
/// closing with either `LogDone` or `LogError`.
pub trait Logger: Send + Sync {
    fn log_execution(&self, _from: &str, _to: &str) {}
    fn log_file(&self, _event: &FileEvent) {}
    fn log_stmt(&self, _event: &StmtEvent) {}
    fn log_error(&self, _file: &str, _err: &str) {}
    fn log_done(&self) {}
}

/// Reports nothing. Used when a caller wants `execute_*` without console or
/// log noise, e.g. a dry-run diff or a test harness.
#[derive(Debug, Default)]
pub struct SilentLogger;

impl Logger for SilentLogger {}

/// Emits one `tracing` event per callback, at a level appropriate to its
/// severity. The default logger for any executor that doesn't get handed
/// one explicitly.
#[derive(Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log_execution(&self, from: &str, to: &str) {
        info!(from, to, "executing migrations");
    }

    fn log_file(&self, event: &FileEvent) {
        if event.skip {
            info!(file = event.name, version = event.version, "skipping");
        } else {
            info!(file = event.name, version = event.version, "applying");
        }
    }

    fn log_stmt(&self, event: &StmtEvent) {
        if event.redacted {
            info!("executing statement (redacted)");
        } else {
            info!(stmt = %event.text, "executing statement");
        }
    }

    fn log_error(&self, file: &str, err: &str) {
        error!(file, error = err, "migration failed");
    }

    fn log_done(&self) {
        info!("migration run complete");
    }
}

/// One recorded call, captured by [`RecordingLogger`] for assertions in
/// tests without depending on `tracing`'s subscriber machinery.
#[derive(Debug, Clone, PartialEq)]
pub enum LogRecord {
    Execution { from: String, to: String },
    File(String),
    Stmt(String),
    Error { file: String, err: String },
    Done,
}

/// Collects every event into an in-memory vector. Grounded in the same
/// callback-capturing shape as a channel-backed progress reporter, but
/// simplified to a plain `Vec` guarded by a mutex since executor runs are
/// single-threaded from the caller's perspective.
#[derive(Debug, Default, Clone)]
pub struct RecordingLogger {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().clone()
    }

    fn push(&self, record: LogRecord) {
        self.records.lock().unwrap().push(record);
    }
}

impl Logger for RecordingLogger {
    fn log_execution(&self, from: &str, to: &str) {
        self.push(LogRecord::Execution { from: from.to_string(), to: to.to_string() });
    }

    fn log_file(&self, event: &FileEvent) {
        self.push(LogRecord::File(event.name.clone()));
    }

    fn log_stmt(&self, event: &StmtEvent) {
        self.push(LogRecord::Stmt(event.text.clone()));
    }

    fn log_error(&self, file: &str, err: &str) {
        self.push(LogRecord::Error { file: file.to_string(), err: err.to_string() });
    }

    fn log_done(&self) {
        self.push(LogRecord::Done);
    }
}

/// The no-op default wrapped in an `Arc<dyn Logger>`, for constructors that
/// want a sensible default without forcing every caller to pick one.
pub fn default_logger() -> Arc<dyn Logger> {
    Arc::new(TracingLogger)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_logger_captures_events_in_order() {
        let logger = RecordingLogger::new();
        logger.log_execution("", "20240101000000");
        logger.log_file(&FileEvent { name: "1_init.sql".to_string(), version: "1".to_string(), skip: false });
        logger.log_stmt(&StmtEvent { text: "CREATE TABLE t (id INT)".to_string(), redacted: false });
        logger.log_done();

        let records = logger.records();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0], LogRecord::Execution { from: "".to_string(), to: "20240101000000".to_string() });
        assert_eq!(records[3], LogRecord::Done);
    }

    #[test]
    fn silent_logger_accepts_all_calls_without_panicking() {
        let logger = SilentLogger;
        logger.log_execution("a", "b");
        logger.log_file(&FileEvent { name: "x".to_string(), version: "x".to_string(), skip: true });
        logger.log_error("x", "boom");
        logger.log_done();
    }
}
