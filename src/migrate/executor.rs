// src/migrate/executor.rs

//! Applies a migration directory to a target database, tracking progress in
//! a [`RevisionStore`] so a run can resume after a crash or partial failure.
//!
//! Construction, locking, and cancellation follow the same shape as a
//! typed-config engine that acquires an advisory lock with retry and polls
//! an `Arc<AtomicBool>` cancellation token between units of work, just
//! generalized from filesystem transactions to migration files.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::migrate::dir::{Directory, DirectoryError, File};
use crate::migrate::log::{default_logger, FileEvent, Logger, StmtEvent};
use crate::migrate::revision::{Revision, RevisionError, RevisionKind, RevisionStore};

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("executor construction requires a {0}")]
    MissingDependency(&'static str),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Revision(#[from] RevisionError),

    #[error("schema object {0:?} does not exist")]
    NotExist(String),

    #[error("history changed: statement hashes in {0:?} no longer match the persisted revision")]
    HistoryChanged(String),

    #[error("history is non-linear; these files precede the cut-off without an applied revision: {0:?}")]
    HistoryNonLinear(Vec<String>),

    #[error("revision references migration {version} ({description}), which is missing from the directory")]
    MissingMigration { version: String, description: String },

    #[error("database is not clean: {reason}")]
    NotClean { reason: String },

    #[error("could not acquire executor lock")]
    Locked,

    #[error("no plan to execute")]
    NoPlan,

    #[error("no pending migration files")]
    NoPendingFiles,

    #[error("revision {0:?} does not exist")]
    RevisionNotExist(String),

    #[error("execution cancelled")]
    Cancelled,

    #[error("statement failed in {file}: {source}")]
    Statement { file: String, source: Box<dyn std::error::Error + Send + Sync> },
}

pub type ExecResult<T> = Result<T, ExecError>;

/// How strictly file order must match applied-revision order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecOrder {
    /// Every file at or below the cut-off version must have a matching
    /// applied revision; a gap is a hard error.
    #[default]
    Linear,
    /// Files below the cut-off without a revision are silently skipped.
    LinearSkip,
    /// Files below the cut-off without a revision become pending, allowing
    /// out-of-order execution.
    NonLinear,
}

/// How long to wait for the advisory execution lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTimeout {
    TryOnce,
    Forever,
    Bounded(Duration),
}

/// A database connection abstraction the executor drives statements
/// through. Kept minimal -- dialect-specific connection types implement
/// this rather than the executor depending on any one of them.
pub trait Driver {
    fn exec(&mut self, stmt: &str) -> ExecResult<()>;

    /// Whether the target database has no user objects. Used to decide
    /// whether an unbaselined run is safe to start.
    fn is_clean(&mut self) -> ExecResult<bool>;

    fn begin(&mut self) -> ExecResult<()> {
        Ok(())
    }

    fn commit(&mut self) -> ExecResult<()> {
        Ok(())
    }

    fn rollback(&mut self) -> ExecResult<()> {
        Ok(())
    }

    /// Acquires a named advisory lock. `Ok(true)` on success, `Ok(false)`
    /// if the timeout elapsed without acquiring it. Dialects with no
    /// locking primitive may leave this as the default no-op.
    fn lock(&mut self, _name: &str, _timeout: LockTimeout) -> ExecResult<bool> {
        Ok(true)
    }

    fn unlock(&mut self, _name: &str) -> ExecResult<()> {
        Ok(())
    }
}

/// Typed configuration for an [`Executor`], built with `Default` plus
/// builder methods rather than a loose argument list.
pub struct ExecutorOptions {
    pub logger: Arc<dyn Logger>,
    pub operator_version: String,
    pub allow_dirty: bool,
    pub baseline_version: Option<String>,
    pub exec_order: ExecOrder,
    pub from_version: Option<String>,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            logger: default_logger(),
            operator_version: env!("CARGO_PKG_VERSION").to_string(),
            allow_dirty: false,
            baseline_version: None,
            exec_order: ExecOrder::default(),
            from_version: None,
            cancel: None,
        }
    }
}

impl ExecutorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_operator_version(mut self, version: impl Into<String>) -> Self {
        self.operator_version = version.into();
        self
    }

    pub fn with_allow_dirty(mut self, allow: bool) -> Self {
        self.allow_dirty = allow;
        self
    }

    pub fn with_baseline_version(mut self, version: impl Into<String>) -> Self {
        self.baseline_version = Some(version.into());
        self
    }

    pub fn with_exec_order(mut self, order: ExecOrder) -> Self {
        self.exec_order = order;
        self
    }

    pub fn with_from_version(mut self, version: impl Into<String>) -> Self {
        self.from_version = Some(version.into());
        self
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.load(Ordering::Relaxed))
    }

    fn check_cancelled(&self) -> ExecResult<()> {
        if self.is_cancelled() {
            Err(ExecError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Resolves pending migration files against the revision log, applies them
/// to a [`Driver`], and records progress in a [`RevisionStore`].
pub struct Executor<D, S> {
    driver: D,
    dir: Box<dyn Directory>,
    store: S,
    opts: ExecutorOptions,
}

impl<D: Driver, S: RevisionStore> Executor<D, S> {
    pub fn new(driver: D, dir: Box<dyn Directory>, store: S, opts: ExecutorOptions) -> Self {
        Self { driver, dir, store, opts }
    }

    fn lock_name(&self) -> String {
        match self.store.ident() {
            Some(ident) => format!("atlas-migrate:{}", ident.name),
            None => "atlas-migrate".to_string(),
        }
    }

    /// Computes the ordered list of files still to execute (§4.H steps 1-8).
    pub fn pending(&mut self) -> ExecResult<Vec<File>> {
        self.dir.verify()?;
        self.store.init()?;

        let files = self.dir.files()?;
        let mut revisions = self.store.read_revisions()?;
        revisions.sort_by(|a, b| a.version.cmp(&b.version));

        let mut resume_head: Option<(File, Revision)> = None;
        if let Some(partial) = revisions.iter().find(|r| r.applied < r.total) {
            let file = files
                .iter()
                .find(|f| f.version() == partial.version)
                .cloned()
                .ok_or_else(|| ExecError::MissingMigration {
                    version: partial.version.clone(),
                    description: partial.description.clone(),
                })?;

            let stmts = file.stmts();
            for (i, hash) in partial.partial_hashes.iter().enumerate() {
                let expected = stmts.get(i).map(|s| crate::hash::hash_bytes(s.as_bytes()).to_string());
                if expected.as_deref() != Some(hash.as_str()) {
                    return Err(ExecError::HistoryChanged(file.name().to_string()));
                }
            }
            log::warn!(
                "resuming partially-applied migration {} at statement {}/{}",
                file.name(),
                partial.applied,
                partial.total
            );
            resume_head = Some((file, partial.clone()));
        }

        let has_baseline = revisions.iter().any(|r| r.kind.contains(RevisionKind::BASELINE));
        if !has_baseline && self.opts.baseline_version.is_none() && !self.opts.allow_dirty {
            let clean = self.driver.is_clean()?;
            if !clean {
                return Err(ExecError::NotClean {
                    reason: "target database is not empty and no baseline is recorded".to_string(),
                });
            }
        }
        // §4.H step 8: a provided BaselineVersion writes its synthetic
        // revision *before* the cut-off/applied set are computed, so it
        // takes effect within this same call rather than only on the next.
        if let Some(baseline_version) = self.opts.baseline_version.clone() {
            if !has_baseline {
                if let Some(file) = files.iter().find(|f| f.version() == baseline_version) {
                    let rev = Revision::baseline(file.version(), self.opts.operator_version.clone());
                    self.store.write_revision(&rev)?;
                    revisions.push(rev);
                }
            }
        }

        let cutoff = revisions
            .iter()
            .filter(|r| r.kind.contains(RevisionKind::BASELINE) || r.applied >= r.total)
            .map(|r| r.version.clone())
            .max();

        let applied_versions: std::collections::HashSet<&str> = revisions
            .iter()
            .filter(|r| r.applied >= r.total)
            .map(|r| r.version.as_str())
            .collect();

        let mut offending = Vec::new();
        let mut pending = Vec::new();

        // A file applied as part of a completed checkpoint hides every file
        // before it; only the most recent checkpoint's completeness matters.
        let last_applied_checkpoint = files
            .iter()
            .filter(|f| f.is_checkpoint() && applied_versions.contains(f.version()))
            .map(|f| f.version().to_string())
            .max();

        for file in &files {
            if let Some((head, _)) = &resume_head {
                if file.version() == head.version() {
                    pending.push(file.clone());
                    continue;
                }
            }
            if let Some(cp) = &last_applied_checkpoint {
                if file.version() < cp.as_str() {
                    continue;
                }
            }
            let below_cutoff = cutoff.as_deref().is_some_and(|c| file.version() <= c);
            let has_revision = applied_versions.contains(file.version());

            if !below_cutoff {
                pending.push(file.clone());
                continue;
            }
            if has_revision {
                continue;
            }
            match self.opts.exec_order {
                ExecOrder::Linear => offending.push(file.name().to_string()),
                ExecOrder::LinearSkip => continue,
                ExecOrder::NonLinear => pending.push(file.clone()),
            }
        }

        if !offending.is_empty() {
            return Err(ExecError::HistoryNonLinear(offending));
        }

        Ok(pending)
    }

    /// Applies the first `n` pending files (0 = all), honoring cancellation
    /// between files and resuming any partially-applied file by skipping
    /// statements already recorded in `partial_hashes`.
    pub fn execute_n(&mut self, n: usize) -> ExecResult<()> {
        let lock_name = self.lock_name();
        if !self.driver.lock(&lock_name, LockTimeout::Bounded(Duration::from_secs(10)))? {
            return Err(ExecError::Locked);
        }
        let result = self.execute_n_locked(n);
        let _ = self.driver.unlock(&lock_name);
        result
    }

    fn execute_n_locked(&mut self, n: usize) -> ExecResult<()> {
        let pending = self.pending()?;
        if pending.is_empty() {
            return Err(ExecError::NoPendingFiles);
        }
        let to_run = if n == 0 { pending.len() } else { n.min(pending.len()) };

        let from = self.current_version();
        let to = pending[to_run - 1].version().to_string();
        self.opts.logger.log_execution(&from, &to);

        for file in &pending[..to_run] {
            self.opts.check_cancelled()?;
            self.apply_file(file)?;
        }
        self.opts.logger.log_done();
        Ok(())
    }

    /// Applies files up to and including `version`; errors if no such file
    /// is pending.
    pub fn execute_to(&mut self, version: &str) -> ExecResult<()> {
        let lock_name = self.lock_name();
        if !self.driver.lock(&lock_name, LockTimeout::Bounded(Duration::from_secs(10)))? {
            return Err(ExecError::Locked);
        }
        let result = (|| {
            let pending = self.pending()?;
            let idx = pending
                .iter()
                .position(|f| f.version() == version)
                .ok_or_else(|| ExecError::MissingMigration {
                    version: version.to_string(),
                    description: String::new(),
                })?;
            let from = self.current_version();
            self.opts.logger.log_execution(&from, version);
            for file in &pending[..=idx] {
                self.opts.check_cancelled()?;
                self.apply_file(file)?;
            }
            self.opts.logger.log_done();
            Ok(())
        })();
        let _ = self.driver.unlock(&lock_name);
        result
    }

    fn current_version(&self) -> String {
        self.store
            .read_revisions()
            .ok()
            .and_then(|revs| revs.into_iter().filter(|r| r.applied >= r.total).map(|r| r.version).max())
            .unwrap_or_default()
    }

    /// Applies the directory's files, in lex order and up to `to_version`
    /// inclusive (or all of them, if `None`), directly against `driver`
    /// with no revision bookkeeping. The caller is responsible for
    /// guaranteeing `driver` addresses a fresh, clean sandbox; use it to
    /// validate a directory's integrity or to compute the schema a
    /// directory produces without touching a tracked database.
    pub fn replay(&mut self, to_version: Option<&str>) -> ExecResult<()> {
        self.dir.verify()?;
        if !self.driver.is_clean()? {
            return Err(ExecError::NotClean { reason: "replay target is not a fresh sandbox".to_string() });
        }
        let files = self.dir.files()?;
        for file in &files {
            self.opts.check_cancelled()?;
            info!(file = file.name(), "replaying migration file");
            for stmt in file.stmts() {
                self.driver.exec(&stmt).map_err(|e| match e {
                    ExecError::Statement { .. } => e,
                    other => ExecError::Statement { file: file.name().to_string(), source: Box::new(other) },
                })?;
            }
            if to_version.is_some_and(|v| file.version() == v) {
                break;
            }
        }
        Ok(())
    }

    fn apply_file(&mut self, file: &File) -> ExecResult<()> {
        let stmts = file.stmts();
        let mut revision = match self.store.read_revision(file.version()) {
            Ok(rev) => rev,
            Err(RevisionError::NotExist(_)) => Revision::new(file.version(), file.desc()),
            Err(e) => return Err(e.into()),
        };
        revision.kind |= RevisionKind::EXECUTE;
        revision.total = stmts.len();
        revision.hash = file.hash().to_string();
        revision.operator_version = self.opts.operator_version.clone();

        self.opts.logger.log_file(&FileEvent {
            name: file.name().to_string(),
            version: file.version().to_string(),
            skip: false,
        });
        info!(file = file.name(), "applying migration file");

        for (i, stmt) in stmts.iter().enumerate() {
            if i < revision.partial_hashes.len() {
                continue;
            }
            self.opts.check_cancelled()?;

            self.opts.logger.log_stmt(&StmtEvent { text: stmt.clone(), redacted: false });
            debug!(stmt = %stmt, "executing statement");

            match self.driver.exec(stmt) {
                Ok(()) => {
                    revision.partial_hashes.push(crate::hash::hash_bytes(stmt.as_bytes()).to_string());
                    revision.applied += 1;
                    self.store.write_revision(&revision)?;
                }
                Err(e) => {
                    revision.error = Some(e.to_string());
                    revision.error_stmt = Some(stmt.clone());
                    self.store.write_revision(&revision)?;
                    self.opts.logger.log_error(file.name(), &e.to_string());
                    warn!(file = file.name(), error = %e, "migration statement failed");
                    return Err(e);
                }
            }
        }

        revision.executed_at = Some(Utc::now());
        revision.error = None;
        revision.error_stmt = None;
        self.store.write_revision(&revision)?;
        Ok(())
    }
}

/// Renders `realm` as a single checkpoint file: every schema and table as
/// one `AddSchema`/`AddTable` plan, prefixed with the `atlas:checkpoint`
/// directive so the directory recognizes it as hiding everything before it.
pub fn checkpoint_file(
    name: &str,
    realm: &crate::schema::Realm,
    dialect: &dyn crate::sqlgen::DialectBuilder,
) -> ExecResult<String> {
    use crate::diff::Change;
    use crate::plan::{plan, PlanOptions};

    let mut changes = Vec::new();
    for schema in &realm.schemas {
        changes.push(Change::AddSchema { name: schema.name.clone() });
        for table in &schema.tables {
            changes.push(Change::AddTable { table: table.clone() });
        }
    }
    let rendered = plan(changes, &PlanOptions { dialect, schema_scope: None })
        .map_err(|e| ExecError::Statement { file: name.to_string(), source: Box::new(e) })?;

    let mut out = format!("-- atlas:checkpoint {name}\n");
    for change in &rendered.changes {
        out.push_str(&change.cmd);
        if !change.cmd.trim_end().ends_with(';') {
            out.push(';');
        }
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::dir::LocalDir;
    use crate::migrate::log::RecordingLogger;
    use crate::migrate::revision::MemoryRevisionStore;
    use tempfile::TempDir;

    struct FakeDriver {
        clean: bool,
        executed: Vec<String>,
        fail_on: Option<String>,
    }

    impl FakeDriver {
        fn new(clean: bool) -> Self {
            Self { clean, executed: Vec::new(), fail_on: None }
        }
    }

    impl Driver for FakeDriver {
        fn exec(&mut self, stmt: &str) -> ExecResult<()> {
            if self.fail_on.as_deref() == Some(stmt) {
                return Err(ExecError::Statement {
                    file: "".to_string(),
                    source: "boom".into(),
                });
            }
            self.executed.push(stmt.to_string());
            Ok(())
        }

        fn is_clean(&mut self) -> ExecResult<bool> {
            Ok(self.clean)
        }
    }

    fn dir_with(tmp: &TempDir, files: &[(&str, &str)]) -> Box<dyn Directory> {
        let mut dir = LocalDir::new(tmp.path());
        for (name, content) in files {
            dir.write_file(name, content.as_bytes()).unwrap();
        }
        dir.checksum().unwrap();
        Box::new(dir)
    }

    #[test]
    fn pending_returns_all_files_on_an_empty_clean_database() {
        let tmp = TempDir::new().unwrap();
        let dir = dir_with(&tmp, &[("1_init.sql", "CREATE TABLE t (id INT);")]);
        let mut exec = Executor::new(
            FakeDriver::new(true),
            dir,
            MemoryRevisionStore::new(),
            ExecutorOptions::new(),
        );
        let pending = exec.pending().unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn dirty_database_without_baseline_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let dir = dir_with(&tmp, &[("1_init.sql", "CREATE TABLE t (id INT);")]);
        let mut exec = Executor::new(
            FakeDriver::new(false),
            dir,
            MemoryRevisionStore::new(),
            ExecutorOptions::new(),
        );
        assert!(matches!(exec.pending(), Err(ExecError::NotClean { .. })));
    }

    #[test]
    fn baseline_version_excludes_files_at_or_below_it_in_the_same_call() {
        let tmp = TempDir::new().unwrap();
        let dir = dir_with(
            &tmp,
            &[
                ("1.a_init.sql", "CREATE TABLE a (id INT);"),
                ("2.10.x-20_mid.sql", "CREATE TABLE b (id INT);"),
                ("3_tail.sql", "CREATE TABLE c (id INT);"),
            ],
        );
        let mut exec = Executor::new(
            FakeDriver::new(false),
            dir,
            MemoryRevisionStore::new(),
            ExecutorOptions::new().with_baseline_version("2.10.x-20"),
        );
        let pending = exec.pending().unwrap();
        assert_eq!(pending.iter().map(|f| f.version()).collect::<Vec<_>>(), vec!["3"]);
    }

    #[test]
    fn allow_dirty_bypasses_the_clean_check() {
        let tmp = TempDir::new().unwrap();
        let dir = dir_with(&tmp, &[("1_init.sql", "CREATE TABLE t (id INT);")]);
        let mut exec = Executor::new(
            FakeDriver::new(false),
            dir,
            MemoryRevisionStore::new(),
            ExecutorOptions::new().with_allow_dirty(true),
        );
        assert_eq!(exec.pending().unwrap().len(), 1);
    }

    #[test]
    fn execute_n_applies_statements_and_records_a_revision() {
        let tmp = TempDir::new().unwrap();
        let dir = dir_with(&tmp, &[("1_init.sql", "CREATE TABLE t (id INT);\nINSERT INTO t VALUES (1);")]);
        let logger = RecordingLogger::new();
        let mut exec = Executor::new(
            FakeDriver::new(true),
            dir,
            MemoryRevisionStore::new(),
            ExecutorOptions::new().with_logger(Arc::new(logger.clone())),
        );
        exec.execute_n(0).unwrap();

        let revisions = exec.store.read_revisions().unwrap();
        assert_eq!(revisions.len(), 1);
        assert_eq!(revisions[0].applied, 2);
        assert_eq!(revisions[0].total, 2);
        assert!(!logger.records().is_empty());
    }

    #[test]
    fn execute_n_with_no_pending_files_errors() {
        let tmp = TempDir::new().unwrap();
        let dir = dir_with(&tmp, &[]);
        let mut exec = Executor::new(
            FakeDriver::new(true),
            dir,
            MemoryRevisionStore::new(),
            ExecutorOptions::new(),
        );
        assert!(matches!(exec.execute_n(0), Err(ExecError::NoPendingFiles)));
    }

    #[test]
    fn partial_failure_persists_resumable_progress() {
        let tmp = TempDir::new().unwrap();
        let dir = dir_with(
            &tmp,
            &[("1_init.sql", "CREATE TABLE t (id INT);\nBAD STATEMENT;\nINSERT INTO t VALUES (1);")],
        );
        let mut driver = FakeDriver::new(true);
        driver.fail_on = Some("BAD STATEMENT".to_string());
        let mut exec = Executor::new(driver, dir, MemoryRevisionStore::new(), ExecutorOptions::new());

        assert!(exec.execute_n(0).is_err());

        let revision = exec.store.read_revision("1").unwrap();
        assert_eq!(revision.applied, 1);
        assert_eq!(revision.total, 3);
        assert!(revision.error.is_some());
    }

    #[test]
    fn replay_applies_every_file_to_a_clean_sandbox() {
        let tmp = TempDir::new().unwrap();
        let dir = dir_with(&tmp, &[("1_init.sql", "CREATE TABLE t (id INT);"), ("2_more.sql", "ALTER TABLE t ADD name TEXT;")]);
        let mut exec = Executor::new(FakeDriver::new(true), dir, MemoryRevisionStore::new(), ExecutorOptions::new());
        exec.replay(None).unwrap();
        assert_eq!(exec.driver.executed, vec!["CREATE TABLE t (id INT)", "ALTER TABLE t ADD name TEXT"]);
    }

    #[test]
    fn replay_rejects_a_dirty_sandbox() {
        let tmp = TempDir::new().unwrap();
        let dir = dir_with(&tmp, &[("1_init.sql", "CREATE TABLE t (id INT);")]);
        let mut exec = Executor::new(FakeDriver::new(false), dir, MemoryRevisionStore::new(), ExecutorOptions::new());
        assert!(matches!(exec.replay(None), Err(ExecError::NotClean { .. })));
    }

    #[test]
    fn checkpoint_file_renders_a_directive_header_and_create_statements() {
        use crate::schema::{Realm, Schema, Table};
        use crate::sqlgen::GenericDialect;

        let mut realm = Realm::new();
        let mut schema = Schema::new("public");
        schema.add_table(Table::new("widgets"));
        realm.add_schema(schema);

        let rendered = checkpoint_file("20240101_snapshot", &realm, &GenericDialect).unwrap();
        assert!(rendered.starts_with("-- atlas:checkpoint 20240101_snapshot\n"));
        assert!(rendered.contains("widgets"));
    }
}
