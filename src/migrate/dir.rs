// src/migrate/dir.rs

//! A filesystem-backed migration directory: ordered migration files plus a
//! content-addressed sum file (`atlas.sum`) that binds the ordered set of
//! filenames to their hashes so any drift is caught before it is applied.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::hash::{hash_bytes, Hash};
use crate::migrate::lexer::{self, StmtDecl};

const SUM_FILE: &str = "atlas.sum";

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("migration file {0:?} does not exist")]
    NotExist(String),

    #[error("checksum mismatch: directory contents do not match {SUM_FILE}")]
    Checksum,

    #[error("{SUM_FILE} is malformed at line {0}: {1:?}")]
    MalformedSumFile(usize, String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// One migration file. `name` is `<version>_<description>.<ext>`; `version`
/// is the portion up to the first `_`, `desc` is everything after it
/// (extension included).
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl File {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), bytes }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        self.name.split('_').next().unwrap_or(&self.name)
    }

    pub fn desc(&self) -> &str {
        match self.name.split_once('_') {
            Some((_, rest)) => rest,
            None => "",
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// SQL statements with comments stripped and directives removed from
    /// the visible text, split at statement terminators.
    pub fn stmts(&self) -> Vec<String> {
        lexer::stmts(&self.text())
    }

    /// Same split as [`Self::stmts`] but keeping each statement's leading
    /// comments (with parsed directives) and its byte offset in the file.
    pub fn stmt_decls(&self) -> Vec<StmtDecl> {
        lexer::lex(&self.text()).stmts
    }

    /// Whether this file carries a leading `-- atlas:checkpoint` directive.
    pub fn is_checkpoint(&self) -> bool {
        lexer::lex(&self.text()).is_checkpoint
    }

    pub fn checkpoint_label(&self) -> Option<String> {
        lexer::lex(&self.text()).checkpoint_label
    }

    pub fn hash(&self) -> Hash {
        hash_bytes(&self.bytes)
    }
}

/// One line of the sum file plus the trailing whole-directory `h1:` line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HashFile {
    pub entries: Vec<(String, Hash)>,
    pub sum: Hash,
}

impl HashFile {
    /// Renders the sum file exactly as it is written to disk: one
    /// `<base64-sha256>  <filename>` line per entry (lex order), then a
    /// terminating `h1:<base64-sha256-of-the-above>` line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, hash) in &self.entries {
            out.push_str(hash.as_str());
            out.push_str("  ");
            out.push_str(name);
            out.push('\n');
        }
        out.push_str("h1:");
        out.push_str(self.sum.as_str());
        out.push('\n');
        out
    }

    fn compute(entries: Vec<(String, Hash)>) -> Self {
        let mut body = String::new();
        for (name, hash) in &entries {
            body.push_str(hash.as_str());
            body.push_str("  ");
            body.push_str(name);
            body.push('\n');
        }
        let sum = hash_bytes(body.as_bytes());
        Self { entries, sum }
    }

    fn parse(text: &str) -> DirectoryResult<Self> {
        let mut entries = Vec::new();
        let mut sum = None;
        let lines: Vec<&str> = text.lines().collect();
        for (i, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix("h1:") {
                let hash = Hash::parse(rest)
                    .ok_or_else(|| DirectoryError::MalformedSumFile(i + 1, line.to_string()))?;
                sum = Some(hash);
                continue;
            }
            let mut parts = line.splitn(2, "  ");
            let (digest, name) = match (parts.next(), parts.next()) {
                (Some(d), Some(n)) => (d, n),
                _ => return Err(DirectoryError::MalformedSumFile(i + 1, line.to_string())),
            };
            let hash = Hash::parse(digest)
                .ok_or_else(|| DirectoryError::MalformedSumFile(i + 1, line.to_string()))?;
            entries.push((name.to_string(), hash));
        }
        let sum = sum.ok_or_else(|| DirectoryError::MalformedSumFile(lines.len(), String::new()))?;
        Ok(Self { entries, sum })
    }
}

/// Contract a migration directory implementation fulfills. The bundled
/// [`LocalDir`] backs it with a plain filesystem directory; other backends
/// (embedded assets, a VCS checkout) implement the same trait.
pub trait Directory {
    fn files(&self) -> DirectoryResult<Vec<File>>;
    fn write_file(&mut self, name: &str, bytes: &[u8]) -> DirectoryResult<()>;
    fn open(&self, name: &str) -> DirectoryResult<File>;
    fn stat(&self, name: &str) -> DirectoryResult<bool>;
    fn checksum(&self) -> DirectoryResult<HashFile>;

    /// Recomputes the hash file and compares it to the one stored under
    /// [`SUM_FILE`]. Any mismatch -- added, removed, reordered, or edited
    /// files -- surfaces as [`DirectoryError::Checksum`].
    fn verify(&self) -> DirectoryResult<()> {
        let recomputed = self.checksum()?;
        let stored_bytes = match self.read_sum_file() {
            Ok(bytes) => bytes,
            Err(DirectoryError::NotExist(_)) => {
                warn!("no {SUM_FILE} present; treating directory as unverified");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let stored = HashFile::parse(&String::from_utf8_lossy(&stored_bytes))?;
        if stored != recomputed {
            return Err(DirectoryError::Checksum);
        }
        Ok(())
    }

    fn read_sum_file(&self) -> DirectoryResult<Vec<u8>>;
}

/// Plain filesystem-backed migration directory.
pub struct LocalDir {
    root: PathBuf,
}

impl LocalDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn is_migration_file(name: &str) -> bool {
        !name.starts_with('.') && name != SUM_FILE
    }
}

impl Directory for LocalDir {
    fn files(&self) -> DirectoryResult<Vec<File>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if Self::is_migration_file(&name) {
                names.push(name);
            }
        }
        names.sort();

        let mut files = Vec::with_capacity(names.len());
        for name in names {
            files.push(self.open(&name)?);
        }
        Ok(files)
    }

    fn write_file(&mut self, name: &str, bytes: &[u8]) -> DirectoryResult<()> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.path_for(name), bytes)?;
        debug!(file = name, bytes = bytes.len(), "wrote migration file");
        Ok(())
    }

    fn open(&self, name: &str) -> DirectoryResult<File> {
        let path = self.path_for(name);
        let bytes = fs::read(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                DirectoryError::NotExist(name.to_string())
            } else {
                DirectoryError::Io(e)
            }
        })?;
        Ok(File::new(name, bytes))
    }

    fn stat(&self, name: &str) -> DirectoryResult<bool> {
        Ok(self.path_for(name).is_file())
    }

    fn checksum(&self) -> DirectoryResult<HashFile> {
        let files = self.files()?;
        let entries = files.iter().map(|f| (f.name.clone(), f.hash())).collect();
        let hash_file = HashFile::compute(entries);
        fs::write(self.path_for(SUM_FILE), hash_file.render())?;
        Ok(hash_file)
    }

    fn read_sum_file(&self) -> DirectoryResult<Vec<u8>> {
        fs::read(self.path_for(SUM_FILE)).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                DirectoryError::NotExist(SUM_FILE.to_string())
            } else {
                DirectoryError::Io(e)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dir_with(files: &[(&str, &str)]) -> (TempDir, LocalDir) {
        let tmp = TempDir::new().unwrap();
        let mut dir = LocalDir::new(tmp.path());
        for (name, content) in files {
            dir.write_file(name, content.as_bytes()).unwrap();
        }
        (tmp, dir)
    }

    #[test]
    fn files_are_returned_in_lexicographic_order() {
        let (_tmp, dir) = dir_with(&[
            ("3_c.sql", "SELECT 3;"),
            ("1_a.sql", "SELECT 1;"),
            ("2_b.sql", "SELECT 2;"),
        ]);
        let names: Vec<_> = dir.files().unwrap().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["1_a.sql", "2_b.sql", "3_c.sql"]);
    }

    #[test]
    fn file_splits_version_and_description() {
        let file = File::new("20240102150000_add_users.sql", Vec::new());
        assert_eq!(file.version(), "20240102150000");
        assert_eq!(file.desc(), "add_users.sql");
    }

    #[test]
    fn checksum_round_trips_and_verifies() {
        let (_tmp, dir) = dir_with(&[("1_init.sql", "CREATE TABLE t (id INT);")]);
        dir.checksum().unwrap();
        dir.verify().unwrap();
    }

    #[test]
    fn editing_a_file_without_rehashing_fails_verification() {
        let (_tmp, mut dir) = dir_with(&[("1_init.sql", "CREATE TABLE t (id INT);")]);
        dir.checksum().unwrap();
        dir.write_file("1_init.sql", b"CREATE TABLE t (id BIGINT);").unwrap();
        assert!(matches!(dir.verify(), Err(DirectoryError::Checksum)));
    }

    #[test]
    fn adding_a_file_without_rehashing_fails_verification() {
        let (_tmp, mut dir) = dir_with(&[("1_init.sql", "CREATE TABLE t (id INT);")]);
        dir.checksum().unwrap();
        dir.write_file("2_more.sql", b"DROP TABLE t;").unwrap();
        assert!(matches!(dir.verify(), Err(DirectoryError::Checksum)));
    }

    #[test]
    fn checkpoint_directive_is_visible_on_the_file() {
        let (_tmp, dir) = dir_with(&[("1_snap.sql", "-- atlas:checkpoint\nCREATE TABLE t (id INT);")]);
        let file = dir.open("1_snap.sql").unwrap();
        assert!(file.is_checkpoint());
    }
}
