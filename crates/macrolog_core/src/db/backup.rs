//! Snapshot and restore for the embedded store file.
//!
//! # Responsibility
//! - Restore the primary file from the backup at startup when the hosting
//!   environment wiped it between deployments.
//! - Write a fresh snapshot after each committed meal mutation.
//!
//! # Invariants
//! - Restore never overwrites an existing primary file.
//! - Snapshots go through the SQLite online-backup API, not a raw file
//!   copy: under WAL a committed write may still live in the `-wal`
//!   sidecar and a plain copy would lose it.
//! - The backup path only ever holds a complete image: snapshots are
//!   written to a temporary file and renamed into place.

use rusqlite::backup::Backup;
use rusqlite::{Connection, DatabaseName};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

const BACKUP_PAGES_PER_STEP: std::os::raw::c_int = 64;
const BACKUP_STEP_PAUSE: Duration = Duration::from_millis(50);

pub type BackupResult<T> = Result<T, BackupError>;

/// Backup subsystem failure. Never fatal to the triggering operation.
#[derive(Debug)]
pub enum BackupError {
    Io(std::io::Error),
    Sqlite(rusqlite::Error),
}

impl Display for BackupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "backup file operation failed: {err}"),
            Self::Sqlite(err) => write!(f, "backup engine failed: {err}"),
        }
    }
}

impl Error for BackupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Sqlite(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for BackupError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for BackupError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// What `restore_if_needed` found at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The primary file exists; the backup was not touched.
    PrimaryPresent,
    /// The primary was absent and has been recreated from the backup.
    Restored,
    /// Neither file exists; schema setup will create a fresh store.
    NothingToRestore,
}

/// Snapshot/restore coordinator for one primary/backup file pair.
pub struct BackupManager {
    primary: PathBuf,
    backup: PathBuf,
}

impl BackupManager {
    pub fn new(primary: impl Into<PathBuf>, backup: impl Into<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
            backup: backup.into(),
        }
    }

    pub fn primary_path(&self) -> &Path {
        &self.primary
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup
    }

    /// Copies backup over an absent primary; the primary always wins when
    /// both files exist.
    pub fn restore_if_needed(&self) -> BackupResult<RestoreOutcome> {
        if self.primary.exists() {
            return Ok(RestoreOutcome::PrimaryPresent);
        }
        if !self.backup.exists() {
            return Ok(RestoreOutcome::NothingToRestore);
        }

        // A wiped primary can leave orphaned WAL sidecars that would be
        // replayed into the restored file.
        for suffix in ["-wal", "-shm"] {
            let sidecar = path_with_suffix(&self.primary, suffix);
            if sidecar.exists() {
                std::fs::remove_file(&sidecar)?;
            }
        }

        if let Some(parent) = self.primary.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::copy(&self.backup, &self.primary)?;
        Ok(RestoreOutcome::Restored)
    }

    /// Writes a complete snapshot of the committed state visible on `conn`.
    ///
    /// Runs strictly after the triggering write's commit returned, so the
    /// resulting image always reflects a consistent past state.
    pub fn snapshot(&self, conn: &Connection) -> BackupResult<()> {
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;

        let staging = path_with_suffix(&self.backup, ".tmp");
        if staging.exists() {
            std::fs::remove_file(&staging)?;
        }

        {
            let mut dst = Connection::open(&staging)?;
            let backup = Backup::new_with_names(
                conn,
                DatabaseName::Main,
                &mut dst,
                DatabaseName::Main,
            )?;
            backup.run_to_completion(BACKUP_PAGES_PER_STEP, BACKUP_STEP_PAUSE, None)?;
        }

        std::fs::rename(&staging, &self.backup)?;
        Ok(())
    }
}

fn path_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(suffix);
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::{BackupManager, RestoreOutcome};
    use rusqlite::Connection;

    #[test]
    fn restore_reports_nothing_when_no_files_exist() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(dir.path().join("a.db"), dir.path().join("a.db.backup"));
        assert_eq!(
            manager.restore_if_needed().unwrap(),
            RestoreOutcome::NothingToRestore
        );
    }

    #[test]
    fn restore_never_overwrites_an_existing_primary() {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("a.db");
        let backup = dir.path().join("a.db.backup");
        std::fs::write(&primary, b"primary bytes").unwrap();
        std::fs::write(&backup, b"backup bytes").unwrap();

        let manager = BackupManager::new(&primary, &backup);
        assert_eq!(
            manager.restore_if_needed().unwrap(),
            RestoreOutcome::PrimaryPresent
        );
        assert_eq!(std::fs::read(&primary).unwrap(), b"primary bytes");
    }

    #[test]
    fn snapshot_then_restore_round_trips_rows() {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("a.db");
        let backup = dir.path().join("a.db.backup");
        let manager = BackupManager::new(&primary, &backup);

        let conn = Connection::open(&primary).unwrap();
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             CREATE TABLE rows (id TEXT PRIMARY KEY);
             INSERT INTO rows (id) VALUES ('kept');",
        )
        .unwrap();
        manager.snapshot(&conn).unwrap();
        drop(conn);

        std::fs::remove_file(&primary).unwrap();
        assert_eq!(manager.restore_if_needed().unwrap(), RestoreOutcome::Restored);

        let restored = Connection::open(&primary).unwrap();
        let id: String = restored
            .query_row("SELECT id FROM rows", [], |row| row.get(0))
            .unwrap();
        assert_eq!(id, "kept");
    }
}
