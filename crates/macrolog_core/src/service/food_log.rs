//! Food-log use-case service.
//!
//! # Responsibility
//! - Bootstrap the store: restore, open, ensure schema, initial snapshot.
//! - Run each operation on one short-lived connection and trigger the
//!   post-write snapshot for the embedded backend.
//!
//! # Invariants
//! - Snapshots run strictly after the triggering write's commit returned.
//! - Snapshot failures are logged, never propagated: the write already
//!   committed and the backup is a best-effort safety net.
//! - A degraded schema report does not abort bootstrap.

use crate::config::{BackendConfig, StoreConfig};
use crate::db::backup::{BackupError, BackupManager};
use crate::db::conn::{ConnectionProvider, StoreConnection};
use crate::db::schema::{ensure_schema, SchemaError, SchemaReport};
use crate::db::StoreError;
use crate::model::meal::{Meal, MealDraft};
use crate::model::targets::{Targets, TargetsDraft};
use crate::repo::record_repo::{RecordRepository, RepoError, RepoResult, SqlRecordRepository};
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Startup failure bringing the store to a serving state.
#[derive(Debug)]
pub enum BootstrapError {
    Store(StoreError),
    Schema(SchemaError),
    Restore(BackupError),
}

impl Display for BootstrapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "store bootstrap failed: {err}"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::Restore(err) => write!(f, "backup restore failed: {err}"),
        }
    }
}

impl Error for BootstrapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Schema(err) => Some(err),
            Self::Restore(err) => Some(err),
        }
    }
}

/// Use-case facade over the persistence core.
///
/// One instance per process; each operation opens and drops its own
/// connection (embedded) or pool checkout (networked).
pub struct FoodLogService {
    provider: ConnectionProvider,
    backup: Option<BackupManager>,
}

impl FoodLogService {
    /// Brings the configured store to a serving state.
    ///
    /// Embedded backend: restore the primary from the backup when the
    /// hosting environment wiped it, then ensure the schema and write the
    /// first snapshot. A restore failure is fatal here: starting against
    /// an empty store while a usable backup exists would discard data.
    pub fn bootstrap(config: &StoreConfig) -> Result<(Self, SchemaReport), BootstrapError> {
        let backup = match &config.backend {
            BackendConfig::Embedded {
                db_path,
                backup_path,
            } => {
                let manager = BackupManager::new(db_path, backup_path);
                let outcome = manager
                    .restore_if_needed()
                    .map_err(BootstrapError::Restore)?;
                info!("event=backup_restore module=service status=ok outcome={outcome:?}");
                Some(manager)
            }
            BackendConfig::Networked { .. } => None,
        };

        let provider = ConnectionProvider::new(config).map_err(BootstrapError::Store)?;
        let mut conn = provider.open().map_err(BootstrapError::Store)?;
        let report = ensure_schema(&mut conn).map_err(BootstrapError::Schema)?;
        if report.has_failures() {
            warn!(
                "event=bootstrap module=service status=degraded failed_steps={}",
                report.failed_steps().len()
            );
        }

        let service = Self { provider, backup };
        service.snapshot_after_write(&conn, "bootstrap");
        Ok((service, report))
    }

    pub fn provider(&self) -> &ConnectionProvider {
        &self.provider
    }

    pub fn backup_manager(&self) -> Option<&BackupManager> {
        self.backup.as_ref()
    }

    pub fn ensure_user(&self, user_id: &str, email: Option<&str>) -> RepoResult<()> {
        let mut conn = self.open()?;
        SqlRecordRepository::new(&mut conn).ensure_user(user_id, email)
    }

    pub fn list_meals(&self, user_id: &str) -> RepoResult<Vec<Meal>> {
        let mut conn = self.open()?;
        SqlRecordRepository::new(&mut conn).list_meals(user_id)
    }

    pub fn create_meal(&self, user_id: &str, draft: &MealDraft) -> RepoResult<String> {
        let mut conn = self.open()?;
        let meal_id = SqlRecordRepository::new(&mut conn).create_meal(user_id, draft)?;
        info!("event=create_meal module=service status=ok meal_id={meal_id}");
        self.snapshot_after_write(&conn, "create_meal");
        Ok(meal_id)
    }

    pub fn update_meal(&self, meal_id: &str, user_id: &str, draft: &MealDraft) -> RepoResult<()> {
        let mut conn = self.open()?;
        SqlRecordRepository::new(&mut conn).update_meal(meal_id, user_id, draft)?;
        info!("event=update_meal module=service status=ok meal_id={meal_id}");
        self.snapshot_after_write(&conn, "update_meal");
        Ok(())
    }

    pub fn delete_meal(&self, meal_id: &str, user_id: &str) -> RepoResult<()> {
        let mut conn = self.open()?;
        SqlRecordRepository::new(&mut conn).delete_meal(meal_id, user_id)?;
        info!("event=delete_meal module=service status=ok meal_id={meal_id}");
        self.snapshot_after_write(&conn, "delete_meal");
        Ok(())
    }

    pub fn get_targets(&self, user_id: &str) -> RepoResult<Option<Targets>> {
        let mut conn = self.open()?;
        SqlRecordRepository::new(&mut conn).get_targets(user_id)
    }

    pub fn upsert_targets(&self, user_id: &str, draft: &TargetsDraft) -> RepoResult<()> {
        let mut conn = self.open()?;
        SqlRecordRepository::new(&mut conn).upsert_targets(user_id, draft)
    }

    fn open(&self) -> RepoResult<StoreConnection> {
        self.provider.open().map_err(RepoError::from)
    }

    /// Best-effort snapshot after a committed meal mutation.
    fn snapshot_after_write(&self, conn: &StoreConnection, trigger: &str) {
        let (manager, sqlite) = match (&self.backup, conn.sqlite()) {
            (Some(manager), Some(sqlite)) => (manager, sqlite),
            _ => return,
        };
        match manager.snapshot(sqlite) {
            Ok(()) => {
                debug!("event=backup_snapshot module=service status=ok trigger={trigger}");
            }
            Err(err) => {
                error!(
                    "event=backup_snapshot module=service status=error trigger={trigger} error={err}"
                );
            }
        }
    }
}
