//! Deployment configuration for the persistence core.
//!
//! # Responsibility
//! - Resolve the active backend from environment-supplied settings.
//! - Derive the embedded primary/backup file paths.
//!
//! # Invariants
//! - Presence of a non-empty `DATABASE_URL` selects the networked backend;
//!   absence selects the embedded backend and a local file path.

use std::path::{Path, PathBuf};

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_DB_PATH: &str = "MACROLOG_DB_PATH";
pub const ENV_BACKUP_PATH: &str = "MACROLOG_BACKUP_PATH";

const DEFAULT_DB_PATH: &str = "macrolog.db";

/// Selected backend plus the settings it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Embedded {
        db_path: PathBuf,
        backup_path: PathBuf,
    },
    Networked {
        url: String,
    },
}

/// Resolved store configuration for one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: BackendConfig,
}

impl StoreConfig {
    /// Embedded backend with the backup file derived from the primary path.
    pub fn embedded(db_path: impl Into<PathBuf>) -> Self {
        let db_path = db_path.into();
        let backup_path = default_backup_path(&db_path);
        Self {
            backend: BackendConfig::Embedded {
                db_path,
                backup_path,
            },
        }
    }

    /// Embedded backend with an explicit backup file path.
    pub fn embedded_with_backup(
        db_path: impl Into<PathBuf>,
        backup_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend: BackendConfig::Embedded {
                db_path: db_path.into(),
                backup_path: backup_path.into(),
            },
        }
    }

    /// Networked backend reachable at `url`.
    pub fn networked(url: impl Into<String>) -> Self {
        Self {
            backend: BackendConfig::Networked { url: url.into() },
        }
    }

    /// Resolves configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration from an arbitrary settings lookup.
    ///
    /// Keeps environment handling testable without mutating process state.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_DATABASE_URL).filter(|value| !value.trim().is_empty()) {
            return Self::networked(url);
        }

        let db_path = lookup(ENV_DB_PATH)
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        match lookup(ENV_BACKUP_PATH).filter(|value| !value.trim().is_empty()) {
            Some(backup) => Self::embedded_with_backup(db_path, backup),
            None => Self::embedded(db_path),
        }
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self.backend, BackendConfig::Embedded { .. })
    }
}

fn default_backup_path(db_path: &Path) -> PathBuf {
    let mut backup = db_path.as_os_str().to_os_string();
    backup.push(".backup");
    PathBuf::from(backup)
}

#[cfg(test)]
mod tests {
    use super::{BackendConfig, StoreConfig, ENV_BACKUP_PATH, ENV_DATABASE_URL, ENV_DB_PATH};
    use std::path::PathBuf;

    #[test]
    fn database_url_presence_selects_networked_backend() {
        let config = StoreConfig::from_lookup(|key| match key {
            ENV_DATABASE_URL => Some("postgresql://app@db/macrolog".to_string()),
            _ => None,
        });
        assert_eq!(
            config.backend,
            BackendConfig::Networked {
                url: "postgresql://app@db/macrolog".to_string()
            }
        );
    }

    #[test]
    fn empty_database_url_falls_back_to_embedded_defaults() {
        let config = StoreConfig::from_lookup(|key| match key {
            ENV_DATABASE_URL => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(
            config.backend,
            BackendConfig::Embedded {
                db_path: PathBuf::from("macrolog.db"),
                backup_path: PathBuf::from("macrolog.db.backup"),
            }
        );
    }

    #[test]
    fn embedded_paths_come_from_environment_when_set() {
        let config = StoreConfig::from_lookup(|key| match key {
            ENV_DB_PATH => Some("/var/data/food.db".to_string()),
            ENV_BACKUP_PATH => Some("/var/data/food.safety".to_string()),
            _ => None,
        });
        assert_eq!(
            config.backend,
            BackendConfig::Embedded {
                db_path: PathBuf::from("/var/data/food.db"),
                backup_path: PathBuf::from("/var/data/food.safety"),
            }
        );
    }

    #[test]
    fn derived_backup_path_appends_suffix() {
        let config = StoreConfig::embedded("/srv/macrolog.db");
        match config.backend {
            BackendConfig::Embedded { backup_path, .. } => {
                assert_eq!(backup_path, PathBuf::from("/srv/macrolog.db.backup"));
            }
            other => panic!("unexpected backend: {other:?}"),
        }
    }
}
