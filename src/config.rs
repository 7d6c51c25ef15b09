use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

pub const DB_FILE_NAME: &str = "consulta.sqlite3";
pub const LEDGER_FILE_NAME: &str = "migrations.json";

/// Resolved filesystem locations for the application data.
///
/// The database file and the migration ledger are kept side by side in the
/// per-user application data directory so a backup of that directory captures
/// both. `CONSULTA_DB` and `CONSULTA_LEDGER` override the defaults, which is
/// how the test suite and the CLI point the app at scratch locations.
#[derive(Debug, Clone)]
pub struct AppConfig {
    db_path: PathBuf,
    ledger_path: PathBuf,
}

impl AppConfig {
    /// Resolve the configuration from the environment, falling back to the
    /// platform data directory.
    pub fn from_env() -> AppResult<Self> {
        let db_path = match std::env::var_os("CONSULTA_DB") {
            Some(path) => PathBuf::from(path),
            None => default_data_dir()?.join(DB_FILE_NAME),
        };
        let ledger_path = match std::env::var_os("CONSULTA_LEDGER") {
            Some(path) => PathBuf::from(path),
            None => default_data_dir()?.join(LEDGER_FILE_NAME),
        };
        Ok(AppConfig {
            db_path,
            ledger_path,
        })
    }

    /// Build a configuration rooted at an explicit data directory.
    pub fn at_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        AppConfig {
            db_path: dir.join(DB_FILE_NAME),
            ledger_path: dir.join(LEDGER_FILE_NAME),
        }
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    pub fn with_ledger_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ledger_path = path.into();
        self
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    /// Create the parent directories for the database and the ledger.
    pub fn ensure_dirs(&self) -> AppResult<()> {
        for path in [&self.db_path, &self.ledger_path] {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|err| {
                    AppError::from(err)
                        .with_context("operation", "create_data_dir")
                        .with_context("path", parent.display().to_string())
                })?;
            }
        }
        Ok(())
    }
}

fn default_data_dir() -> AppResult<PathBuf> {
    let base = dirs::data_dir().ok_or_else(|| {
        AppError::new(
            "CONFIG/NO_DATA_DIR",
            "Could not determine the platform data directory",
        )
    })?;
    Ok(base.join("consulta"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_dir_places_db_and_ledger_side_by_side() {
        let config = AppConfig::at_dir("/tmp/consulta-test");
        assert_eq!(
            config.db_path(),
            Path::new("/tmp/consulta-test/consulta.sqlite3")
        );
        assert_eq!(
            config.ledger_path(),
            Path::new("/tmp/consulta-test/migrations.json")
        );
    }

    #[test]
    fn overrides_replace_individual_paths() {
        let config = AppConfig::at_dir("/tmp/consulta-test").with_db_path("/elsewhere/data.db");
        assert_eq!(config.db_path(), Path::new("/elsewhere/data.db"));
        assert_eq!(
            config.ledger_path(),
            Path::new("/tmp/consulta-test/migrations.json")
        );
    }

    #[test]
    fn ensure_dirs_creates_missing_parents() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config = AppConfig::at_dir(tmp.path().join("nested/app"));
        config.ensure_dirs().expect("create dirs");
        assert!(tmp.path().join("nested/app").is_dir());
    }
}
