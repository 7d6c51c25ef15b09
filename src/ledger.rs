use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::error::AppError;
use crate::time::iso_now_millis;

/// One ledger entry: a migration that has been applied, with the moment it
/// was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct AppliedMigration {
    pub name: String,
    /// ISO-8601 timestamp with millisecond precision.
    pub applied_at: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    applied: Vec<AppliedMigration>,
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("failed to read migration ledger at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write migration ledger at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("migration ledger at {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to encode migration ledger: {source}")]
    Encode { source: serde_json::Error },
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let code = match &err {
            LedgerError::Read { .. } => "LEDGER/READ",
            LedgerError::Write { .. } => "LEDGER/WRITE",
            LedgerError::Parse { .. } => "LEDGER/PARSE",
            LedgerError::Encode { .. } => "LEDGER/ENCODE",
        };
        AppError::new(code, err.to_string())
    }
}

trait LedgerStore: Send + Sync {
    fn load(&self) -> Result<Vec<AppliedMigration>, LedgerError>;
    fn save(&self, applied: &[AppliedMigration]) -> Result<(), LedgerError>;
}

/// JSON file next to nothing else the app owns; kept outside the database so
/// migration bookkeeping survives the data file being replaced.
struct FileLedger {
    path: PathBuf,
}

impl LedgerStore for FileLedger {
    fn load(&self) -> Result<Vec<AppliedMigration>, LedgerError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path).map_err(|source| LedgerError::Read {
            path: self.path.clone(),
            source,
        })?;
        let file: LedgerFile =
            serde_json::from_str(&raw).map_err(|source| LedgerError::Parse {
                path: self.path.clone(),
                source,
            })?;
        Ok(file.applied)
    }

    fn save(&self, applied: &[AppliedMigration]) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LedgerError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        let file = LedgerFile {
            applied: applied.to_vec(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|source| LedgerError::Encode { source })?;

        // Write-then-rename so a crash mid-write cannot truncate the ledger.
        let partial = self.path.with_extension("json.partial");
        std::fs::write(&partial, json).map_err(|source| LedgerError::Write {
            path: partial.clone(),
            source,
        })?;
        std::fs::rename(&partial, &self.path).map_err(|source| LedgerError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

#[derive(Default)]
struct MemoryLedger {
    data: Mutex<Vec<AppliedMigration>>,
}

impl LedgerStore for MemoryLedger {
    fn load(&self) -> Result<Vec<AppliedMigration>, LedgerError> {
        Ok(self
            .data
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default())
    }

    fn save(&self, applied: &[AppliedMigration]) -> Result<(), LedgerError> {
        if let Ok(mut guard) = self.data.lock() {
            *guard = applied.to_vec();
        }
        Ok(())
    }
}

/// Shared handle over a ledger backend. Cloning is cheap.
#[derive(Clone)]
pub struct LedgerHandle {
    inner: Arc<dyn LedgerStore>,
}

impl LedgerHandle {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        LedgerHandle {
            inner: Arc::new(FileLedger { path: path.into() }),
        }
    }

    pub fn in_memory() -> Self {
        LedgerHandle {
            inner: Arc::new(MemoryLedger::default()),
        }
    }

    /// Every applied migration, in application order.
    pub fn applied(&self) -> Result<Vec<AppliedMigration>, LedgerError> {
        self.inner.load()
    }

    /// Append one applied entry stamped with the current instant.
    pub fn record_applied(&self, name: &str) -> Result<AppliedMigration, LedgerError> {
        let mut applied = self.inner.load()?;
        let entry = AppliedMigration {
            name: name.to_string(),
            applied_at: iso_now_millis(),
        };
        applied.push(entry.clone());
        self.inner.save(&applied)?;
        Ok(entry)
    }

    /// Drop the most recently applied entry, returning it if one existed.
    pub fn remove_last(&self) -> Result<Option<AppliedMigration>, LedgerError> {
        let mut applied = self.inner.load()?;
        let removed = applied.pop();
        if removed.is_some() {
            self.inner.save(&applied)?;
        }
        Ok(removed)
    }
}
