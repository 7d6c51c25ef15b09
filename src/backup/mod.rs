use std::sync::Arc;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub mod document;
pub mod export;
pub mod import;

pub use document::{
    ContactExport, ExportDocument, NoteExport, PatientExport, TutorExport, EXPORT_VERSION,
};
pub use export::{export_backup, ExportReport};
pub use import::{import_backup, ImportReport};

/// Stages surfaced to the UI while an archive is applied. The names are
/// part of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/", rename_all = "snake_case")]
pub enum ImportStage {
    Reading,
    Parsing,
    ImportingPatients,
    ImportingNotes,
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ImportProgress {
    pub stage: ImportStage,
    #[ts(type = "number")]
    pub current: u64,
    #[ts(type = "number")]
    pub total: u64,
    pub message: String,
}

pub type ProgressObserver = Arc<dyn Fn(ImportProgress) + Send + Sync + 'static>;

/// Integer percentage, floored. A zero total reports 100 so that empty
/// imports finish at "done" rather than dividing by zero.
pub fn percent(current: u64, total: u64) -> u64 {
    if total == 0 {
        return 100;
    }
    current.saturating_mul(100) / total
}
