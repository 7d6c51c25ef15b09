use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::model::{Gender, MaritalStatus, PatientStatus, SexualOrientation};

pub const EXPORT_VERSION: &str = "1.0";

/// Top-level archive payload: gzip-compressed UTF-8 JSON of this document.
/// Numeric ids are never persisted; import regenerates them and matches
/// records by natural key instead.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ExportDocument {
    pub version: String,
    pub export_date: String,
    pub patients: Vec<PatientExport>,
}

/// Dates stay as the stored `YYYY-MM-DD` text and timestamps as epoch
/// milliseconds, so a round trip through an archive is byte-faithful.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct PatientExport {
    pub name: String,
    #[ts(type = "number")]
    pub age: i64,
    pub email: String,
    pub phone_number: String,
    pub birth_date: String,
    pub marital_status: MaritalStatus,
    pub gender: Gender,
    pub sexual_orientation: SexualOrientation,
    pub educational_level: String,
    pub profession: String,
    pub lives_with: String,
    #[ts(type = "number")]
    pub children: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub previous_psychological_experience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub first_appointment_date: Option<String>,
    pub status: PatientStatus,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
    #[serde(default)]
    pub notes: Vec<NoteExport>,
    #[serde(default)]
    pub emergency_contacts: Vec<ContactExport>,
    #[serde(default)]
    pub legal_tutors: Vec<TutorExport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct NoteExport {
    pub title: String,
    pub content: String,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ContactExport {
    pub full_name: String,
    pub phone_number: String,
    pub relation: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub address: Option<String>,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TutorExport {
    pub full_name: String,
    pub phone_number: String,
    pub relation: String,
    pub email: String,
    pub birth_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub address: Option<String>,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
}
