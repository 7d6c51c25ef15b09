use std::fs;
use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use ts_rs::TS;

use crate::backup::document::{
    ContactExport, ExportDocument, NoteExport, PatientExport, TutorExport, EXPORT_VERSION,
};
use crate::error::{AppError, AppResult};
use crate::model::BACKUP_FILE_EXISTS;
use crate::store::Store;
use crate::time::iso_now_millis;

const PARTIAL_SUFFIX: &str = ".partial";

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ExportReport {
    pub path: String,
    #[ts(type = "number")]
    pub patients: u64,
    #[ts(type = "number")]
    pub bytes: u64,
}

/// Serialize every patient (children nested, ids omitted) into a gzip
/// archive at `out_path`. Refuses to overwrite; the caller picks a fresh
/// path or deletes the old file first.
pub async fn export_backup(store: &Store, out_path: &Path) -> AppResult<ExportReport> {
    if out_path.exists() {
        return Err(AppError::new(
            BACKUP_FILE_EXISTS,
            "A file already exists at the export path",
        )
        .with_context("path", out_path.display().to_string()));
    }

    let patients = collect_patients(store).await?;
    let patient_count = patients.len() as u64;
    let document = ExportDocument {
        version: EXPORT_VERSION.to_string(),
        export_date: iso_now_millis(),
        patients,
    };

    let json = serde_json::to_vec(&document)
        .map_err(|err| AppError::from(err).with_context("operation", "serialize_export"))?;
    let bytes = write_gzip_atomic(out_path, &json)?;

    info!(
        target: "consulta",
        event = "backup_exported",
        path = %out_path.display(),
        patients = patient_count,
        bytes = bytes
    );

    Ok(ExportReport {
        path: out_path.display().to_string(),
        patients: patient_count,
        bytes,
    })
}

/// Bulk read straight off the store; services are not involved here.
async fn collect_patients(store: &Store) -> AppResult<Vec<PatientExport>> {
    let rows = store
        .query(
            "SELECT * FROM patients ORDER BY createdAt ASC, id ASC",
            &[],
        )
        .await?;

    let mut patients = Vec::with_capacity(rows.len());
    for row in rows {
        let id = row
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| AppError::new("BACKUP/EXPORT_ROW", "Patient row has no integer id"))?;
        let mut patient: PatientExport = decode_row(row)?;

        patient.notes = child_rows::<NoteExport>(
            store,
            "SELECT title, content, createdAt, updatedAt FROM notes \
             WHERE patientId = ? ORDER BY createdAt ASC, id ASC",
            id,
        )
        .await?;
        patient.emergency_contacts = child_rows::<ContactExport>(
            store,
            "SELECT fullName, phoneNumber, relation, email, address, createdAt, updatedAt \
             FROM emergency_contacts WHERE patientId = ? ORDER BY createdAt ASC, id ASC",
            id,
        )
        .await?;
        patient.legal_tutors = child_rows::<TutorExport>(
            store,
            "SELECT fullName, phoneNumber, relation, email, birthDate, address, createdAt, updatedAt \
             FROM legal_tutors WHERE patientId = ? ORDER BY createdAt ASC, id ASC",
            id,
        )
        .await?;

        patients.push(patient);
    }
    Ok(patients)
}

async fn child_rows<T: DeserializeOwned>(
    store: &Store,
    sql: &str,
    patient_id: i64,
) -> AppResult<Vec<T>> {
    let rows = store.query(sql, &[Value::from(patient_id)]).await?;
    rows.into_iter().map(decode_row).collect()
}

fn decode_row<T: DeserializeOwned>(row: Value) -> AppResult<T> {
    serde_json::from_value(row)
        .map_err(|err| AppError::from(err).with_context("operation", "decode_export_row"))
}

fn write_gzip_atomic(path: &Path, json: &[u8]) -> AppResult<u64> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| {
                AppError::from(err)
                    .with_context("operation", "create_export_parent")
                    .with_context("path", parent.display().to_string())
            })?;
        }
    }

    let mut partial = path.as_os_str().to_os_string();
    partial.push(PARTIAL_SUFFIX);
    let partial = std::path::PathBuf::from(partial);

    let file = fs::File::create(&partial).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "create_export_partial")
            .with_context("path", partial.display().to_string())
    })?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(json).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "write_export_archive")
            .with_context("path", partial.display().to_string())
    })?;
    let file = encoder.finish().map_err(|err| {
        AppError::from(err).with_context("operation", "finish_export_archive")
    })?;
    file.sync_all().map_err(|err| {
        AppError::from(err).with_context("operation", "sync_export_archive")
    })?;

    fs::rename(&partial, path).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "rename_export_archive")
            .with_context("path", path.display().to_string())
    })?;

    let bytes = fs::metadata(path).map(|meta| meta.len()).unwrap_or(0);
    Ok(bytes)
}
