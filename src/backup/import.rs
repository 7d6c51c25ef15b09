use std::fs;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use ts_rs::TS;

use crate::backup::document::{
    ContactExport, ExportDocument, NoteExport, PatientExport, TutorExport, EXPORT_VERSION,
};
use crate::backup::{percent, ImportProgress, ImportStage, ProgressObserver};
use crate::error::{AppError, AppResult};
use crate::model::{BACKUP_CORRUPT_ARCHIVE, BACKUP_UNSUPPORTED_VERSION};
use crate::store::Store;

#[derive(Debug, Clone, Default, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ImportReport {
    #[ts(type = "number")]
    pub patients_added: u64,
    #[ts(type = "number")]
    pub patients_skipped: u64,
    #[ts(type = "number")]
    pub notes_added: u64,
    #[ts(type = "number")]
    pub notes_skipped: u64,
    #[ts(type = "number")]
    pub contacts_added: u64,
    #[ts(type = "number")]
    pub contacts_skipped: u64,
    #[ts(type = "number")]
    pub tutors_added: u64,
    #[ts(type = "number")]
    pub tutors_skipped: u64,
}

/// Apply an archive produced by `export_backup`. Patients are matched by
/// email and children by their natural keys; duplicates are skipped, new
/// rows inserted with the archived timestamps. Each insert is its own
/// write, so rows landed before a failure stay in the store.
pub async fn import_backup(
    store: &Store,
    archive_path: &Path,
    observer: Option<ProgressObserver>,
) -> AppResult<ImportReport> {
    emit(
        &observer,
        ImportStage::Reading,
        0,
        0,
        "Reading archive".to_string(),
    );
    let json = read_gzip(archive_path)?;

    emit(
        &observer,
        ImportStage::Parsing,
        0,
        0,
        "Parsing archive".to_string(),
    );
    let document: ExportDocument = serde_json::from_slice(&json)
        .map_err(|err| AppError::from(err).with_context("operation", "parse_archive"))?;
    if document.version != EXPORT_VERSION {
        return Err(AppError::new(
            BACKUP_UNSUPPORTED_VERSION,
            "Archive version is not supported by this build",
        )
        .with_context("version", document.version.clone())
        .with_context("supported", EXPORT_VERSION));
    }

    let total = document.patients.len() as u64;
    let mut report = ImportReport::default();

    // Phase one settles every patient id before any child is touched.
    let mut resolved: Vec<(i64, &PatientExport)> = Vec::with_capacity(document.patients.len());
    for (index, patient) in document.patients.iter().enumerate() {
        let patient_id = upsert_patient(store, patient, &mut report).await?;
        resolved.push((patient_id, patient));
        let current = index as u64 + 1;
        let message = format!(
            "Imported patient {current} of {total} ({}%)",
            percent(current, total)
        );
        emit(
            &observer,
            ImportStage::ImportingPatients,
            current,
            total,
            message,
        );
    }

    for (index, (patient_id, patient)) in resolved.iter().enumerate() {
        for note in &patient.notes {
            import_note(store, *patient_id, note, &mut report).await?;
        }
        for contact in &patient.emergency_contacts {
            import_contact(store, *patient_id, contact, &mut report).await?;
        }
        for tutor in &patient.legal_tutors {
            import_tutor(store, *patient_id, tutor, &mut report).await?;
        }
        let current = index as u64 + 1;
        let message = format!(
            "Imported records for patient {current} of {total} ({}%)",
            percent(current, total)
        );
        emit(
            &observer,
            ImportStage::ImportingNotes,
            current,
            total,
            message,
        );
    }

    emit(
        &observer,
        ImportStage::Complete,
        total,
        total,
        "Import complete".to_string(),
    );
    info!(
        target: "consulta",
        event = "backup_imported",
        path = %archive_path.display(),
        patients_added = report.patients_added,
        patients_skipped = report.patients_skipped,
        notes_added = report.notes_added,
        notes_skipped = report.notes_skipped
    );
    Ok(report)
}

fn emit(
    observer: &Option<ProgressObserver>,
    stage: ImportStage,
    current: u64,
    total: u64,
    message: String,
) {
    if let Some(callback) = observer {
        callback(ImportProgress {
            stage,
            current,
            total,
            message,
        });
    }
}

fn read_gzip(path: &Path) -> AppResult<Vec<u8>> {
    let file = fs::File::open(path).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "open_archive")
            .with_context("path", path.display().to_string())
    })?;
    let mut decoder = GzDecoder::new(file);
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf).map_err(|err| {
        AppError::new(BACKUP_CORRUPT_ARCHIVE, "Archive is not readable gzip data")
            .with_context("path", path.display().to_string())
            .with_cause(AppError::from(err))
    })?;
    Ok(buf)
}

async fn upsert_patient(
    store: &Store,
    patient: &PatientExport,
    report: &mut ImportReport,
) -> AppResult<i64> {
    let email = patient.email.trim().to_lowercase();
    let existing = store
        .query_one(
            "SELECT id FROM patients WHERE email = ?",
            &[Value::String(email.clone())],
        )
        .await?;
    if let Some(id) = existing
        .as_ref()
        .and_then(|row| row.get("id"))
        .and_then(Value::as_i64)
    {
        report.patients_skipped += 1;
        return Ok(id);
    }

    let result = store
        .execute(
            "INSERT INTO patients (name, age, email, phoneNumber, birthDate, maritalStatus, \
             gender, sexualOrientation, educationalLevel, profession, livesWith, children, \
             previousPsychologicalExperience, firstAppointmentDate, status, createdAt, updatedAt) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            &patient_params(patient, &email),
        )
        .await?;
    report.patients_added += 1;
    Ok(result.last_insert_id)
}

async fn import_note(
    store: &Store,
    patient_id: i64,
    note: &NoteExport,
    report: &mut ImportReport,
) -> AppResult<()> {
    let existing = store
        .query_one(
            "SELECT content FROM notes \
             WHERE patientId = ? AND title = ? AND createdAt = ? LIMIT 1",
            &[
                Value::from(patient_id),
                Value::String(note.title.clone()),
                Value::from(note.created_at),
            ],
        )
        .await?;
    if let Some(row) = existing {
        // Same key, different body: the archive and the store disagree and
        // neither side wins automatically. Keep the stored note.
        if row.get("content").and_then(Value::as_str) != Some(note.content.as_str()) {
            warn!(
                target: "consulta",
                event = "backup_note_conflict",
                patient_id = patient_id,
                title = %note.title
            );
        }
        report.notes_skipped += 1;
        return Ok(());
    }

    store
        .execute(
            "INSERT INTO notes (patientId, title, content, createdAt, updatedAt) \
             VALUES (?, ?, ?, ?, ?)",
            &[
                Value::from(patient_id),
                Value::String(note.title.clone()),
                Value::String(note.content.clone()),
                Value::from(note.created_at),
                Value::from(note.updated_at),
            ],
        )
        .await?;
    report.notes_added += 1;
    Ok(())
}

async fn import_contact(
    store: &Store,
    patient_id: i64,
    contact: &ContactExport,
    report: &mut ImportReport,
) -> AppResult<()> {
    let existing = store
        .query_one(
            "SELECT 1 FROM emergency_contacts \
             WHERE patientId = ? AND email = ? AND phoneNumber = ? LIMIT 1",
            &[
                Value::from(patient_id),
                Value::String(contact.email.clone()),
                Value::String(contact.phone_number.clone()),
            ],
        )
        .await?;
    if existing.is_some() {
        report.contacts_skipped += 1;
        return Ok(());
    }

    store
        .execute(
            "INSERT INTO emergency_contacts \
             (patientId, fullName, phoneNumber, relation, email, address, createdAt, updatedAt) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            &[
                Value::from(patient_id),
                Value::String(contact.full_name.clone()),
                Value::String(contact.phone_number.clone()),
                Value::String(contact.relation.clone()),
                Value::String(contact.email.clone()),
                opt_value(contact.address.clone()),
                Value::from(contact.created_at),
                Value::from(contact.updated_at),
            ],
        )
        .await?;
    report.contacts_added += 1;
    Ok(())
}

async fn import_tutor(
    store: &Store,
    patient_id: i64,
    tutor: &TutorExport,
    report: &mut ImportReport,
) -> AppResult<()> {
    let existing = store
        .query_one(
            "SELECT 1 FROM legal_tutors \
             WHERE patientId = ? AND email = ? AND phoneNumber = ? LIMIT 1",
            &[
                Value::from(patient_id),
                Value::String(tutor.email.clone()),
                Value::String(tutor.phone_number.clone()),
            ],
        )
        .await?;
    if existing.is_some() {
        report.tutors_skipped += 1;
        return Ok(());
    }

    store
        .execute(
            "INSERT INTO legal_tutors \
             (patientId, fullName, phoneNumber, relation, email, birthDate, address, \
             createdAt, updatedAt) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            &[
                Value::from(patient_id),
                Value::String(tutor.full_name.clone()),
                Value::String(tutor.phone_number.clone()),
                Value::String(tutor.relation.clone()),
                Value::String(tutor.email.clone()),
                Value::String(tutor.birth_date.clone()),
                opt_value(tutor.address.clone()),
                Value::from(tutor.created_at),
                Value::from(tutor.updated_at),
            ],
        )
        .await?;
    report.tutors_added += 1;
    Ok(())
}

fn patient_params(patient: &PatientExport, email: &str) -> Vec<Value> {
    vec![
        Value::String(patient.name.clone()),
        Value::from(patient.age),
        Value::String(email.to_string()),
        Value::String(patient.phone_number.clone()),
        Value::String(patient.birth_date.clone()),
        Value::String(patient.marital_status.as_str().to_string()),
        Value::String(patient.gender.as_str().to_string()),
        Value::String(patient.sexual_orientation.as_str().to_string()),
        Value::String(patient.educational_level.clone()),
        Value::String(patient.profession.clone()),
        Value::String(patient.lives_with.clone()),
        Value::from(patient.children),
        opt_value(patient.previous_psychological_experience.clone()),
        opt_value(patient.first_appointment_date.clone()),
        Value::String(patient.status.as_str().to_string()),
        Value::from(patient.created_at),
        Value::from(patient.updated_at),
    ]
}

fn opt_value(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}
