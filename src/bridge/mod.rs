//! Request/response surface consumed by the UI layer.
//!
//! Every operation returns an [`Envelope`] and never an `Err`; callers
//! check `success` before touching `data`. Failures carry the error
//! message, and the full code/context is logged on this side of the
//! boundary.

use std::future::Future;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;
use ts_rs::TS;

use crate::backup::{self, ExportReport, ImportReport, ProgressObserver};
use crate::error::AppResult;
use crate::model::{
    EmergencyContact, EmergencyContactInput, EmergencyContactPatch, LegalTutor, LegalTutorInput,
    LegalTutorPatch, Note, NoteInput, NotePatch, Patient, PatientInput, PatientPatch,
    PatientStatus,
};
use crate::state::AppState;

pub mod guard;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Envelope {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Envelope {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn from_result(result: AppResult<T>) -> Self {
        match result {
            Ok(data) => Envelope::ok(data),
            Err(err) => {
                warn!(
                    target: "consulta",
                    event = "bridge_error",
                    code = %err.code(),
                    message = %err.message()
                );
                Envelope::fail(err.message().to_string())
            }
        }
    }
}

async fn run<T, F>(state: &AppState, op: F) -> Envelope<T>
where
    F: Future<Output = AppResult<T>>,
{
    match guard::ensure_ready(state) {
        Ok(_guard) => Envelope::from_result(op.await),
        Err(err) => Envelope::from_result(Err(err)),
    }
}

pub async fn create_patient(state: &AppState, input: PatientInput) -> Envelope<Patient> {
    run(state, state.patients().create_patient(input)).await
}

pub async fn get_patient(state: &AppState, id: i64) -> Envelope<Option<Patient>> {
    run(state, state.patients().find_patient(id)).await
}

pub async fn list_patients(state: &AppState) -> Envelope<Vec<Patient>> {
    run(state, state.patients().list_patients()).await
}

pub async fn patients_by_status(
    state: &AppState,
    status: PatientStatus,
) -> Envelope<Vec<Patient>> {
    run(state, state.patients().patients_by_status(status)).await
}

pub async fn search_patients(
    state: &AppState,
    term: &str,
    status: Option<PatientStatus>,
) -> Envelope<Vec<Patient>> {
    run(state, state.patients().search_patients(term, status)).await
}

pub async fn update_patient(state: &AppState, id: i64, patch: PatientPatch) -> Envelope<Patient> {
    run(state, state.patients().update_patient(id, patch)).await
}

pub async fn delete_patient(state: &AppState, id: i64) -> Envelope<bool> {
    run(state, state.patients().delete_patient(id)).await
}

pub async fn create_note(state: &AppState, input: NoteInput) -> Envelope<Note> {
    run(state, state.notes().create_note(input)).await
}

pub async fn get_note(state: &AppState, id: i64) -> Envelope<Option<Note>> {
    run(state, state.notes().find_note(id)).await
}

pub async fn list_notes(state: &AppState) -> Envelope<Vec<Note>> {
    run(state, state.notes().list_notes()).await
}

pub async fn notes_for_patient(state: &AppState, patient_id: i64) -> Envelope<Vec<Note>> {
    run(state, state.notes().notes_for_patient(patient_id)).await
}

pub async fn search_notes(state: &AppState, term: &str) -> Envelope<Vec<Note>> {
    run(state, state.notes().search_notes(term)).await
}

pub async fn update_note(state: &AppState, id: i64, patch: NotePatch) -> Envelope<Note> {
    run(state, state.notes().update_note(id, patch)).await
}

pub async fn delete_note(state: &AppState, id: i64) -> Envelope<bool> {
    run(state, state.notes().delete_note(id)).await
}

pub async fn create_contact(
    state: &AppState,
    input: EmergencyContactInput,
) -> Envelope<EmergencyContact> {
    run(state, state.contacts().create_contact(input)).await
}

pub async fn get_contact(state: &AppState, id: i64) -> Envelope<Option<EmergencyContact>> {
    run(state, state.contacts().find_contact(id)).await
}

pub async fn contacts_for_patient(
    state: &AppState,
    patient_id: i64,
) -> Envelope<Vec<EmergencyContact>> {
    run(state, state.contacts().contacts_for_patient(patient_id)).await
}

pub async fn update_contact(
    state: &AppState,
    id: i64,
    patch: EmergencyContactPatch,
) -> Envelope<EmergencyContact> {
    run(state, state.contacts().update_contact(id, patch)).await
}

pub async fn delete_contact(state: &AppState, id: i64) -> Envelope<bool> {
    run(state, state.contacts().delete_contact(id)).await
}

pub async fn create_tutor(state: &AppState, input: LegalTutorInput) -> Envelope<LegalTutor> {
    run(state, state.tutors().create_tutor(input)).await
}

pub async fn get_tutor(state: &AppState, id: i64) -> Envelope<Option<LegalTutor>> {
    run(state, state.tutors().find_tutor(id)).await
}

pub async fn tutors_for_patient(state: &AppState, patient_id: i64) -> Envelope<Vec<LegalTutor>> {
    run(state, state.tutors().tutors_for_patient(patient_id)).await
}

pub async fn update_tutor(
    state: &AppState,
    id: i64,
    patch: LegalTutorPatch,
) -> Envelope<LegalTutor> {
    run(state, state.tutors().update_tutor(id, patch)).await
}

pub async fn delete_tutor(state: &AppState, id: i64) -> Envelope<bool> {
    run(state, state.tutors().delete_tutor(id)).await
}

pub async fn export_records(state: &AppState, out_path: &Path) -> Envelope<ExportReport> {
    run(state, backup::export_backup(state.store(), out_path)).await
}

pub async fn import_records(
    state: &AppState,
    archive_path: &Path,
    observer: Option<ProgressObserver>,
) -> Envelope<ImportReport> {
    run(
        state,
        backup::import_backup(state.store(), archive_path, observer),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Gender, MaritalStatus};

    fn sample_input() -> PatientInput {
        PatientInput {
            name: "Ana Ruiz".into(),
            age: 34,
            email: "ANA@X.COM".into(),
            phone_number: "600111222".into(),
            birth_date: chrono::NaiveDate::from_ymd_opt(1991, 4, 2).expect("date"),
            marital_status: MaritalStatus::Single,
            gender: Gender::Female,
            sexual_orientation: Default::default(),
            educational_level: "degree".into(),
            profession: "teacher".into(),
            lives_with: "alone".into(),
            children: 0,
            previous_psychological_experience: None,
            first_appointment_date: None,
            status: Default::default(),
        }
    }

    #[tokio::test]
    async fn envelope_wraps_success_and_failure() {
        let state = AppState::in_memory().await.expect("state");

        let created = create_patient(&state, sample_input()).await;
        assert!(created.success);
        let patient = created.data.expect("data");
        assert_eq!(patient.email, "ana@x.com");

        let duplicate = create_patient(&state, sample_input()).await;
        assert!(!duplicate.success);
        assert!(duplicate.data.is_none());
        assert!(duplicate.error.is_some());
    }

    #[tokio::test]
    async fn operations_fail_closed_before_ready() {
        let state = AppState::unready().await.expect("state");
        let envelope = list_patients(&state).await;
        assert!(!envelope.success);
        assert_eq!(
            envelope.error.as_deref(),
            Some(guard::NOT_READY_MESSAGE)
        );
    }
}
