use crate::error::AppResult;
use crate::model::{Note, NoteInput, NotePatch, PatientPatch};
use crate::repo::notes::note_not_found;
use crate::repo::patients::patient_not_found;
use crate::repo::{NotesRepo, PatientsRepo};
use crate::service::validate::check_max_len;
use crate::time::today;

pub const MAX_TITLE_CHARS: usize = 500;
pub const MAX_CONTENT_CHARS: usize = 50_000;

/// Session-note operations plus the one cross-entity rule in the system:
/// the first note for a patient stamps that patient's first-appointment date.
#[derive(Clone)]
pub struct NoteService {
    notes: NotesRepo,
    patients: PatientsRepo,
}

impl NoteService {
    pub fn new(notes: NotesRepo, patients: PatientsRepo) -> Self {
        NoteService { notes, patients }
    }

    pub async fn create_note(&self, input: NoteInput) -> AppResult<Note> {
        let input = normalize_input(input);
        validate_input(&input)?;

        let patient = self
            .patients
            .find_by_id(input.patient_id)
            .await?
            .ok_or_else(|| patient_not_found(input.patient_id))?;

        // The note must be durably created before the side effect runs.
        let note = self.notes.create(&input).await?;
        tracing::info!(
            target: "consulta",
            event = "note_created",
            id = note.id,
            patient_id = note.patient_id
        );

        if patient.first_appointment_date.is_none() {
            let date = today();
            self.patients
                .update(
                    patient.id,
                    &PatientPatch {
                        first_appointment_date: Some(date),
                        ..Default::default()
                    },
                )
                .await?;
            tracing::info!(
                target: "consulta",
                event = "first_appointment_set",
                patient_id = patient.id,
                date = %date
            );
        }

        Ok(note)
    }

    pub async fn find_note(&self, id: i64) -> AppResult<Option<Note>> {
        self.notes.find_by_id(id).await
    }

    pub async fn list_notes(&self) -> AppResult<Vec<Note>> {
        self.notes.find_all().await
    }

    /// Notes for a patient, newest first. A missing patient id simply yields
    /// an empty list, which is what a cascade delete leaves behind.
    pub async fn notes_for_patient(&self, patient_id: i64) -> AppResult<Vec<Note>> {
        self.notes.find_by_patient_id(patient_id).await
    }

    pub async fn search_notes(&self, term: &str) -> AppResult<Vec<Note>> {
        self.notes.search(term).await
    }

    pub async fn update_note(&self, id: i64, patch: NotePatch) -> AppResult<Note> {
        if !self.notes.exists(id).await? {
            return Err(note_not_found(id));
        }
        let patch = normalize_patch(patch);
        validate_patch(&patch)?;
        self.notes.update(id, &patch).await
    }

    pub async fn delete_note(&self, id: i64) -> AppResult<bool> {
        if !self.notes.exists(id).await? {
            return Err(note_not_found(id));
        }
        self.notes.delete(id).await
    }

    pub async fn delete_notes_for_patient(&self, patient_id: i64) -> AppResult<u64> {
        if !self.patients.exists(patient_id).await? {
            return Err(patient_not_found(patient_id));
        }
        self.notes.delete_by_patient_id(patient_id).await
    }

    pub async fn count_notes(&self) -> AppResult<i64> {
        self.notes.count().await
    }
}

fn normalize_input(mut input: NoteInput) -> NoteInput {
    input.title = input.title.trim().to_string();
    input.content = input.content.trim().to_string();
    input
}

fn normalize_patch(mut patch: NotePatch) -> NotePatch {
    patch.title = patch.title.map(|s| s.trim().to_string());
    patch.content = patch.content.map(|s| s.trim().to_string());
    patch
}

fn validate_input(input: &NoteInput) -> AppResult<()> {
    check_max_len(&input.title, MAX_TITLE_CHARS, "title")?;
    check_max_len(&input.content, MAX_CONTENT_CHARS, "content")?;
    Ok(())
}

fn validate_patch(patch: &NotePatch) -> AppResult<()> {
    if let Some(title) = &patch.title {
        check_max_len(title, MAX_TITLE_CHARS, "title")?;
    }
    if let Some(content) = &patch.content {
        check_max_len(content, MAX_CONTENT_CHARS, "content")?;
    }
    Ok(())
}
