use anyhow::Result;
use chrono::NaiveDate;

use consulta_lib::model::{
    NotePatch, PatientStatus, NOTE_NOT_FOUND, PATIENT_NOT_FOUND, VALIDATION_TOO_LONG,
};
use consulta_lib::service::notes::{MAX_CONTENT_CHARS, MAX_TITLE_CHARS};
use consulta_lib::AppState;

#[path = "util.rs"]
mod util;

#[tokio::test]
async fn first_note_stamps_first_appointment_exactly_once() -> Result<()> {
    let state = AppState::in_memory().await?;
    let patient = state
        .patients()
        .create_patient(util::patient_input("Ana Ruiz", "ana@x.com"))
        .await?;
    assert!(patient.first_appointment_date.is_none());

    state
        .notes()
        .create_note(util::note_input(patient.id, "Intake"))
        .await?;
    let after_first = state
        .patients()
        .find_patient(patient.id)
        .await?
        .expect("patient present");
    assert_eq!(
        after_first.first_appointment_date,
        Some(consulta_lib::time::today())
    );

    // A second note must leave the stamp alone.
    state
        .notes()
        .create_note(util::note_input(patient.id, "Follow-up"))
        .await?;
    let after_second = state
        .patients()
        .find_patient(patient.id)
        .await?
        .expect("patient present");
    assert_eq!(
        after_second.first_appointment_date,
        after_first.first_appointment_date
    );
    Ok(())
}

#[tokio::test]
async fn existing_first_appointment_date_is_preserved() -> Result<()> {
    let state = AppState::in_memory().await?;
    let mut input = util::patient_input("Ana Ruiz", "ana@x.com");
    let original = NaiveDate::from_ymd_opt(2024, 3, 15).expect("valid date");
    input.first_appointment_date = Some(original);
    let patient = state.patients().create_patient(input).await?;

    state
        .notes()
        .create_note(util::note_input(patient.id, "Intake"))
        .await?;
    let after = state
        .patients()
        .find_patient(patient.id)
        .await?
        .expect("patient present");
    assert_eq!(after.first_appointment_date, Some(original));
    Ok(())
}

#[tokio::test]
async fn note_length_bounds_are_enforced() -> Result<()> {
    let state = AppState::in_memory().await?;
    let patient = state
        .patients()
        .create_patient(util::patient_input("Ana Ruiz", "ana@x.com"))
        .await?;

    let mut input = util::note_input(patient.id, "");
    input.title = "t".repeat(MAX_TITLE_CHARS + 1);
    let err = state
        .notes()
        .create_note(input)
        .await
        .expect_err("title too long");
    assert_eq!(err.code(), VALIDATION_TOO_LONG);

    let mut input = util::note_input(patient.id, "Intake");
    input.content = "c".repeat(MAX_CONTENT_CHARS + 1);
    let err = state
        .notes()
        .create_note(input)
        .await
        .expect_err("content too long");
    assert_eq!(err.code(), VALIDATION_TOO_LONG);

    // A title exactly at the bound passes.
    let mut input = util::note_input(patient.id, "");
    input.title = "t".repeat(MAX_TITLE_CHARS);
    state.notes().create_note(input).await?;
    Ok(())
}

#[tokio::test]
async fn create_for_missing_patient_reports_not_found() -> Result<()> {
    let state = AppState::in_memory().await?;
    let err = state
        .notes()
        .create_note(util::note_input(4_242, "Intake"))
        .await
        .expect_err("no such patient");
    assert_eq!(err.code(), PATIENT_NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn note_crud_and_search() -> Result<()> {
    let state = AppState::in_memory().await?;
    let patient = state
        .patients()
        .create_patient(util::patient_input("Ana Ruiz", "ana@x.com"))
        .await?;

    let mut first = util::note_input(patient.id, "  Intake session  ");
    first.content = "<p>Initial CBT assessment.</p>".to_string();
    let first = state.notes().create_note(first).await?;
    assert_eq!(first.title, "Intake session", "title is trimmed");

    let mut second = util::note_input(patient.id, "Medication review");
    second.content = "<p>Dosage unchanged.</p>".to_string();
    let second = state.notes().create_note(second).await?;

    let listed = state.notes().notes_for_patient(patient.id).await?;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second.id, "newest first");

    let hits = state.notes().search_notes("cbt").await?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, first.id);
    let hits = state.notes().search_notes("session").await?;
    assert_eq!(hits.len(), 1, "title is searched too");

    let patch = NotePatch {
        content: Some("<p>Dosage raised.</p>".to_string()),
        ..Default::default()
    };
    let updated = state.notes().update_note(second.id, patch).await?;
    assert_eq!(updated.content, "<p>Dosage raised.</p>");
    assert_eq!(updated.title, second.title);

    assert!(state.notes().delete_note(first.id).await?);
    assert!(state.notes().find_note(first.id).await?.is_none());
    let err = state
        .notes()
        .delete_note(first.id)
        .await
        .expect_err("already deleted");
    assert_eq!(err.code(), NOTE_NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn update_missing_note_reports_not_found() -> Result<()> {
    let state = AppState::in_memory().await?;
    let err = state
        .notes()
        .update_note(
            7_777,
            NotePatch {
                title: Some("New title".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect_err("missing note");
    assert_eq!(err.code(), NOTE_NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn delete_notes_for_patient_counts_rows() -> Result<()> {
    let state = AppState::in_memory().await?;
    let patient = state
        .patients()
        .create_patient(util::patient_input("Ana Ruiz", "ana@x.com"))
        .await?;
    for title in ["One", "Two", "Three"] {
        state
            .notes()
            .create_note(util::note_input(patient.id, title))
            .await?;
    }

    let removed = state.notes().delete_notes_for_patient(patient.id).await?;
    assert_eq!(removed, 3);
    assert!(state.notes().notes_for_patient(patient.id).await?.is_empty());

    let err = state
        .notes()
        .delete_notes_for_patient(4_242)
        .await
        .expect_err("no such patient");
    assert_eq!(err.code(), PATIENT_NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn deleting_a_patient_cascades_to_notes() -> Result<()> {
    let state = AppState::in_memory().await?;
    let created = state
        .patients()
        .create_patient(util::patient_input("Ana Ruiz", "ana@x.com"))
        .await?;
    assert_eq!(created.email, "ana@x.com");
    assert_eq!(created.status, PatientStatus::Active);

    state
        .notes()
        .create_note(util::note_input(created.id, "Intake"))
        .await?;
    assert_eq!(state.notes().count_notes().await?, 1);

    state.patients().delete_patient(created.id).await?;
    assert!(state.notes().notes_for_patient(created.id).await?.is_empty());
    assert_eq!(state.notes().count_notes().await?, 0);
    Ok(())
}
