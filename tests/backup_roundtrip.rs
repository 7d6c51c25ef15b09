use std::io::Write;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use proptest::prelude::*;

use consulta_lib::backup::{
    export_backup, import_backup, percent, ImportProgress, ImportStage, ProgressObserver,
};
use consulta_lib::model::{
    PatientPatch, BACKUP_CORRUPT_ARCHIVE, BACKUP_FILE_EXISTS, BACKUP_UNSUPPORTED_VERSION,
};
use consulta_lib::AppState;

#[path = "util.rs"]
mod util;

/// Two patients with a realistic spread of children, built through the
/// services so the first-appointment rule runs the way it would in the app.
async fn seeded_state() -> Result<AppState> {
    let state = AppState::in_memory().await?;

    let ana = state
        .patients()
        .create_patient(util::patient_input("Ana Ruiz", "ana@x.com"))
        .await?;
    state
        .notes()
        .create_note(util::note_input(ana.id, "Intake"))
        .await?;
    state
        .notes()
        .create_note(util::note_input(ana.id, "Follow-up"))
        .await?;
    state
        .contacts()
        .create_contact(util::contact_input(ana.id, "luis@x.com"))
        .await?;
    state
        .tutors()
        .create_tutor(util::tutor_input(ana.id, "carmen@x.com"))
        .await?;

    let juan = state
        .patients()
        .create_patient(util::patient_input("Juan Pérez", "juan@y.com"))
        .await?;
    state
        .notes()
        .create_note(util::note_input(juan.id, "Intake"))
        .await?;

    Ok(state)
}

#[tokio::test]
async fn export_then_import_round_trips_every_record() -> Result<()> {
    let source = seeded_state().await?;
    let dir = tempfile::tempdir().context("create tempdir")?;
    let archive = dir.path().join("records.json.gz");

    let exported = export_backup(source.store(), &archive).await?;
    assert_eq!(exported.patients, 2);
    assert!(exported.bytes > 0);
    assert!(archive.exists());

    let target = AppState::in_memory().await?;
    let report = import_backup(target.store(), &archive, None).await?;
    assert_eq!(report.patients_added, 2);
    assert_eq!(report.patients_skipped, 0);
    assert_eq!(report.notes_added, 3);
    assert_eq!(report.contacts_added, 1);
    assert_eq!(report.tutors_added, 1);

    let hits = target.patients().search_patients("ana@x.com", None).await?;
    assert_eq!(hits.len(), 1);
    let ana = &hits[0];
    assert_eq!(ana.name, "Ana Ruiz");
    assert_eq!(
        ana.first_appointment_date,
        Some(consulta_lib::time::today()),
        "the stamp set by the first note survives the round trip"
    );

    let mut titles: Vec<String> = target
        .notes()
        .notes_for_patient(ana.id)
        .await?
        .into_iter()
        .map(|n| n.title)
        .collect();
    titles.sort();
    assert_eq!(titles, ["Follow-up", "Intake"]);

    let source_ana = &source.patients().search_patients("ana@x.com", None).await?[0];
    let source_created: Vec<i64> = source
        .notes()
        .notes_for_patient(source_ana.id)
        .await?
        .into_iter()
        .map(|n| n.created_at)
        .collect();
    let target_created: Vec<i64> = target
        .notes()
        .notes_for_patient(ana.id)
        .await?
        .into_iter()
        .map(|n| n.created_at)
        .collect();
    assert_eq!(
        target_created, source_created,
        "archived timestamps are kept, not re-stamped"
    );

    assert_eq!(
        target
            .contacts()
            .contacts_for_patient(ana.id)
            .await?
            .len(),
        1
    );
    assert_eq!(target.tutors().tutors_for_patient(ana.id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn reimporting_the_same_archive_adds_nothing() -> Result<()> {
    let source = seeded_state().await?;
    let dir = tempfile::tempdir()?;
    let archive = dir.path().join("records.json.gz");
    export_backup(source.store(), &archive).await?;

    let target = AppState::in_memory().await?;
    import_backup(target.store(), &archive, None).await?;
    let second = import_backup(target.store(), &archive, None).await?;

    assert_eq!(second.patients_added, 0);
    assert_eq!(second.patients_skipped, 2);
    assert_eq!(second.notes_added, 0);
    assert_eq!(second.notes_skipped, 3);
    assert_eq!(second.contacts_added, 0);
    assert_eq!(second.contacts_skipped, 1);
    assert_eq!(second.tutors_added, 0);
    assert_eq!(second.tutors_skipped, 1);
    assert_eq!(target.patients().count_patients().await?, 2);
    Ok(())
}

#[tokio::test]
async fn known_patients_keep_their_fields_but_gain_children() -> Result<()> {
    let source = seeded_state().await?;
    let dir = tempfile::tempdir()?;
    let archive = dir.path().join("records.json.gz");
    export_backup(source.store(), &archive).await?;

    // The target already knows Ana under the same email with a different
    // phone number.
    let target = AppState::in_memory().await?;
    let existing = target
        .patients()
        .create_patient(util::patient_input("Ana R.", "ana@x.com"))
        .await?;
    target
        .patients()
        .update_patient(
            existing.id,
            PatientPatch {
                phone_number: Some("999000111".to_string()),
                ..Default::default()
            },
        )
        .await?;

    let report = import_backup(target.store(), &archive, None).await?;
    assert_eq!(report.patients_added, 1, "only Juan is new");
    assert_eq!(report.patients_skipped, 1);
    assert_eq!(report.notes_added, 3, "children still flow to known patients");

    let ana = target
        .patients()
        .find_patient(existing.id)
        .await?
        .expect("patient present");
    assert_eq!(ana.name, "Ana R.", "stored fields win over the archive");
    assert_eq!(ana.phone_number, "999000111");
    assert_eq!(target.notes().notes_for_patient(ana.id).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn export_refuses_to_overwrite() -> Result<()> {
    let source = seeded_state().await?;
    let dir = tempfile::tempdir()?;
    let archive = dir.path().join("records.json.gz");
    export_backup(source.store(), &archive).await?;

    let before = std::fs::metadata(&archive)?.len();
    let err = export_backup(source.store(), &archive)
        .await
        .expect_err("second export to the same path");
    assert_eq!(err.code(), BACKUP_FILE_EXISTS);
    assert_eq!(
        std::fs::metadata(&archive)?.len(),
        before,
        "the existing file is untouched"
    );
    Ok(())
}

#[tokio::test]
async fn import_rejects_files_that_are_not_gzip() -> Result<()> {
    let state = AppState::in_memory().await?;
    let dir = tempfile::tempdir()?;
    let bogus = dir.path().join("records.json.gz");
    std::fs::write(&bogus, b"this is not an archive")?;

    let err = import_backup(state.store(), &bogus, None)
        .await
        .expect_err("garbage input");
    assert_eq!(err.code(), BACKUP_CORRUPT_ARCHIVE);
    Ok(())
}

#[tokio::test]
async fn import_rejects_unknown_document_versions() -> Result<()> {
    let state = AppState::in_memory().await?;
    let dir = tempfile::tempdir()?;
    let archive = dir.path().join("future.json.gz");

    let doc = serde_json::json!({
        "version": "2.0",
        "exportDate": "2026-01-01T00:00:00.000Z",
        "patients": []
    });
    let mut encoder = GzEncoder::new(std::fs::File::create(&archive)?, Compression::default());
    encoder.write_all(doc.to_string().as_bytes())?;
    encoder.finish()?;

    let err = import_backup(state.store(), &archive, None)
        .await
        .expect_err("version from a newer build");
    assert_eq!(err.code(), BACKUP_UNSUPPORTED_VERSION);
    Ok(())
}

#[tokio::test]
async fn progress_runs_through_the_five_stages() -> Result<()> {
    let source = seeded_state().await?;
    let dir = tempfile::tempdir()?;
    let archive = dir.path().join("records.json.gz");
    export_backup(source.store(), &archive).await?;

    let events: Arc<Mutex<Vec<ImportProgress>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let observer: ProgressObserver = Arc::new(move |progress| {
        sink.lock().unwrap().push(progress);
    });

    let target = AppState::in_memory().await?;
    import_backup(target.store(), &archive, Some(observer)).await?;

    let events = events.lock().unwrap();
    assert_eq!(events[0].stage, ImportStage::Reading);
    assert_eq!(events[1].stage, ImportStage::Parsing);

    let patient_events: Vec<&ImportProgress> = events
        .iter()
        .filter(|e| e.stage == ImportStage::ImportingPatients)
        .collect();
    assert_eq!(patient_events.len(), 2, "one event per patient");
    assert_eq!(patient_events[0].current, 1);
    assert_eq!(patient_events[0].total, 2);
    assert!(patient_events[0].message.contains("(50%)"));
    assert!(patient_events[1].message.contains("(100%)"));

    let note_events = events
        .iter()
        .filter(|e| e.stage == ImportStage::ImportingNotes)
        .count();
    assert_eq!(note_events, 2);

    let last = events.last().expect("at least one event");
    assert_eq!(last.stage, ImportStage::Complete);
    assert_eq!(last.current, last.total);
    Ok(())
}

proptest! {
    #[test]
    fn percent_is_a_floored_ratio(total in 1u64..100_000, current in 0u64..100_000) {
        let current = current.min(total);
        let p = percent(current, total);
        prop_assert!(p <= 100);
        prop_assert!(p * total <= current * 100);
        prop_assert!(current * 100 < (p + 1) * total);
    }

    #[test]
    fn percent_is_monotone_in_current(total in 1u64..10_000, a in 0u64..10_000, b in 0u64..10_000) {
        let lo = a.min(b).min(total);
        let hi = a.max(b).min(total);
        prop_assert!(percent(lo, total) <= percent(hi, total));
    }
}
