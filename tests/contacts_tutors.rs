use anyhow::Result;

use consulta_lib::model::{
    EmergencyContactPatch, LegalTutorPatch, CONTACT_NOT_FOUND, PATIENT_NOT_FOUND, TUTOR_NOT_FOUND,
    VALIDATION_EMAIL_FORMAT, VALIDATION_FUTURE_DATE, VALIDATION_REQUIRED,
};
use consulta_lib::AppState;

#[path = "util.rs"]
mod util;

#[tokio::test]
async fn contact_create_normalizes_and_lists_per_patient() -> Result<()> {
    let state = AppState::in_memory().await?;
    let patient = state
        .patients()
        .create_patient(util::patient_input("Ana Ruiz", "ana@x.com"))
        .await?;

    let mut input = util::contact_input(patient.id, "LUIS@X.COM");
    input.full_name = "  Luis Ruiz  ".to_string();
    let contact = state.contacts().create_contact(input).await?;
    assert_eq!(contact.full_name, "Luis Ruiz");
    assert_eq!(contact.email, "luis@x.com");
    assert_eq!(contact.patient_id, patient.id);

    state
        .contacts()
        .create_contact(util::contact_input(patient.id, "carmen@x.com"))
        .await?;

    let listed = state.contacts().contacts_for_patient(patient.id).await?;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].email, "carmen@x.com", "newest first");
    Ok(())
}

#[tokio::test]
async fn contact_validation_rejects_blank_and_malformed_fields() -> Result<()> {
    let state = AppState::in_memory().await?;
    let patient = state
        .patients()
        .create_patient(util::patient_input("Ana Ruiz", "ana@x.com"))
        .await?;

    let mut input = util::contact_input(patient.id, "luis@x.com");
    input.full_name = "   ".to_string();
    let err = state
        .contacts()
        .create_contact(input)
        .await
        .expect_err("blank full name");
    assert_eq!(err.code(), VALIDATION_REQUIRED);

    let mut input = util::contact_input(patient.id, "luis@x.com");
    input.relation = String::new();
    let err = state
        .contacts()
        .create_contact(input)
        .await
        .expect_err("blank relation");
    assert_eq!(err.code(), VALIDATION_REQUIRED);

    let err = state
        .contacts()
        .create_contact(util::contact_input(patient.id, "not-an-email"))
        .await
        .expect_err("bad email");
    assert_eq!(err.code(), VALIDATION_EMAIL_FORMAT);

    let err = state
        .contacts()
        .create_contact(util::contact_input(4_242, "luis@x.com"))
        .await
        .expect_err("no such patient");
    assert_eq!(err.code(), PATIENT_NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn contact_update_and_delete() -> Result<()> {
    let state = AppState::in_memory().await?;
    let patient = state
        .patients()
        .create_patient(util::patient_input("Ana Ruiz", "ana@x.com"))
        .await?;
    let contact = state
        .contacts()
        .create_contact(util::contact_input(patient.id, "luis@x.com"))
        .await?;

    let patch = EmergencyContactPatch {
        phone_number: Some(" 699888777 ".to_string()),
        ..Default::default()
    };
    let updated = state.contacts().update_contact(contact.id, patch).await?;
    assert_eq!(updated.phone_number, "699888777");
    assert_eq!(updated.full_name, contact.full_name);

    assert!(state.contacts().delete_contact(contact.id).await?);
    assert!(state.contacts().find_contact(contact.id).await?.is_none());

    let err = state
        .contacts()
        .update_contact(
            contact.id,
            EmergencyContactPatch {
                relation: Some("cousin".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect_err("already deleted");
    assert_eq!(err.code(), CONTACT_NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn tutor_create_validates_birth_date() -> Result<()> {
    let state = AppState::in_memory().await?;
    let patient = state
        .patients()
        .create_patient(util::patient_input("Ana Ruiz", "ana@x.com"))
        .await?;

    let mut input = util::tutor_input(patient.id, "carmen@x.com");
    input.birth_date = consulta_lib::time::today().succ_opt().expect("tomorrow");
    let err = state
        .tutors()
        .create_tutor(input)
        .await
        .expect_err("future birth date");
    assert_eq!(err.code(), VALIDATION_FUTURE_DATE);

    let tutor = state
        .tutors()
        .create_tutor(util::tutor_input(patient.id, "CARMEN@X.COM"))
        .await?;
    assert_eq!(tutor.email, "carmen@x.com");
    assert_eq!(tutor.address.as_deref(), Some("Calle Mayor 5"));
    Ok(())
}

#[tokio::test]
async fn tutor_update_and_delete() -> Result<()> {
    let state = AppState::in_memory().await?;
    let patient = state
        .patients()
        .create_patient(util::patient_input("Ana Ruiz", "ana@x.com"))
        .await?;
    let tutor = state
        .tutors()
        .create_tutor(util::tutor_input(patient.id, "carmen@x.com"))
        .await?;

    let patch = LegalTutorPatch {
        address: Some("  Plaza Nueva 2  ".to_string()),
        ..Default::default()
    };
    let updated = state.tutors().update_tutor(tutor.id, patch).await?;
    assert_eq!(updated.address.as_deref(), Some("Plaza Nueva 2"));
    assert_eq!(updated.birth_date, tutor.birth_date);

    let listed = state.tutors().tutors_for_patient(patient.id).await?;
    assert_eq!(listed.len(), 1);

    assert!(state.tutors().delete_tutor(tutor.id).await?);
    let err = state
        .tutors()
        .delete_tutor(tutor.id)
        .await
        .expect_err("already deleted");
    assert_eq!(err.code(), TUTOR_NOT_FOUND);

    let err = state
        .tutors()
        .create_tutor(util::tutor_input(4_242, "carmen@x.com"))
        .await
        .expect_err("no such patient");
    assert_eq!(err.code(), PATIENT_NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn deleting_a_patient_cascades_to_contacts_and_tutors() -> Result<()> {
    let state = AppState::in_memory().await?;
    let patient = state
        .patients()
        .create_patient(util::patient_input("Ana Ruiz", "ana@x.com"))
        .await?;
    state
        .contacts()
        .create_contact(util::contact_input(patient.id, "luis@x.com"))
        .await?;
    state
        .tutors()
        .create_tutor(util::tutor_input(patient.id, "carmen@x.com"))
        .await?;

    state.patients().delete_patient(patient.id).await?;

    // Cascade leaves nothing behind; the listings answer with empty sets
    // rather than an error for the vanished patient id.
    assert!(state
        .contacts()
        .contacts_for_patient(patient.id)
        .await?
        .is_empty());
    assert!(state
        .tutors()
        .tutors_for_patient(patient.id)
        .await?
        .is_empty());
    assert_eq!(state.contacts().count_contacts().await?, 0);
    assert_eq!(state.tutors().count_tutors().await?, 0);
    Ok(())
}
