#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(dead_code)]

use chrono::NaiveDate;

use consulta_lib::ledger::LedgerHandle;
use consulta_lib::migrate::MigrationRunner;
use consulta_lib::model::{
    EmergencyContactInput, Gender, LegalTutorInput, MaritalStatus, NoteInput, PatientInput,
    PatientStatus, SexualOrientation,
};
use consulta_lib::Store;

/// Fresh in-memory store with every migration applied through a memory
/// ledger.
pub async fn migrated_store() -> Store {
    let store = Store::in_memory().await.expect("open in-memory store");
    let runner = MigrationRunner::new(store.pool().clone(), LedgerHandle::in_memory());
    runner.apply_pending().await.expect("apply migrations");
    store
}

pub fn patient_input(name: &str, email: &str) -> PatientInput {
    PatientInput {
        name: name.to_string(),
        age: 34,
        email: email.to_string(),
        phone_number: "600111222".to_string(),
        birth_date: NaiveDate::from_ymd_opt(1991, 4, 2).expect("date"),
        marital_status: MaritalStatus::Single,
        gender: Gender::Female,
        sexual_orientation: SexualOrientation::PreferNotToSay,
        educational_level: "degree".to_string(),
        profession: "teacher".to_string(),
        lives_with: "alone".to_string(),
        children: 0,
        previous_psychological_experience: None,
        first_appointment_date: None,
        status: PatientStatus::Active,
    }
}

pub fn note_input(patient_id: i64, title: &str) -> NoteInput {
    NoteInput {
        patient_id,
        title: title.to_string(),
        content: "<p>Session summary.</p>".to_string(),
    }
}

pub fn contact_input(patient_id: i64, email: &str) -> EmergencyContactInput {
    EmergencyContactInput {
        patient_id,
        full_name: "Luis Ruiz".to_string(),
        phone_number: "611222333".to_string(),
        relation: "brother".to_string(),
        email: email.to_string(),
        address: None,
    }
}

pub fn tutor_input(patient_id: i64, email: &str) -> LegalTutorInput {
    LegalTutorInput {
        patient_id,
        full_name: "Carmen Ruiz".to_string(),
        phone_number: "622333444".to_string(),
        relation: "mother".to_string(),
        email: email.to_string(),
        birth_date: NaiveDate::from_ymd_opt(1966, 9, 14).expect("date"),
        address: Some("Calle Mayor 5".to_string()),
    }
}
