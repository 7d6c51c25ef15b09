use crate::error::AppResult;
use crate::model::{LegalTutor, LegalTutorInput, LegalTutorPatch};
use crate::repo::patients::patient_not_found;
use crate::repo::tutors::tutor_not_found;
use crate::repo::{PatientsRepo, TutorsRepo};
use crate::service::validate::{check_email, check_not_future, require_nonempty};

#[derive(Clone)]
pub struct TutorService {
    tutors: TutorsRepo,
    patients: PatientsRepo,
}

impl TutorService {
    pub fn new(tutors: TutorsRepo, patients: PatientsRepo) -> Self {
        TutorService { tutors, patients }
    }

    pub async fn create_tutor(&self, input: LegalTutorInput) -> AppResult<LegalTutor> {
        let input = normalize_input(input);
        validate_input(&input)?;
        if !self.patients.exists(input.patient_id).await? {
            return Err(patient_not_found(input.patient_id));
        }
        self.tutors.create(&input).await
    }

    pub async fn find_tutor(&self, id: i64) -> AppResult<Option<LegalTutor>> {
        self.tutors.find_by_id(id).await
    }

    pub async fn tutors_for_patient(&self, patient_id: i64) -> AppResult<Vec<LegalTutor>> {
        self.tutors.find_by_patient_id(patient_id).await
    }

    pub async fn update_tutor(&self, id: i64, patch: LegalTutorPatch) -> AppResult<LegalTutor> {
        if !self.tutors.exists(id).await? {
            return Err(tutor_not_found(id));
        }
        let patch = normalize_patch(patch);
        validate_patch(&patch)?;
        self.tutors.update(id, &patch).await
    }

    pub async fn delete_tutor(&self, id: i64) -> AppResult<bool> {
        if !self.tutors.exists(id).await? {
            return Err(tutor_not_found(id));
        }
        self.tutors.delete(id).await
    }

    pub async fn count_tutors(&self) -> AppResult<i64> {
        self.tutors.count().await
    }
}

fn normalize_input(mut input: LegalTutorInput) -> LegalTutorInput {
    input.full_name = input.full_name.trim().to_string();
    input.phone_number = input.phone_number.trim().to_string();
    input.relation = input.relation.trim().to_string();
    input.email = input.email.trim().to_lowercase();
    input.address = input.address.map(|s| s.trim().to_string());
    input
}

fn normalize_patch(mut patch: LegalTutorPatch) -> LegalTutorPatch {
    patch.full_name = patch.full_name.map(|s| s.trim().to_string());
    patch.phone_number = patch.phone_number.map(|s| s.trim().to_string());
    patch.relation = patch.relation.map(|s| s.trim().to_string());
    patch.email = patch.email.map(|s| s.trim().to_lowercase());
    patch.address = patch.address.map(|s| s.trim().to_string());
    patch
}

fn validate_input(input: &LegalTutorInput) -> AppResult<()> {
    require_nonempty(&input.full_name, "fullName")?;
    require_nonempty(&input.phone_number, "phoneNumber")?;
    require_nonempty(&input.relation, "relation")?;
    check_email(&input.email)?;
    check_not_future(input.birth_date, "birthDate")?;
    Ok(())
}

fn validate_patch(patch: &LegalTutorPatch) -> AppResult<()> {
    if let Some(full_name) = &patch.full_name {
        require_nonempty(full_name, "fullName")?;
    }
    if let Some(phone) = &patch.phone_number {
        require_nonempty(phone, "phoneNumber")?;
    }
    if let Some(relation) = &patch.relation {
        require_nonempty(relation, "relation")?;
    }
    if let Some(email) = &patch.email {
        check_email(email)?;
    }
    if let Some(birth_date) = patch.birth_date {
        check_not_future(birth_date, "birthDate")?;
    }
    Ok(())
}
