use crate::error::{AppError, AppResult};
use crate::model::{Patient, PatientInput, PatientPatch, PatientStatus, VALIDATION_EMAIL_TAKEN};
use crate::repo::patients::patient_not_found;
use crate::repo::PatientsRepo;
use crate::service::validate::{
    check_email, check_non_negative, check_not_future, check_range, require_nonempty,
};

/// Validation and normalization wrapper over the patients repository.
#[derive(Clone)]
pub struct PatientService {
    patients: PatientsRepo,
}

impl PatientService {
    pub fn new(patients: PatientsRepo) -> Self {
        PatientService { patients }
    }

    pub async fn create_patient(&self, input: PatientInput) -> AppResult<Patient> {
        let input = normalize_input(input);
        validate_input(&input)?;
        self.ensure_email_free(&input.email, None).await?;

        let patient = self.patients.create(&input).await?;
        tracing::info!(
            target: "consulta",
            event = "patient_created",
            id = patient.id,
            status = %patient.status
        );
        Ok(patient)
    }

    pub async fn find_patient(&self, id: i64) -> AppResult<Option<Patient>> {
        self.patients.find_by_id(id).await
    }

    pub async fn list_patients(&self) -> AppResult<Vec<Patient>> {
        self.patients.find_all().await
    }

    pub async fn patients_by_status(&self, status: PatientStatus) -> AppResult<Vec<Patient>> {
        self.patients.find_by_status(status).await
    }

    pub async fn search_patients(
        &self,
        term: &str,
        status: Option<PatientStatus>,
    ) -> AppResult<Vec<Patient>> {
        self.patients.search(term, status).await
    }

    pub async fn update_patient(&self, id: i64, patch: PatientPatch) -> AppResult<Patient> {
        if !self.patients.exists(id).await? {
            return Err(patient_not_found(id));
        }
        let patch = normalize_patch(patch);
        validate_patch(&patch)?;
        if let Some(email) = &patch.email {
            self.ensure_email_free(email, Some(id)).await?;
        }
        self.patients.update(id, &patch).await
    }

    pub async fn delete_patient(&self, id: i64) -> AppResult<bool> {
        if !self.patients.exists(id).await? {
            return Err(patient_not_found(id));
        }
        let deleted = self.patients.delete(id).await?;
        tracing::info!(target: "consulta", event = "patient_deleted", id = id);
        Ok(deleted)
    }

    pub async fn count_patients(&self) -> AppResult<i64> {
        self.patients.count().await
    }

    /// Email must not belong to another patient. `exclude` carries the id of
    /// the patient being updated so its own address does not collide.
    async fn ensure_email_free(&self, email: &str, exclude: Option<i64>) -> AppResult<()> {
        if let Some(existing) = self.patients.find_by_email(email).await? {
            if Some(existing.id) != exclude {
                return Err(AppError::new(
                    VALIDATION_EMAIL_TAKEN,
                    "Another patient already uses this email",
                )
                .with_context("email", email.to_string())
                .with_context("patient_id", existing.id.to_string()));
            }
        }
        Ok(())
    }
}

fn normalize_input(mut input: PatientInput) -> PatientInput {
    input.name = input.name.trim().to_string();
    input.email = input.email.trim().to_lowercase();
    input.phone_number = input.phone_number.trim().to_string();
    input.educational_level = input.educational_level.trim().to_string();
    input.profession = input.profession.trim().to_string();
    input.lives_with = input.lives_with.trim().to_string();
    input.previous_psychological_experience = input
        .previous_psychological_experience
        .map(|s| s.trim().to_string());
    input
}

fn normalize_patch(mut patch: PatientPatch) -> PatientPatch {
    patch.name = patch.name.map(|s| s.trim().to_string());
    patch.email = patch.email.map(|s| s.trim().to_lowercase());
    patch.phone_number = patch.phone_number.map(|s| s.trim().to_string());
    patch.educational_level = patch.educational_level.map(|s| s.trim().to_string());
    patch.profession = patch.profession.map(|s| s.trim().to_string());
    patch.lives_with = patch.lives_with.map(|s| s.trim().to_string());
    patch.previous_psychological_experience = patch
        .previous_psychological_experience
        .map(|s| s.trim().to_string());
    patch
}

fn validate_input(input: &PatientInput) -> AppResult<()> {
    require_nonempty(&input.name, "name")?;
    require_nonempty(&input.phone_number, "phoneNumber")?;
    check_email(&input.email)?;
    check_range(input.age, 0, 150, "age")?;
    check_non_negative(input.children, "children")?;
    check_not_future(input.birth_date, "birthDate")?;
    Ok(())
}

fn validate_patch(patch: &PatientPatch) -> AppResult<()> {
    if let Some(name) = &patch.name {
        require_nonempty(name, "name")?;
    }
    if let Some(phone) = &patch.phone_number {
        require_nonempty(phone, "phoneNumber")?;
    }
    if let Some(email) = &patch.email {
        check_email(email)?;
    }
    if let Some(age) = patch.age {
        check_range(age, 0, 150, "age")?;
    }
    if let Some(children) = patch.children {
        check_non_negative(children, "children")?;
    }
    if let Some(birth_date) = patch.birth_date {
        check_not_future(birth_date, "birthDate")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::model::{Gender, MaritalStatus};

    fn base_input() -> PatientInput {
        PatientInput {
            name: "  Ana Ruiz  ".into(),
            age: 34,
            email: " ANA@X.COM ".into(),
            phone_number: " 600 111 222 ".into(),
            birth_date: NaiveDate::from_ymd_opt(1991, 4, 2).unwrap(),
            marital_status: MaritalStatus::Single,
            gender: Gender::Female,
            sexual_orientation: Default::default(),
            educational_level: "degree".into(),
            profession: "engineer".into(),
            lives_with: "alone".into(),
            children: 0,
            previous_psychological_experience: None,
            first_appointment_date: None,
            status: Default::default(),
        }
    }

    #[test]
    fn normalization_trims_and_lowercases() {
        let input = normalize_input(base_input());
        assert_eq!(input.name, "Ana Ruiz");
        assert_eq!(input.email, "ana@x.com");
        assert_eq!(input.phone_number, "600 111 222");
    }

    #[test]
    fn whitespace_only_name_fails_after_normalization() {
        let mut input = base_input();
        input.name = "   ".into();
        let input = normalize_input(input);
        assert!(validate_input(&input).is_err());
    }

    #[test]
    fn patch_normalization_only_touches_supplied_fields() {
        let patch = normalize_patch(PatientPatch {
            email: Some(" NEW@X.COM ".into()),
            ..Default::default()
        });
        assert_eq!(patch.email.as_deref(), Some("new@x.com"));
        assert!(patch.name.is_none());
    }
}
