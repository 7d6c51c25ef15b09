use crate::error::AppResult;
use crate::model::{EmergencyContact, EmergencyContactInput, EmergencyContactPatch};
use crate::repo::contacts::contact_not_found;
use crate::repo::patients::patient_not_found;
use crate::repo::{ContactsRepo, PatientsRepo};
use crate::service::validate::{check_email, require_nonempty};

#[derive(Clone)]
pub struct ContactService {
    contacts: ContactsRepo,
    patients: PatientsRepo,
}

impl ContactService {
    pub fn new(contacts: ContactsRepo, patients: PatientsRepo) -> Self {
        ContactService { contacts, patients }
    }

    pub async fn create_contact(
        &self,
        input: EmergencyContactInput,
    ) -> AppResult<EmergencyContact> {
        let input = normalize_input(input);
        validate_input(&input)?;
        if !self.patients.exists(input.patient_id).await? {
            return Err(patient_not_found(input.patient_id));
        }
        self.contacts.create(&input).await
    }

    pub async fn find_contact(&self, id: i64) -> AppResult<Option<EmergencyContact>> {
        self.contacts.find_by_id(id).await
    }

    pub async fn contacts_for_patient(&self, patient_id: i64) -> AppResult<Vec<EmergencyContact>> {
        self.contacts.find_by_patient_id(patient_id).await
    }

    pub async fn update_contact(
        &self,
        id: i64,
        patch: EmergencyContactPatch,
    ) -> AppResult<EmergencyContact> {
        if !self.contacts.exists(id).await? {
            return Err(contact_not_found(id));
        }
        let patch = normalize_patch(patch);
        validate_patch(&patch)?;
        self.contacts.update(id, &patch).await
    }

    pub async fn delete_contact(&self, id: i64) -> AppResult<bool> {
        if !self.contacts.exists(id).await? {
            return Err(contact_not_found(id));
        }
        self.contacts.delete(id).await
    }

    pub async fn count_contacts(&self) -> AppResult<i64> {
        self.contacts.count().await
    }
}

fn normalize_input(mut input: EmergencyContactInput) -> EmergencyContactInput {
    input.full_name = input.full_name.trim().to_string();
    input.phone_number = input.phone_number.trim().to_string();
    input.relation = input.relation.trim().to_string();
    input.email = input.email.trim().to_lowercase();
    input.address = input.address.map(|s| s.trim().to_string());
    input
}

fn normalize_patch(mut patch: EmergencyContactPatch) -> EmergencyContactPatch {
    patch.full_name = patch.full_name.map(|s| s.trim().to_string());
    patch.phone_number = patch.phone_number.map(|s| s.trim().to_string());
    patch.relation = patch.relation.map(|s| s.trim().to_string());
    patch.email = patch.email.map(|s| s.trim().to_lowercase());
    patch.address = patch.address.map(|s| s.trim().to_string());
    patch
}

fn validate_input(input: &EmergencyContactInput) -> AppResult<()> {
    require_nonempty(&input.full_name, "fullName")?;
    require_nonempty(&input.phone_number, "phoneNumber")?;
    require_nonempty(&input.relation, "relation")?;
    check_email(&input.email)?;
    Ok(())
}

fn validate_patch(patch: &EmergencyContactPatch) -> AppResult<()> {
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
    Ok(())
}
