use futures::FutureExt;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;

use crate::error::{AppError, AppResult};
use crate::model::{EmergencyContact, EmergencyContactInput, EmergencyContactPatch, CONTACT_NOT_FOUND};
use crate::repo::{col, missing_after_insert, SetClause};
use crate::store::Store;
use crate::time::now_ms;

const CONTACT_COLUMNS: &str =
    "id, patientId, fullName, phoneNumber, relation, email, address, createdAt, updatedAt";

pub fn contact_not_found(id: i64) -> AppError {
    AppError::new(CONTACT_NOT_FOUND, "No emergency contact with this id")
        .with_context("id", id.to_string())
}

pub(crate) fn map_contact(row: &SqliteRow) -> AppResult<EmergencyContact> {
    Ok(EmergencyContact {
        id: col(row, "id")?,
        patient_id: col(row, "patientId")?,
        full_name: col(row, "fullName")?,
        phone_number: col(row, "phoneNumber")?,
        relation: col(row, "relation")?,
        email: col(row, "email")?,
        address: col(row, "address")?,
        created_at: col(row, "createdAt")?,
        updated_at: col(row, "updatedAt")?,
    })
}

#[derive(Clone)]
pub struct ContactsRepo {
    store: Store,
}

impl ContactsRepo {
    pub fn new(store: Store) -> Self {
        ContactsRepo { store }
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<EmergencyContact>> {
        let row = sqlx::query(&format!(
            "SELECT {CONTACT_COLUMNS} FROM emergency_contacts WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.store.pool())
        .await
        .map_err(AppError::from)?;
        row.as_ref().map(map_contact).transpose()
    }

    pub async fn find_all(&self) -> AppResult<Vec<EmergencyContact>> {
        let rows = sqlx::query(&format!(
            "SELECT {CONTACT_COLUMNS} FROM emergency_contacts ORDER BY {}",
            super::NEWEST_FIRST
        ))
        .fetch_all(self.store.pool())
        .await
        .map_err(AppError::from)?;
        rows.iter().map(map_contact).collect()
    }

    pub async fn find_by_patient_id(&self, patient_id: i64) -> AppResult<Vec<EmergencyContact>> {
        let rows = sqlx::query(&format!(
            "SELECT {CONTACT_COLUMNS} FROM emergency_contacts WHERE patientId = ? ORDER BY {}",
            super::NEWEST_FIRST
        ))
        .bind(patient_id)
        .fetch_all(self.store.pool())
        .await
        .map_err(AppError::from)?;
        rows.iter().map(map_contact).collect()
    }

    pub async fn create(&self, input: &EmergencyContactInput) -> AppResult<EmergencyContact> {
        let input = input.clone();
        let now = now_ms();
        self.store
            .run_in_tx(move |tx| {
                async move {
                    let result = sqlx::query(
                        "INSERT INTO emergency_contacts \
                         (patientId, fullName, phoneNumber, relation, email, address, createdAt, \
                         updatedAt) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    )
                    .bind(input.patient_id)
                    .bind(&input.full_name)
                    .bind(&input.phone_number)
                    .bind(&input.relation)
                    .bind(&input.email)
                    .bind(&input.address)
                    .bind(now)
                    .bind(now)
                    .execute(&mut **tx)
                    .await
                    .map_err(AppError::from)?;

                    let id = result.last_insert_rowid();
                    let row = sqlx::query(&format!(
                        "SELECT {CONTACT_COLUMNS} FROM emergency_contacts WHERE id = ?"
                    ))
                    .bind(id)
                    .fetch_optional(&mut **tx)
                    .await
                    .map_err(AppError::from)?;

                    let row = row.ok_or_else(|| missing_after_insert("emergency_contacts", id))?;
                    map_contact(&row)
                }
                .boxed()
            })
            .await
    }

    pub async fn update(&self, id: i64, patch: &EmergencyContactPatch) -> AppResult<EmergencyContact> {
        let mut set = SetClause::new();
        if let Some(v) = &patch.full_name {
            set.push("fullName", Value::from(v.clone()));
        }
        if let Some(v) = &patch.phone_number {
            set.push("phoneNumber", Value::from(v.clone()));
        }
        if let Some(v) = &patch.relation {
            set.push("relation", Value::from(v.clone()));
        }
        if let Some(v) = &patch.email {
            set.push("email", Value::from(v.clone()));
        }
        if let Some(v) = &patch.address {
            set.push("address", Value::from(v.clone()));
        }

        if set.is_empty() {
            return self.require(id).await;
        }

        set.push("updatedAt", Value::from(now_ms()));
        let sql = format!("UPDATE emergency_contacts SET {} WHERE id = ?", set.sql());
        let mut params = set.into_values();
        params.push(Value::from(id));
        self.store.execute(&sql, &params).await?;
        self.require(id).await
    }

    pub async fn delete(&self, id: i64) -> AppResult<bool> {
        let result = self
            .store
            .execute(
                "DELETE FROM emergency_contacts WHERE id = ?",
                &[Value::from(id)],
            )
            .await?;
        Ok(result.changes > 0)
    }

    pub async fn exists(&self, id: i64) -> AppResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM emergency_contacts WHERE id = ?")
            .bind(id)
            .fetch_optional(self.store.pool())
            .await
            .map_err(AppError::from)?;
        Ok(found.is_some())
    }

    pub async fn count(&self) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM emergency_contacts")
            .fetch_one(self.store.pool())
            .await
            .map_err(AppError::from)
    }

    async fn require(&self, id: i64) -> AppResult<EmergencyContact> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| contact_not_found(id))
    }
}
