use futures::FutureExt;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;

use crate::error::{AppError, AppResult};
use crate::model::{LegalTutor, LegalTutorInput, LegalTutorPatch, TUTOR_NOT_FOUND};
use crate::repo::{col, get_date, missing_after_insert, SetClause};
use crate::store::Store;
use crate::time::now_ms;

const TUTOR_COLUMNS: &str =
    "id, patientId, fullName, phoneNumber, relation, email, birthDate, address, createdAt, \
     updatedAt";

pub fn tutor_not_found(id: i64) -> AppError {
    AppError::new(TUTOR_NOT_FOUND, "No legal tutor with this id")
        .with_context("id", id.to_string())
}

pub(crate) fn map_tutor(row: &SqliteRow) -> AppResult<LegalTutor> {
    Ok(LegalTutor {
        id: col(row, "id")?,
        patient_id: col(row, "patientId")?,
        full_name: col(row, "fullName")?,
        phone_number: col(row, "phoneNumber")?,
        relation: col(row, "relation")?,
        email: col(row, "email")?,
        birth_date: get_date(row, "birthDate")?,
        address: col(row, "address")?,
        created_at: col(row, "createdAt")?,
        updated_at: col(row, "updatedAt")?,
    })
}

#[derive(Clone)]
pub struct TutorsRepo {
    store: Store,
}

impl TutorsRepo {
    pub fn new(store: Store) -> Self {
        TutorsRepo { store }
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<LegalTutor>> {
        let row = sqlx::query(&format!(
            "SELECT {TUTOR_COLUMNS} FROM legal_tutors WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.store.pool())
        .await
        .map_err(AppError::from)?;
        row.as_ref().map(map_tutor).transpose()
    }

    pub async fn find_all(&self) -> AppResult<Vec<LegalTutor>> {
        let rows = sqlx::query(&format!(
            "SELECT {TUTOR_COLUMNS} FROM legal_tutors ORDER BY {}",
            super::NEWEST_FIRST
        ))
        .fetch_all(self.store.pool())
        .await
        .map_err(AppError::from)?;
        rows.iter().map(map_tutor).collect()
    }

    pub async fn find_by_patient_id(&self, patient_id: i64) -> AppResult<Vec<LegalTutor>> {
        let rows = sqlx::query(&format!(
            "SELECT {TUTOR_COLUMNS} FROM legal_tutors WHERE patientId = ? ORDER BY {}",
            super::NEWEST_FIRST
        ))
        .bind(patient_id)
        .fetch_all(self.store.pool())
        .await
        .map_err(AppError::from)?;
        rows.iter().map(map_tutor).collect()
    }

    pub async fn create(&self, input: &LegalTutorInput) -> AppResult<LegalTutor> {
        let input = input.clone();
        let now = now_ms();
        self.store
            .run_in_tx(move |tx| {
                async move {
                    let result = sqlx::query(
                        "INSERT INTO legal_tutors \
                         (patientId, fullName, phoneNumber, relation, email, birthDate, address, \
                         createdAt, updatedAt) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    )
                    .bind(input.patient_id)
                    .bind(&input.full_name)
                    .bind(&input.phone_number)
                    .bind(&input.relation)
                    .bind(&input.email)
                    .bind(input.birth_date.to_string())
                    .bind(&input.address)
                    .bind(now)
                    .bind(now)
                    .execute(&mut **tx)
                    .await
                    .map_err(AppError::from)?;

                    let id = result.last_insert_rowid();
                    let row = sqlx::query(&format!(
                        "SELECT {TUTOR_COLUMNS} FROM legal_tutors WHERE id = ?"
                    ))
                    .bind(id)
                    .fetch_optional(&mut **tx)
                    .await
                    .map_err(AppError::from)?;

                    let row = row.ok_or_else(|| missing_after_insert("legal_tutors", id))?;
                    map_tutor(&row)
                }
                .boxed()
            })
            .await
    }

    pub async fn update(&self, id: i64, patch: &LegalTutorPatch) -> AppResult<LegalTutor> {
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
        if let Some(v) = patch.birth_date {
            set.push("birthDate", Value::from(v.to_string()));
        }
        if let Some(v) = &patch.address {
            set.push("address", Value::from(v.clone()));
        }

        if set.is_empty() {
            return self.require(id).await;
        }

        set.push("updatedAt", Value::from(now_ms()));
        let sql = format!("UPDATE legal_tutors SET {} WHERE id = ?", set.sql());
        let mut params = set.into_values();
        params.push(Value::from(id));
        self.store.execute(&sql, &params).await?;
        self.require(id).await
    }

    pub async fn delete(&self, id: i64) -> AppResult<bool> {
        let result = self
            .store
            .execute("DELETE FROM legal_tutors WHERE id = ?", &[Value::from(id)])
            .await?;
        Ok(result.changes > 0)
    }

    pub async fn exists(&self, id: i64) -> AppResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM legal_tutors WHERE id = ?")
            .bind(id)
            .fetch_optional(self.store.pool())
            .await
            .map_err(AppError::from)?;
        Ok(found.is_some())
    }

    pub async fn count(&self) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM legal_tutors")
            .fetch_one(self.store.pool())
            .await
            .map_err(AppError::from)
    }

    async fn require(&self, id: i64) -> AppResult<LegalTutor> {
        self.find_by_id(id).await?.ok_or_else(|| tutor_not_found(id))
    }
}
