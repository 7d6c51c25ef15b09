use futures::FutureExt;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;

use crate::error::{AppError, AppResult};
use crate::model::{Patient, PatientInput, PatientPatch, PatientStatus, PATIENT_NOT_FOUND};
use crate::repo::{col, get_date, get_opt_date, like_pattern, missing_after_insert, SetClause};
use crate::store::Store;
use crate::time::now_ms;

const PATIENT_COLUMNS: &str = "id, name, age, email, phoneNumber, birthDate, maritalStatus, \
     gender, sexualOrientation, educationalLevel, profession, livesWith, children, \
     previousPsychologicalExperience, firstAppointmentDate, status, createdAt, updatedAt";

pub fn patient_not_found(id: i64) -> AppError {
    AppError::new(PATIENT_NOT_FOUND, "No patient with this id")
        .with_context("id", id.to_string())
}

pub(crate) fn map_patient(row: &SqliteRow) -> AppResult<Patient> {
    Ok(Patient {
        id: col(row, "id")?,
        name: col(row, "name")?,
        age: col(row, "age")?,
        email: col(row, "email")?,
        phone_number: col(row, "phoneNumber")?,
        birth_date: get_date(row, "birthDate")?,
        marital_status: col(row, "maritalStatus")?,
        gender: col(row, "gender")?,
        sexual_orientation: col(row, "sexualOrientation")?,
        educational_level: col(row, "educationalLevel")?,
        profession: col(row, "profession")?,
        lives_with: col(row, "livesWith")?,
        children: col(row, "children")?,
        previous_psychological_experience: col(row, "previousPsychologicalExperience")?,
        first_appointment_date: get_opt_date(row, "firstAppointmentDate")?,
        status: col(row, "status")?,
        created_at: col(row, "createdAt")?,
        updated_at: col(row, "updatedAt")?,
    })
}

#[derive(Clone)]
pub struct PatientsRepo {
    store: Store,
}

impl PatientsRepo {
    pub fn new(store: Store) -> Self {
        PatientsRepo { store }
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<Patient>> {
        let row = sqlx::query(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.store.pool())
        .await
        .map_err(AppError::from)?;
        row.as_ref().map(map_patient).transpose()
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<Patient>> {
        let row = sqlx::query(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(self.store.pool())
        .await
        .map_err(AppError::from)?;
        row.as_ref().map(map_patient).transpose()
    }

    pub async fn find_all(&self) -> AppResult<Vec<Patient>> {
        let rows = sqlx::query(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients ORDER BY {}",
            super::NEWEST_FIRST
        ))
        .fetch_all(self.store.pool())
        .await
        .map_err(AppError::from)?;
        rows.iter().map(map_patient).collect()
    }

    pub async fn find_by_status(&self, status: PatientStatus) -> AppResult<Vec<Patient>> {
        let rows = sqlx::query(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE status = ? ORDER BY {}",
            super::NEWEST_FIRST
        ))
        .bind(status)
        .fetch_all(self.store.pool())
        .await
        .map_err(AppError::from)?;
        rows.iter().map(map_patient).collect()
    }

    /// Case-insensitive substring search over name, email and phone number,
    /// optionally narrowed to one lifecycle status.
    pub async fn search(
        &self,
        term: &str,
        status: Option<PatientStatus>,
    ) -> AppResult<Vec<Patient>> {
        let pattern = like_pattern(term.trim());
        let mut sql = format!(
            "SELECT {PATIENT_COLUMNS} FROM patients \
             WHERE (name LIKE ?1 ESCAPE '\\' OR email LIKE ?1 ESCAPE '\\' \
                OR phoneNumber LIKE ?1 ESCAPE '\\')"
        );
        if status.is_some() {
            sql.push_str(" AND status = ?2");
        }
        sql.push_str(&format!(" ORDER BY {}", super::NEWEST_FIRST));

        let mut query = sqlx::query(&sql).bind(&pattern);
        if let Some(status) = status {
            query = query.bind(status);
        }
        let rows = query
            .fetch_all(self.store.pool())
            .await
            .map_err(AppError::from)?;
        rows.iter().map(map_patient).collect()
    }

    /// Insert and re-read inside one transaction so the returned record is
    /// exactly what the store persisted.
    pub async fn create(&self, input: &PatientInput) -> AppResult<Patient> {
        let input = input.clone();
        let now = now_ms();
        self.store
            .run_in_tx(move |tx| {
                async move {
                    let result = sqlx::query(
                        "INSERT INTO patients (name, age, email, phoneNumber, birthDate, \
                         maritalStatus, gender, sexualOrientation, educationalLevel, profession, \
                         livesWith, children, previousPsychologicalExperience, \
                         firstAppointmentDate, status, createdAt, updatedAt) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, \
                         ?15, ?16, ?17)",
                    )
                    .bind(&input.name)
                    .bind(input.age)
                    .bind(&input.email)
                    .bind(&input.phone_number)
                    .bind(input.birth_date.to_string())
                    .bind(input.marital_status)
                    .bind(input.gender)
                    .bind(input.sexual_orientation)
                    .bind(&input.educational_level)
                    .bind(&input.profession)
                    .bind(&input.lives_with)
                    .bind(input.children)
                    .bind(&input.previous_psychological_experience)
                    .bind(input.first_appointment_date.map(|d| d.to_string()))
                    .bind(input.status)
                    .bind(now)
                    .bind(now)
                    .execute(&mut **tx)
                    .await
                    .map_err(AppError::from)?;

                    let id = result.last_insert_rowid();
                    let row = sqlx::query(&format!(
                        "SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?"
                    ))
                    .bind(id)
                    .fetch_optional(&mut **tx)
                    .await
                    .map_err(AppError::from)?;

                    let row = row.ok_or_else(|| missing_after_insert("patients", id))?;
                    map_patient(&row)
                }
                .boxed()
            })
            .await
    }

    /// Partial update. An empty patch issues no write and just re-fetches.
    pub async fn update(&self, id: i64, patch: &PatientPatch) -> AppResult<Patient> {
        let mut set = SetClause::new();
        if let Some(v) = &patch.name {
            set.push("name", Value::from(v.clone()));
        }
        if let Some(v) = patch.age {
            set.push("age", Value::from(v));
        }
        if let Some(v) = &patch.email {
            set.push("email", Value::from(v.clone()));
        }
        if let Some(v) = &patch.phone_number {
            set.push("phoneNumber", Value::from(v.clone()));
        }
        if let Some(v) = patch.birth_date {
            set.push("birthDate", Value::from(v.to_string()));
        }
        if let Some(v) = patch.marital_status {
            set.push("maritalStatus", Value::from(v.as_str()));
        }
        if let Some(v) = patch.gender {
            set.push("gender", Value::from(v.as_str()));
        }
        if let Some(v) = patch.sexual_orientation {
            set.push("sexualOrientation", Value::from(v.as_str()));
        }
        if let Some(v) = &patch.educational_level {
            set.push("educationalLevel", Value::from(v.clone()));
        }
        if let Some(v) = &patch.profession {
            set.push("profession", Value::from(v.clone()));
        }
        if let Some(v) = &patch.lives_with {
            set.push("livesWith", Value::from(v.clone()));
        }
        if let Some(v) = patch.children {
            set.push("children", Value::from(v));
        }
        if let Some(v) = &patch.previous_psychological_experience {
            set.push("previousPsychologicalExperience", Value::from(v.clone()));
        }
        if let Some(v) = patch.first_appointment_date {
            set.push("firstAppointmentDate", Value::from(v.to_string()));
        }
        if let Some(v) = patch.status {
            set.push("status", Value::from(v.as_str()));
        }

        if set.is_empty() {
            return self.require(id).await;
        }

        set.push("updatedAt", Value::from(now_ms()));
        let sql = format!("UPDATE patients SET {} WHERE id = ?", set.sql());
        let mut params = set.into_values();
        params.push(Value::from(id));
        self.store.execute(&sql, &params).await?;
        self.require(id).await
    }

    pub async fn delete(&self, id: i64) -> AppResult<bool> {
        let result = self
            .store
            .execute("DELETE FROM patients WHERE id = ?", &[Value::from(id)])
            .await?;
        Ok(result.changes > 0)
    }

    pub async fn exists(&self, id: i64) -> AppResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM patients WHERE id = ?")
            .bind(id)
            .fetch_optional(self.store.pool())
            .await
            .map_err(AppError::from)?;
        Ok(found.is_some())
    }

    pub async fn count(&self) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM patients")
            .fetch_one(self.store.pool())
            .await
            .map_err(AppError::from)
    }

    async fn require(&self, id: i64) -> AppResult<Patient> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| patient_not_found(id))
    }
}
