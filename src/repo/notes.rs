use futures::FutureExt;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;

use crate::error::{AppError, AppResult};
use crate::model::{Note, NoteInput, NotePatch, NOTE_NOT_FOUND};
use crate::repo::{col, like_pattern, missing_after_insert, SetClause};
use crate::store::Store;
use crate::time::now_ms;

const NOTE_COLUMNS: &str = "id, patientId, title, content, createdAt, updatedAt";

pub fn note_not_found(id: i64) -> AppError {
    AppError::new(NOTE_NOT_FOUND, "No note with this id").with_context("id", id.to_string())
}

pub(crate) fn map_note(row: &SqliteRow) -> AppResult<Note> {
    Ok(Note {
        id: col(row, "id")?,
        patient_id: col(row, "patientId")?,
        title: col(row, "title")?,
        content: col(row, "content")?,
        created_at: col(row, "createdAt")?,
        updated_at: col(row, "updatedAt")?,
    })
}

#[derive(Clone)]
pub struct NotesRepo {
    store: Store,
}

impl NotesRepo {
    pub fn new(store: Store) -> Self {
        NotesRepo { store }
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<Note>> {
        let row = sqlx::query(&format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.store.pool())
            .await
            .map_err(AppError::from)?;
        row.as_ref().map(map_note).transpose()
    }

    pub async fn find_all(&self) -> AppResult<Vec<Note>> {
        let rows = sqlx::query(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes ORDER BY {}",
            super::NEWEST_FIRST
        ))
        .fetch_all(self.store.pool())
        .await
        .map_err(AppError::from)?;
        rows.iter().map(map_note).collect()
    }

    pub async fn find_by_patient_id(&self, patient_id: i64) -> AppResult<Vec<Note>> {
        let rows = sqlx::query(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE patientId = ? ORDER BY {}",
            super::NEWEST_FIRST
        ))
        .bind(patient_id)
        .fetch_all(self.store.pool())
        .await
        .map_err(AppError::from)?;
        rows.iter().map(map_note).collect()
    }

    /// Case-insensitive substring search over title and content.
    pub async fn search(&self, term: &str) -> AppResult<Vec<Note>> {
        let pattern = like_pattern(term.trim());
        let rows = sqlx::query(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes \
             WHERE (title LIKE ?1 ESCAPE '\\' OR content LIKE ?1 ESCAPE '\\') \
             ORDER BY {}",
            super::NEWEST_FIRST
        ))
        .bind(&pattern)
        .fetch_all(self.store.pool())
        .await
        .map_err(AppError::from)?;
        rows.iter().map(map_note).collect()
    }

    pub async fn create(&self, input: &NoteInput) -> AppResult<Note> {
        let input = input.clone();
        let now = now_ms();
        self.store
            .run_in_tx(move |tx| {
                async move {
                    let result = sqlx::query(
                        "INSERT INTO notes (patientId, title, content, createdAt, updatedAt) \
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                    )
                    .bind(input.patient_id)
                    .bind(&input.title)
                    .bind(&input.content)
                    .bind(now)
                    .bind(now)
                    .execute(&mut **tx)
                    .await
                    .map_err(AppError::from)?;

                    let id = result.last_insert_rowid();
                    let row =
                        sqlx::query(&format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?"))
                            .bind(id)
                            .fetch_optional(&mut **tx)
                            .await
                            .map_err(AppError::from)?;

                    let row = row.ok_or_else(|| missing_after_insert("notes", id))?;
                    map_note(&row)
                }
                .boxed()
            })
            .await
    }

    pub async fn update(&self, id: i64, patch: &NotePatch) -> AppResult<Note> {
        let mut set = SetClause::new();
        if let Some(v) = &patch.title {
            set.push("title", Value::from(v.clone()));
        }
        if let Some(v) = &patch.content {
            set.push("content", Value::from(v.clone()));
        }

        if set.is_empty() {
            return self.require(id).await;
        }

        set.push("updatedAt", Value::from(now_ms()));
        let sql = format!("UPDATE notes SET {} WHERE id = ?", set.sql());
        let mut params = set.into_values();
        params.push(Value::from(id));
        self.store.execute(&sql, &params).await?;
        self.require(id).await
    }

    pub async fn delete(&self, id: i64) -> AppResult<bool> {
        let result = self
            .store
            .execute("DELETE FROM notes WHERE id = ?", &[Value::from(id)])
            .await?;
        Ok(result.changes > 0)
    }

    /// Remove every note for a patient; returns the number of rows deleted.
    pub async fn delete_by_patient_id(&self, patient_id: i64) -> AppResult<u64> {
        let result = self
            .store
            .execute(
                "DELETE FROM notes WHERE patientId = ?",
                &[Value::from(patient_id)],
            )
            .await?;
        Ok(result.changes)
    }

    pub async fn exists(&self, id: i64) -> AppResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM notes WHERE id = ?")
            .bind(id)
            .fetch_optional(self.store.pool())
            .await
            .map_err(AppError::from)?;
        Ok(found.is_some())
    }

    pub async fn count(&self) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM notes")
            .fetch_one(self.store.pool())
            .await
            .map_err(AppError::from)
    }

    async fn require(&self, id: i64) -> AppResult<Note> {
        self.find_by_id(id).await?.ok_or_else(|| note_not_found(id))
    }
}
