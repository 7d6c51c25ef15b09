use chrono::NaiveDate;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::error::{AppError, AppResult};
use crate::model::RECORDS_DECODE_ERROR;

pub mod contacts;
pub mod notes;
pub mod patients;
pub mod tutors;

pub use contacts::ContactsRepo;
pub use notes::NotesRepo;
pub use patients::PatientsRepo;
pub use tutors::TutorsRepo;

/// Listing order shared by every entity: newest first, ties broken by id.
pub(crate) const NEWEST_FIRST: &str = "createdAt DESC, id DESC";

/// Explicit column/value pairs for a partial UPDATE. Columns are enumerated
/// by the repositories one field at a time, so the set of updatable columns
/// stays statically visible.
#[derive(Debug, Default)]
pub struct SetClause {
    columns: Vec<&'static str>,
    values: Vec<Value>,
}

impl SetClause {
    pub fn new() -> Self {
        SetClause::default()
    }

    pub fn push(&mut self, column: &'static str, value: Value) {
        self.columns.push(column);
        self.values.push(value);
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Renders `col1 = ?, col2 = ?` in push order.
    pub fn sql(&self) -> String {
        self.columns
            .iter()
            .map(|c| format!("{c} = ?"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Escape `%`, `_` and the escape character itself so a search term is always
/// matched as a literal substring. Pair with `LIKE ? ESCAPE '\'`.
pub(crate) fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub(crate) fn like_pattern(term: &str) -> String {
    format!("%{}%", escape_like(term))
}

pub(crate) fn column_error(err: sqlx::Error, column: &str) -> AppError {
    AppError::from(err).with_context("column", column.to_string())
}

/// `try_get` with the failing column recorded on the error.
pub(crate) fn col<'r, T>(row: &'r SqliteRow, column: &str) -> AppResult<T>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column).map_err(|err| column_error(err, column))
}

pub(crate) fn get_date(row: &SqliteRow, column: &str) -> AppResult<NaiveDate> {
    let raw: String = row.try_get(column).map_err(|e| column_error(e, column))?;
    parse_date(&raw, column)
}

pub(crate) fn get_opt_date(row: &SqliteRow, column: &str) -> AppResult<Option<NaiveDate>> {
    let raw: Option<String> = row.try_get(column).map_err(|e| column_error(e, column))?;
    raw.as_deref().map(|s| parse_date(s, column)).transpose()
}

pub(crate) fn parse_date(raw: &str, column: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|err| {
        AppError::new(RECORDS_DECODE_ERROR, "Stored date is not in YYYY-MM-DD form")
            .with_context("column", column.to_string())
            .with_context("value", raw.to_string())
            .with_context("error", err.to_string())
    })
}

pub(crate) fn missing_after_insert(table: &'static str, id: i64) -> AppError {
    AppError::new(
        crate::model::INTEGRITY_CREATE_FETCH,
        "Inserted row could not be read back",
    )
    .with_context("table", table)
    .with_context("id", id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_clause_renders_columns_in_push_order() {
        let mut set = SetClause::new();
        set.push("name", Value::from("Ana"));
        set.push("age", Value::from(34));
        assert_eq!(set.sql(), "name = ?, age = ?");
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.into_values(),
            vec![Value::from("Ana"), Value::from(34)]
        );
    }

    #[test]
    fn empty_set_clause_is_reported() {
        let set = SetClause::new();
        assert!(set.is_empty());
        assert_eq!(set.sql(), "");
    }

    #[test]
    fn like_escaping_neutralizes_wildcards() {
        assert_eq!(escape_like("50%_plan"), "50\\%\\_plan");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
        assert_eq!(like_pattern("ana"), "%ana%");
    }

    #[test]
    fn parse_date_rejects_non_iso_text() {
        assert!(parse_date("1991-04-02", "birthDate").is_ok());
        let err = parse_date("02/04/1991", "birthDate").unwrap_err();
        assert_eq!(err.code(), RECORDS_DECODE_ERROR);
        assert_eq!(err.context().get("column"), Some(&"birthDate".to_string()));
    }
}
