use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, AppResult};
use crate::model::{
    VALIDATION_EMAIL_FORMAT, VALIDATION_FUTURE_DATE, VALIDATION_OUT_OF_RANGE, VALIDATION_REQUIRED,
    VALIDATION_TOO_LONG,
};
use crate::time::today;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\S+@\S+\.\S+$").expect("email validation pattern to compile"));

pub fn require_nonempty(value: &str, field: &'static str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(
            AppError::new(VALIDATION_REQUIRED, format!("{field} is required"))
                .with_context("field", field),
        );
    }
    Ok(())
}

pub fn check_email(value: &str) -> AppResult<()> {
    if value.is_empty() || !EMAIL_PATTERN.is_match(value) {
        return Err(AppError::new(
            VALIDATION_EMAIL_FORMAT,
            "Email must look like name@domain.tld",
        )
        .with_context("field", "email")
        .with_context("value", value.to_string()));
    }
    Ok(())
}

pub fn check_range(value: i64, min: i64, max: i64, field: &'static str) -> AppResult<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(AppError::new(
            VALIDATION_OUT_OF_RANGE,
            format!("{field} must be between {min} and {max}"),
        )
        .with_context("field", field)
        .with_context("value", value.to_string()))
    }
}

pub fn check_non_negative(value: i64, field: &'static str) -> AppResult<()> {
    if value >= 0 {
        Ok(())
    } else {
        Err(AppError::new(
            VALIDATION_OUT_OF_RANGE,
            format!("{field} cannot be negative"),
        )
        .with_context("field", field)
        .with_context("value", value.to_string()))
    }
}

pub fn check_max_len(value: &str, max: usize, field: &'static str) -> AppResult<()> {
    let length = value.chars().count();
    if length > max {
        return Err(AppError::new(
            VALIDATION_TOO_LONG,
            format!("{field} may be at most {max} characters"),
        )
        .with_context("field", field)
        .with_context("length", length.to_string()));
    }
    Ok(())
}

pub fn check_not_future(date: NaiveDate, field: &'static str) -> AppResult<()> {
    if date > today() {
        return Err(AppError::new(
            VALIDATION_FUTURE_DATE,
            format!("{field} cannot be in the future"),
        )
        .with_context("field", field)
        .with_context("value", date.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn email_shape_accepts_plain_addresses() {
        assert!(check_email("ana@x.com").is_ok());
        assert!(check_email("a.b+c@sub.domain.org").is_ok());
    }

    #[test]
    fn email_shape_rejects_malformed_addresses() {
        for bad in ["", "ana", "ana@", "@x.com", "ana@x", "a na@x.com"] {
            let err = check_email(bad).unwrap_err();
            assert_eq!(err.code(), VALIDATION_EMAIL_FORMAT, "case: {bad:?}");
        }
    }

    #[test]
    fn nonempty_treats_whitespace_as_missing() {
        assert!(require_nonempty("Ana", "name").is_ok());
        let err = require_nonempty("   ", "name").unwrap_err();
        assert_eq!(err.code(), VALIDATION_REQUIRED);
        assert_eq!(err.context().get("field"), Some(&"name".to_string()));
    }

    #[test]
    fn age_range_is_inclusive() {
        assert!(check_range(0, 0, 150, "age").is_ok());
        assert!(check_range(150, 0, 150, "age").is_ok());
        assert_eq!(
            check_range(151, 0, 150, "age").unwrap_err().code(),
            VALIDATION_OUT_OF_RANGE
        );
        assert_eq!(
            check_range(-1, 0, 150, "age").unwrap_err().code(),
            VALIDATION_OUT_OF_RANGE
        );
    }

    #[test]
    fn max_len_counts_characters_not_bytes() {
        let title = "ñ".repeat(500);
        assert!(check_max_len(&title, 500, "title").is_ok());
        let long = "ñ".repeat(501);
        assert_eq!(
            check_max_len(&long, 500, "title").unwrap_err().code(),
            VALIDATION_TOO_LONG
        );
    }

    #[test]
    fn future_dates_are_rejected_today_is_fine() {
        assert!(check_not_future(today(), "birthDate").is_ok());
        let tomorrow = today() + Duration::days(1);
        assert_eq!(
            check_not_future(tomorrow, "birthDate").unwrap_err().code(),
            VALIDATION_FUTURE_DATE
        );
    }
}
