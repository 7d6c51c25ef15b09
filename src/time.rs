use chrono::{Local, NaiveDate, SecondsFormat, Utc};

/// Millisecond timestamp used for `createdAt`/`updatedAt` columns.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Calendar date in the practitioner's local timezone.
///
/// Appointment days are user-facing dates, so "today" follows the wall
/// clock rather than UTC.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// RFC 3339 instant with millisecond precision, e.g. for export documents.
pub fn iso_now_millis() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_ms_is_reasonable() {
        let a = now_ms();
        assert!(a > 1_500_000_000_000); // after 2017
        assert!(a < 4_100_000_000_000); // before year ~2100
    }

    #[test]
    fn iso_now_has_millis_and_utc_suffix() {
        let s = iso_now_millis();
        assert!(s.ends_with('Z'));
        assert_eq!(s.matches('.').count(), 1);
    }
}
