use chrono::{Duration, NaiveDate, SecondsFormat, Utc};

use crate::error::{Error, Result};

/// Current UTC time in the format stored in `created_at`/`updated_at`/`deleted_at`.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| Error::DateParse(format!("'{s}' is not a YYYY-MM-DD date")))
}

/// Inclusive lower bound on stored timestamps for a date.
pub fn start_of_day(d: NaiveDate) -> String {
    format!("{}T00:00:00.000Z", d.format("%Y-%m-%d"))
}

/// Exclusive upper bound on stored timestamps so that the whole of `d` is included.
pub fn end_of_day_exclusive(d: NaiveDate) -> String {
    start_of_day(d + Duration::days(1))
}
