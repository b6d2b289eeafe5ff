//! Date-key parsing and week arithmetic. Dates carry no timezone; the
//! producing system resolves its civil timezone before calling in.

use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::ReconcileError;

/// Parse a strict canonical `YYYY-MM-DD` date key.
///
/// Non-canonical but parseable inputs (`2026-2-9`) are rejected too, so the
/// same day can never appear under two different keys.
pub fn parse_date(input: &str) -> Result<NaiveDate, ReconcileError> {
    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|e| {
        ReconcileError::InvalidDate {
            input: input.to_string(),
            reason: e.to_string(),
        }
    })?;
    if date.format("%Y-%m-%d").to_string() != input {
        return Err(ReconcileError::InvalidDate {
            input: input.to_string(),
            reason: "not in canonical YYYY-MM-DD form".to_string(),
        });
    }
    Ok(date)
}

/// Monday and Sunday bounds of the ISO week containing `date`.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = date - Days::new(date.weekday().num_days_from_monday() as u64);
    (monday, monday + Days::new(6))
}

/// Monday and Sunday of the week before the one starting at `monday`.
pub fn previous_week(monday: NaiveDate) -> (NaiveDate, NaiveDate) {
    let prev_monday = monday - Days::new(7);
    (prev_monday, prev_monday + Days::new(6))
}

pub fn is_monday(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Mon
}

pub fn iso_week(date: NaiveDate) -> u32 {
    date.iso_week().week()
}

/// All dates from `start` to `end` inclusive; empty when `start > end`.
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}
