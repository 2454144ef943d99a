//! Dates in the hospital records are typed by hand.
//!
//! We see `2021-03-07`, `2021/3/7`, `2021-3` and `2021`, sometimes in the same column. Anything
//! with at least a year and a month is kept; a missing day is imputed as the 15th, the middle of
//! the month. Everything else becomes `None` rather than an error, and shows up later as a
//! missing follow-up time.
use chrono::NaiveDate;

/// Day used when only the year and month are known.
pub const IMPUTED_DAY: &str = "15";

pub fn reconstruct(input: &str) -> Option<NaiveDate> {
    let normalized = input.trim().replace('/', "-");
    let mut parts = normalized.split('-');
    let year = parts.next()?;
    let month = parts.next()?;
    let day = match parts.next() {
        Some(day) => format!("{:0>2}", day),
        None => IMPUTED_DAY.to_owned(),
    };
    let text = format!("{}-{:0>2}-{}", year, month, day);
    NaiveDate::parse_from_str(&text, "%Y-%m-%d").ok()
}

/// [`reconstruct`] lifted over a nullable field.
pub fn reconstruct_opt(input: Option<&str>) -> Option<NaiveDate> {
    input.and_then(reconstruct)
}
