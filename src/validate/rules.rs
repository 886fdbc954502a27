//! Primitive format rules shared by the step validators.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

/// Minimum applicant age in whole years.
pub const MIN_AGE_YEARS: i32 = 18;
pub const NAME_MAX_LEN: usize = 90;
pub const EMAIL_MAX_LEN: usize = 80;

static PAN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]{5}[0-9]{4}[A-Z]$").unwrap());

static MOBILE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{7,14}$").unwrap());

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
});

/// Loose "looks like an address" shape used to decide when a live duplicate
/// check is worth sending.
static EMAIL_SHAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

static PINCODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{6}$").unwrap());

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z\s]+$").unwrap());

/// 5 uppercase letters, 4 digits, 1 uppercase letter.
pub fn is_valid_pan(value: &str) -> bool {
    PAN_RE.is_match(value)
}

/// 7 to 14 digits, nothing else.
pub fn is_valid_mobile(value: &str) -> bool {
    MOBILE_RE.is_match(value)
}

pub fn is_valid_email(value: &str) -> bool {
    value.chars().count() <= EMAIL_MAX_LEN && EMAIL_RE.is_match(value)
}

pub fn has_email_shape(value: &str) -> bool {
    EMAIL_SHAPE_RE.is_match(value)
}

/// Domestic postal code: exactly 6 digits.
pub fn is_valid_pincode(value: &str) -> bool {
    PINCODE_RE.is_match(value)
}

pub fn is_valid_ifsc_length(value: &str) -> bool {
    (8..=11).contains(&value.chars().count())
}

/// Letters and spaces only, at most 90 characters. Empty is not a name.
pub fn is_valid_name(value: &str) -> bool {
    value.chars().count() <= NAME_MAX_LEN && NAME_RE.is_match(value)
}

/// Whole years between `dob` and `today`, by calendar fields.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut years = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        years -= 1;
    }
    years
}

/// Check an ISO `YYYY-MM-DD` date of birth against `today`.
pub fn check_date_of_birth(raw: &str, today: NaiveDate) -> Result<NaiveDate, &'static str> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("Date of Birth is required");
    }
    let dob = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| "Please enter a valid date")?;
    if dob > today {
        return Err("Date of birth cannot be in the future");
    }
    if age_on(dob, today) < MIN_AGE_YEARS {
        return Err("You must be at least 18 years old");
    }
    Ok(dob)
}
