//! Keystroke-level input normalization.
//!
//! Applied to every edit before it reaches the draft, so validators and
//! duplicate checks always see the canonical form of a value.

use crate::validate::rules::EMAIL_MAX_LEN;

use super::fields::{bank, contact, personal};

const PAN_LEN: usize = 10;
const MOBILE_MAX_DIGITS: usize = 14;
const PINCODE_DIGITS: usize = 6;
const ACCOUNT_MAX_DIGITS: usize = 30;
const IFSC_MAX_LEN: usize = 11;
const BANK_NAME_MAX_LEN: usize = 50;

/// Normalize a raw value for `field`. Unknown fields pass through unchanged.
pub fn sanitize(field: &str, raw: &str) -> String {
    match field {
        personal::PAN => sanitize_pan(raw),
        bank::TAX_ID => raw.to_uppercase().chars().take(PAN_LEN).collect(),
        bank::IFSC_CODE => raw.to_uppercase().chars().take(IFSC_MAX_LEN).collect(),
        bank::BANK_NAME => raw
            .to_uppercase()
            .chars()
            .filter(|c| c.is_ascii_uppercase() || c.is_whitespace() || *c == '&')
            .take(BANK_NAME_MAX_LEN)
            .collect(),
        bank::ACCOUNT_NUMBER => digits(raw, ACCOUNT_MAX_DIGITS),
        contact::MOBILE => digits(raw, MOBILE_MAX_DIGITS),
        contact::P_PINCODE => digits(raw, PINCODE_DIGITS),
        contact::EMAIL => raw.trim().chars().take(EMAIL_MAX_LEN).collect(),
        _ => raw.to_string(),
    }
}

fn digits(raw: &str, max: usize) -> String {
    raw.chars().filter(char::is_ascii_digit).take(max).collect()
}

/// Keep only characters that fit their position in `AAAAA9999A`.
fn sanitize_pan(raw: &str) -> String {
    let mut out = String::with_capacity(PAN_LEN);
    for c in raw.to_uppercase().chars().filter(char::is_ascii_alphanumeric) {
        let pos = out.len();
        if pos >= PAN_LEN {
            break;
        }
        let fits = match pos {
            0..=4 | 9 => c.is_ascii_uppercase(),
            _ => c.is_ascii_digit(),
        };
        if fits {
            out.push(c);
        }
    }
    out
}
