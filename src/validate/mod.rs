//! Step validators: pure, synchronous rule evaluation per step.
//!
//! `validate` always recomputes the full error map for a draft; an empty map
//! means the draft may be submitted.

pub mod rules;

use chrono::NaiveDate;

use crate::wizard::fields::{
    self, bank, contact, nominee, personal, scheme, upload, ACCOUNT_TYPES, CITIZEN_FLAGS,
    CITIZEN_OVERSEAS, CITIZEN_RESIDENT, DOMESTIC_COUNTRY, GENDERS, LIFE_CYCLE_FUNDS,
    SCHEME_AUTO, SCHEME_CHOICES, STATE_CODES, TAX_RESIDENCIES, TITLES, YES_NO,
};
use crate::wizard::{FieldErrors, Step, StepDraft};

pub use rules::{
    age_on, check_date_of_birth, is_valid_email, is_valid_ifsc_length, is_valid_mobile,
    is_valid_name, is_valid_pan, is_valid_pincode,
};

/// Smallest accepted document upload, in bytes.
pub const DOCUMENT_MIN_BYTES: usize = 4 * 1024;
/// Largest accepted document upload, in bytes.
pub const DOCUMENT_MAX_BYTES: usize = 1024 * 1024;
pub const DOCUMENT_CONTENT_TYPE: &str = "image/jpeg";

/// Validate a draft for `step` as of `today`.
pub fn validate(step: Step, draft: &StepDraft, today: NaiveDate) -> FieldErrors {
    let mut errors = FieldErrors::new();
    match step {
        Step::PersonalDetails => personal_details(draft, today, &mut errors),
        Step::ContactDetails => contact_details(draft, &mut errors),
        Step::BankTaxDetails => bank_tax_details(draft, &mut errors),
        Step::SchemeSelection => scheme_selection(draft, &mut errors),
        Step::NomineeDetails => nominee_details(draft, &mut errors),
        Step::UploadDocuments => upload_documents(draft, &mut errors),
    }
    errors
}

/// Whether the citizenship flag requires an overseas correspondence address.
pub fn requires_overseas_address(citizen_flag: &str) -> bool {
    citizen_flag != CITIZEN_RESIDENT
}

fn one_of(value: &str, allowed: &[&str]) -> bool {
    allowed.contains(&value)
}

/// Optional name: empty is fine, anything else must pass the name rule.
fn optional_name(draft: &StepDraft, field: &str, errors: &mut FieldErrors) {
    let value = draft.get(field);
    if value.is_empty() {
        return;
    }
    if value.chars().count() > rules::NAME_MAX_LEN {
        errors.insert(field, "Maximum 90 characters");
    } else if !is_valid_name(value) {
        errors.insert(field, "Please enter a valid name");
    }
}

fn personal_details(draft: &StepDraft, today: NaiveDate, errors: &mut FieldErrors) {
    let title = draft.get(personal::TITLE);
    if title.is_empty() {
        errors.insert(personal::TITLE, "Title is required");
    } else if !one_of(title, TITLES) {
        errors.insert(personal::TITLE, "Please select a valid title");
    }

    if !draft.is_filled(personal::FIRST_NAME) {
        errors.insert(personal::FIRST_NAME, "First Name is required");
    } else {
        optional_name(draft, personal::FIRST_NAME, errors);
    }
    optional_name(draft, personal::MIDDLE_NAME, errors);
    optional_name(draft, personal::LAST_NAME, errors);

    let gender = draft.get(personal::GENDER);
    if gender.is_empty() {
        errors.insert(personal::GENDER, "Gender is required");
    } else if !one_of(gender, GENDERS) {
        errors.insert(personal::GENDER, "Please select a valid gender");
    }

    optional_name(draft, personal::FATHERS_FIRST_NAME, errors);
    optional_name(draft, personal::MOTHERS_FIRST_NAME, errors);
    match (
        draft.is_filled(personal::FATHERS_FIRST_NAME),
        draft.is_filled(personal::MOTHERS_FIRST_NAME),
    ) {
        (false, false) => errors.insert(
            personal::PARENT_NAME,
            "Please fill either Father's Name or Mother's Name",
        ),
        (true, true) => errors.insert(
            personal::PARENT_NAME,
            "Please fill only one of Father's Name or Mother's Name",
        ),
        _ => {}
    }

    let pan = draft.get(personal::PAN);
    if pan.is_empty() {
        errors.insert(personal::PAN, "PAN is required");
    } else if !is_valid_pan(pan) {
        errors.insert(personal::PAN, "Must be 5 letters + 4 digits + 1 letter");
    }

    if let Err(message) = check_date_of_birth(draft.get(personal::DOB), today) {
        errors.insert(personal::DOB, message);
    }
}

fn contact_details(draft: &StepDraft, errors: &mut FieldErrors) {
    if !is_valid_mobile(draft.get(contact::MOBILE).trim()) {
        errors.insert(contact::MOBILE, "Mobile number must be between 7 and 14 digits.");
    }

    if !is_valid_email(draft.get(contact::EMAIL).trim()) {
        errors.insert(
            contact::EMAIL,
            "Please enter a valid email address (maximum 80 characters).",
        );
    }

    let citizen_flag = draft.get(contact::CITIZEN_FLAG);
    if !one_of(citizen_flag, CITIZEN_FLAGS) {
        errors.insert(contact::CITIZEN_FLAG, "Please select a valid citizenship.");
    }

    if !draft.is_filled(contact::P_ADDR_LINE1) {
        errors.insert(contact::P_ADDR_LINE1, "Address Line 1 is required.");
    }
    if !draft.is_filled(contact::P_ADDR_LINE4) {
        errors.insert(contact::P_ADDR_LINE4, "City/Town is required.");
    }
    if !one_of(draft.get(contact::P_STATE), STATE_CODES) {
        errors.insert(contact::P_STATE, "Please select a valid state.");
    }
    if !is_valid_pincode(draft.get(contact::P_PINCODE)) {
        errors.insert(contact::P_PINCODE, "Pincode must be exactly 6 digits.");
    }

    let country = draft.get(contact::P_COUNTRY).trim();
    if country.is_empty() || (citizen_flag != CITIZEN_OVERSEAS && country != DOMESTIC_COUNTRY) {
        errors.insert(contact::P_COUNTRY, "Country must be IN for resident citizens.");
    }

    if requires_overseas_address(citizen_flag) {
        let required = [
            (contact::C_ADDR_LINE1, "Address Line 1 is required for overseas address."),
            (contact::C_ADDR_LINE4, "City/Town is required for overseas address."),
            (contact::C_STATE, "State is required for overseas address."),
            (contact::C_POSTAL_CODE, "Postal Code is required for overseas address."),
            (contact::C_COUNTRY, "Country is required for overseas address."),
        ];
        for (field, message) in required {
            if !draft.is_filled(field) {
                errors.insert(field, message);
            }
        }
    }
}

fn bank_tax_details(draft: &StepDraft, errors: &mut FieldErrors) {
    if !one_of(draft.get(bank::ACCOUNT_TYPE), ACCOUNT_TYPES) {
        errors.insert(bank::ACCOUNT_TYPE, "Please select an account type");
    }
    if !(3..=30).contains(&draft.get(bank::ACCOUNT_NUMBER).chars().count()) {
        errors.insert(bank::ACCOUNT_NUMBER, "Account number must be 3-30 characters");
    }
    if !is_valid_ifsc_length(draft.get(bank::IFSC_CODE)) {
        errors.insert(bank::IFSC_CODE, "IFSC code must be 8-11 characters");
    }
    if !draft.is_filled(bank::BANK_NAME) {
        errors.insert(bank::BANK_NAME, "Bank name is required");
    }
    if !one_of(draft.get(bank::IS_US_PERSON), YES_NO) {
        errors.insert(bank::IS_US_PERSON, "Please select if you are a US person");
    }
    if !one_of(draft.get(bank::TAX_RESIDENCY), TAX_RESIDENCIES) {
        errors.insert(bank::TAX_RESIDENCY, "Please select tax residency country");
    }
    if !is_valid_pan(draft.get(bank::TAX_ID)) {
        errors.insert(
            bank::TAX_ID,
            "Tax ID must be in format: AAAAA1111A (5 letters, 4 numbers, 1 letter)",
        );
    }
}

fn scheme_selection(draft: &StepDraft, errors: &mut FieldErrors) {
    let choice = draft.get(scheme::SCHEME_CHOICE);
    if !one_of(choice, SCHEME_CHOICES) {
        errors.insert(scheme::SCHEME_CHOICE, "Please choose an investment option");
        return;
    }
    if choice == SCHEME_AUTO && !one_of(draft.get(scheme::LIFE_CYCLE_FUND), LIFE_CYCLE_FUNDS) {
        errors.insert(scheme::LIFE_CYCLE_FUND, "Please select a life cycle fund");
    }
}

fn nominee_details(draft: &StepDraft, errors: &mut FieldErrors) {
    if !draft.is_filled(nominee::NOMINEE_NAME) {
        errors.insert(nominee::NOMINEE_NAME, "Nominee name is required");
    } else {
        optional_name(draft, nominee::NOMINEE_NAME, errors);
    }
    if !draft.is_filled(nominee::NOMINEE_RELATIONSHIP) {
        errors.insert(nominee::NOMINEE_RELATIONSHIP, "Relationship with nominee is required");
    }
}

fn upload_documents(draft: &StepDraft, errors: &mut FieldErrors) {
    if !draft.is_filled(upload::PHOTO_FILE_DATA) {
        errors.insert(upload::PHOTO, "Photograph is required");
    }
    if !draft.is_filled(upload::SIGNATURE_FILE_DATA) {
        errors.insert(upload::SIGNATURE, "Signature is required");
    }
    if draft.get(upload::SUBSCRIBER_DECLARATION) != "Y" {
        errors.insert(upload::DECLARATION, "You must agree to the declaration");
    }
}

/// A scanned document attached on the upload step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Photo,
    Signature,
}

impl DocumentKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Photo => "Photograph",
            Self::Signature => "Signature",
        }
    }

    /// Draft field holding the base64 payload.
    pub fn data_field(&self) -> &'static str {
        match self {
            Self::Photo => fields::upload::PHOTO_FILE_DATA,
            Self::Signature => fields::upload::SIGNATURE_FILE_DATA,
        }
    }

    /// Key used in the error map.
    pub fn error_key(&self) -> &'static str {
        match self {
            Self::Photo => fields::upload::PHOTO,
            Self::Signature => fields::upload::SIGNATURE,
        }
    }
}

/// Check a document's type and size before it is attached.
pub fn check_document(content_type: &str, size_bytes: usize) -> Result<(), String> {
    if !content_type.eq_ignore_ascii_case(DOCUMENT_CONTENT_TYPE) {
        return Err("Only JPEG files are allowed".to_string());
    }
    if !(DOCUMENT_MIN_BYTES..=DOCUMENT_MAX_BYTES).contains(&size_bytes) {
        return Err(format!(
            "File size must be between 4 KB - 1 MB (current: {:.2} KB)",
            size_bytes as f64 / 1024.0
        ));
    }
    Ok(())
}
