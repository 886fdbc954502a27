//! Field names, allowed option values and per-step defaults.
//!
//! Field names are the wire names the backend uses, so drafts can be sent
//! and stored without renaming.

use super::draft::StepDraft;
use super::step::Step;

/// Personal details fields.
pub mod personal {
    pub const TITLE: &str = "title";
    pub const FIRST_NAME: &str = "firstName";
    pub const MIDDLE_NAME: &str = "middleName";
    pub const LAST_NAME: &str = "lastName";
    pub const DOB: &str = "dob";
    pub const GENDER: &str = "gender";
    pub const FATHERS_FIRST_NAME: &str = "fathersFirstName";
    pub const MOTHERS_FIRST_NAME: &str = "mothersFirstName";
    pub const PAN: &str = "pan";
    pub const FORM60_FLAG: &str = "form60Flag";
    /// Error key for the "one parent name" rule; not an input field.
    pub const PARENT_NAME: &str = "parentName";
}

/// Contact details fields.
pub mod contact {
    pub const MOBILE: &str = "mobile";
    pub const EMAIL: &str = "email";
    pub const CITIZEN_FLAG: &str = "citizenFlag";
    pub const P_ADDR_LINE1: &str = "pAddrLine1";
    pub const P_ADDR_LINE2: &str = "pAddrLine2";
    pub const P_ADDR_LINE4: &str = "pAddrLine4";
    pub const P_STATE: &str = "pState";
    pub const P_PINCODE: &str = "pPincode";
    pub const P_COUNTRY: &str = "pCountry";
    pub const C_ADDR_LINE1: &str = "cAddrLine1";
    pub const C_ADDR_LINE2: &str = "cAddrLine2";
    pub const C_ADDR_LINE4: &str = "cAddrLine4";
    pub const C_STATE: &str = "cState";
    pub const C_POSTAL_CODE: &str = "cPostalCode";
    pub const C_COUNTRY: &str = "cCountry";

    /// Overseas correspondence address fields.
    pub const OVERSEAS: &[&str] = &[
        C_ADDR_LINE1,
        C_ADDR_LINE2,
        C_ADDR_LINE4,
        C_STATE,
        C_POSTAL_CODE,
        C_COUNTRY,
    ];
}

/// Bank and tax details fields.
pub mod bank {
    pub const ACCOUNT_TYPE: &str = "accountType";
    pub const ACCOUNT_NUMBER: &str = "accountNumber";
    pub const IFSC_CODE: &str = "ifscCode";
    pub const BANK_NAME: &str = "bankName";
    pub const IS_US_PERSON: &str = "isUSPerson";
    pub const TAX_RESIDENCY: &str = "taxResidency";
    pub const TAX_ID: &str = "taxId";
}

/// Scheme selection fields.
pub mod scheme {
    pub const SCHEME_CHOICE: &str = "schemeChoice";
    pub const LIFE_CYCLE_FUND: &str = "lifeCycleFund";
}

/// Nominee details fields.
pub mod nominee {
    pub const NOMINEE_NAME: &str = "nomineeName";
    pub const NOMINEE_RELATIONSHIP: &str = "nomineeRelationship";
}

/// Upload documents fields.
pub mod upload {
    pub const PHOTO_FILE_DATA: &str = "photoFileData";
    pub const SIGNATURE_FILE_DATA: &str = "signatureFileData";
    pub const SUBSCRIBER_DECLARATION: &str = "subscriberDeclaration";
    /// Error keys.
    pub const PHOTO: &str = "photo";
    pub const SIGNATURE: &str = "signature";
    pub const DECLARATION: &str = "declaration";
}

pub const TITLES: &[&str] = &["Shri", "Smt", "Kum"];
pub const GENDERS: &[&str] = &["M", "F", "T"];

/// Domestic resident citizenship flag.
pub const CITIZEN_RESIDENT: &str = "RI";
/// Overseas-citizenship variant allowed a non-domestic permanent country.
pub const CITIZEN_OVERSEAS: &str = "OCI";
pub const CITIZEN_FLAGS: &[&str] = &[CITIZEN_RESIDENT, "NRI", CITIZEN_OVERSEAS];

/// Fixed domestic country code.
pub const DOMESTIC_COUNTRY: &str = "IN";

/// Two-digit state codes accepted for the permanent address.
pub const STATE_CODES: &[&str] = &[
    "01", "02", "03", "04", "05", "06", "07", "08", "09", "10", "11", "12", "13", "14", "15", "16",
    "17", "18", "19", "20", "21", "22", "23", "24", "25", "26", "27", "28", "29", "30", "31", "32",
    "33", "34", "35", "36", "37",
];

pub const ACCOUNT_TYPES: &[&str] = &["savings", "current"];
pub const YES_NO: &[&str] = &["yes", "no"];
pub const TAX_RESIDENCIES: &[&str] = &["INDIA", "USA", "UK", "CANADA", "OTHER"];

pub const SCHEME_AUTO: &str = "auto";
pub const SCHEME_CHOICES: &[&str] = &[SCHEME_AUTO, "active"];
/// Balanced, auto moderate, auto conservative, auto aggressive.
pub const LIFE_CYCLE_FUNDS: &[&str] = &["B", "A", "L", "H"];

/// Input fields accepted by a step.
pub fn fields_for(step: Step) -> &'static [&'static str] {
    match step {
        Step::PersonalDetails => &[
            personal::TITLE,
            personal::FIRST_NAME,
            personal::MIDDLE_NAME,
            personal::LAST_NAME,
            personal::DOB,
            personal::GENDER,
            personal::FATHERS_FIRST_NAME,
            personal::MOTHERS_FIRST_NAME,
            personal::PAN,
            personal::FORM60_FLAG,
        ],
        Step::ContactDetails => &[
            contact::MOBILE,
            contact::EMAIL,
            contact::CITIZEN_FLAG,
            contact::P_ADDR_LINE1,
            contact::P_ADDR_LINE2,
            contact::P_ADDR_LINE4,
            contact::P_STATE,
            contact::P_PINCODE,
            contact::P_COUNTRY,
            contact::C_ADDR_LINE1,
            contact::C_ADDR_LINE2,
            contact::C_ADDR_LINE4,
            contact::C_STATE,
            contact::C_POSTAL_CODE,
            contact::C_COUNTRY,
        ],
        Step::BankTaxDetails => &[
            bank::ACCOUNT_TYPE,
            bank::ACCOUNT_NUMBER,
            bank::IFSC_CODE,
            bank::BANK_NAME,
            bank::IS_US_PERSON,
            bank::TAX_RESIDENCY,
            bank::TAX_ID,
        ],
        Step::SchemeSelection => &[scheme::SCHEME_CHOICE, scheme::LIFE_CYCLE_FUND],
        Step::NomineeDetails => &[nominee::NOMINEE_NAME, nominee::NOMINEE_RELATIONSHIP],
        Step::UploadDocuments => &[
            upload::PHOTO_FILE_DATA,
            upload::SIGNATURE_FILE_DATA,
            upload::SUBSCRIBER_DECLARATION,
        ],
    }
}

/// Whether `field` is an input field of `step`.
pub fn is_known_field(step: Step, field: &str) -> bool {
    fields_for(step).contains(&field)
}

/// The draft a step starts from when nothing has been saved yet.
pub fn defaults(step: Step) -> StepDraft {
    let pairs: &[(&str, &str)] = match step {
        Step::PersonalDetails => &[(personal::GENDER, "M"), (personal::FORM60_FLAG, "N")],
        Step::ContactDetails => &[
            (contact::CITIZEN_FLAG, CITIZEN_RESIDENT),
            (contact::P_STATE, "01"),
            (contact::P_COUNTRY, DOMESTIC_COUNTRY),
        ],
        Step::BankTaxDetails => &[(bank::TAX_RESIDENCY, "INDIA")],
        Step::SchemeSelection => &[(scheme::LIFE_CYCLE_FUND, "B")],
        Step::NomineeDetails => &[],
        Step::UploadDocuments => &[(upload::SUBSCRIBER_DECLARATION, "N")],
    };
    pairs.iter().copied().collect()
}
