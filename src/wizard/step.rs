//! Wizard steps: the fixed, linear order of registration screens.

use serde::{Deserialize, Serialize};

use super::duplicate::DuplicateField;

/// The screens of the registration wizard.
///
/// Progresses linearly: PersonalDetails → ContactDetails → BankTaxDetails →
/// SchemeSelection → NomineeDetails → UploadDocuments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    PersonalDetails,
    ContactDetails,
    BankTaxDetails,
    SchemeSelection,
    NomineeDetails,
    UploadDocuments,
}

impl Step {
    /// All steps in wizard order.
    pub const ALL: [Step; 6] = [
        Step::PersonalDetails,
        Step::ContactDetails,
        Step::BankTaxDetails,
        Step::SchemeSelection,
        Step::NomineeDetails,
        Step::UploadDocuments,
    ];

    pub fn first() -> Self {
        Self::PersonalDetails
    }

    /// Check if a forward transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: Step) -> bool {
        self.next() == Some(target)
    }

    /// Whether this is the final screen.
    pub fn is_last(&self) -> bool {
        matches!(self, Self::UploadDocuments)
    }

    /// The next step in the linear progression, if any.
    pub fn next(&self) -> Option<Step> {
        use Step::*;
        match self {
            PersonalDetails => Some(ContactDetails),
            ContactDetails => Some(BankTaxDetails),
            BankTaxDetails => Some(SchemeSelection),
            SchemeSelection => Some(NomineeDetails),
            NomineeDetails => Some(UploadDocuments),
            UploadDocuments => None,
        }
    }

    /// The previous step, if any.
    pub fn previous(&self) -> Option<Step> {
        use Step::*;
        match self {
            PersonalDetails => None,
            ContactDetails => Some(PersonalDetails),
            BankTaxDetails => Some(ContactDetails),
            SchemeSelection => Some(BankTaxDetails),
            NomineeDetails => Some(SchemeSelection),
            UploadDocuments => Some(NomineeDetails),
        }
    }

    /// 1-based position of the step.
    pub fn number(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).map_or(0, |i| i + 1)
    }

    /// Human-readable title used in messages.
    pub fn title(&self) -> &'static str {
        match self {
            Self::PersonalDetails => "personal details",
            Self::ContactDetails => "contact details",
            Self::BankTaxDetails => "bank tax details",
            Self::SchemeSelection => "scheme selection",
            Self::NomineeDetails => "nominee details",
            Self::UploadDocuments => "documents",
        }
    }

    /// Key of this step's draft in the local draft store.
    pub fn storage_key(&self) -> &'static str {
        match self {
            Self::PersonalDetails => "personalDetails",
            Self::ContactDetails => "contactDetails",
            Self::BankTaxDetails => "bankTaxDetails",
            Self::SchemeSelection => "schemeSelection",
            Self::NomineeDetails => "nomineeDetails",
            Self::UploadDocuments => "uploadDocuments",
        }
    }

    /// Backend resource path segment under `/registration/`.
    pub fn resource(&self) -> &'static str {
        match self {
            Self::PersonalDetails => "personal-details",
            Self::ContactDetails => "contact-details",
            Self::BankTaxDetails => "bank-tax-details",
            Self::SchemeSelection => "scheme-selection",
            Self::NomineeDetails => "nominee-details",
            Self::UploadDocuments => "upload-documents",
        }
    }

    /// Parse a resource path segment back into a step.
    pub fn from_resource(resource: &str) -> Option<Step> {
        Self::ALL.into_iter().find(|s| s.resource() == resource)
    }

    /// Fields on this step that are checked against existing registrations.
    pub fn guarded_fields(&self) -> &'static [DuplicateField] {
        match self {
            Self::PersonalDetails => &[DuplicateField::Pan],
            Self::ContactDetails => &[DuplicateField::Email, DuplicateField::Mobile],
            Self::BankTaxDetails => &[DuplicateField::AccountNumber],
            _ => &[],
        }
    }
}

impl Default for Step {
    fn default() -> Self {
        Self::first()
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.resource())
    }
}
