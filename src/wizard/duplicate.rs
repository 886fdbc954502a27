//! Duplicate-check client and per-field probe tracking.
//!
//! Live checks are fired as the user types; a newer edit bumps the field's
//! generation so a slower, older response can never overwrite a fresher one.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::{DuplicateQuery, RegistrationBackend};
use crate::validate::rules::{has_email_shape, is_valid_pan};

use super::draft::RegistrationId;

/// Minimum digits before a mobile number is checked.
const MOBILE_TRIGGER_DIGITS: usize = 10;
/// Minimum digits before an account number is checked.
const ACCOUNT_TRIGGER_DIGITS: usize = 9;

/// A field whose value must be unique across registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DuplicateField {
    Email,
    Mobile,
    Pan,
    AccountNumber,
}

impl DuplicateField {
    pub const ALL: [DuplicateField; 4] = [Self::Email, Self::Mobile, Self::Pan, Self::AccountNumber];

    /// Draft field name, also the key in duplicate-check requests and replies.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Mobile => "mobile",
            Self::Pan => "pan",
            Self::AccountNumber => "accountNumber",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.field_name() == name)
    }

    /// Whether a value is complete enough to be worth a live check.
    pub fn is_triggered(&self, value: &str) -> bool {
        match self {
            Self::Mobile => digit_count(value) >= MOBILE_TRIGGER_DIGITS,
            Self::Email => has_email_shape(value),
            Self::Pan => is_valid_pan(value),
            Self::AccountNumber => digit_count(value) >= ACCOUNT_TRIGGER_DIGITS,
        }
    }

    /// Message shown when a live check finds an existing record.
    pub fn live_message(&self) -> &'static str {
        match self {
            Self::Email => "This email address is already registered.",
            Self::Mobile => "This mobile number is already registered.",
            Self::Pan => "PAN already registered",
            Self::AccountNumber => "This bank account number is already registered.",
        }
    }

    /// Message shown when the submit-time check or the backend reports a conflict.
    pub fn submit_message(&self) -> &'static str {
        match self {
            Self::Email => "Email already registered",
            Self::Mobile => "Mobile number already registered",
            Self::Pan => "PAN already registered",
            Self::AccountNumber => "Bank account number already registered",
        }
    }

    /// Lowercase word that identifies this field in a backend error body.
    pub fn conflict_keyword(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Mobile => "mobile",
            Self::Pan => "pan",
            Self::AccountNumber => "account",
        }
    }

    /// Database column named in constraint-violation messages.
    pub fn column_name(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Mobile => "mobile",
            Self::Pan => "pan",
            Self::AccountNumber => "account_number",
        }
    }
}

impl std::fmt::Display for DuplicateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field_name())
    }
}

fn digit_count(value: &str) -> usize {
    value.chars().filter(char::is_ascii_digit).count()
}

/// Queries the backend for existing registrations holding a value.
#[derive(Clone)]
pub struct DuplicateChecker {
    backend: Arc<dyn RegistrationBackend>,
}

impl DuplicateChecker {
    pub fn new(backend: Arc<dyn RegistrationBackend>) -> Self {
        Self { backend }
    }

    /// Whether `value` is already registered for `field` by anyone but `own`.
    ///
    /// Fails open: a backend error reads as "not a duplicate". The backend
    /// still rejects a real duplicate on submit with a conflict status.
    pub async fn is_duplicate(
        &self,
        field: DuplicateField,
        value: &str,
        own: Option<&RegistrationId>,
    ) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return false;
        }
        let query = DuplicateQuery::single(field, value).excluding(own);
        match self.backend.check_duplicates(&query).await {
            Ok(report) => {
                let duplicate = report.is_duplicate(field);
                debug!(field = %field, duplicate, "Duplicate check completed");
                duplicate
            }
            Err(e) => {
                warn!(field = %field, error = %e, "Duplicate check failed; treating as unique");
                false
            }
        }
    }
}

/// A live duplicate check that has been started but not yet applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateProbe {
    pub field: DuplicateField,
    pub value: String,
    pub generation: u64,
    /// Registration excluded from the lookup.
    pub owner: Option<RegistrationId>,
}

impl DuplicateProbe {
    pub fn owned_by(mut self, owner: Option<&RegistrationId>) -> Self {
        self.owner = owner.cloned();
        self
    }

    /// Run the check. The result still has to be applied to the tracker.
    pub async fn run(self, checker: &DuplicateChecker) -> ProbeResult {
        let duplicate = checker
            .is_duplicate(self.field, &self.value, self.owner.as_ref())
            .await;
        ProbeResult {
            field: self.field,
            generation: self.generation,
            duplicate,
        }
    }
}

/// Outcome of a finished probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub field: DuplicateField,
    pub generation: u64,
    pub duplicate: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct FieldProbe {
    generation: u64,
    in_flight: bool,
    duplicate: bool,
}

/// Per-controller duplicate flags with a generation counter per field.
#[derive(Debug, Default)]
pub struct DuplicateTracker {
    fields: HashMap<DuplicateField, FieldProbe>,
}

impl DuplicateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a probe for the current value, superseding any earlier one.
    pub fn begin(&mut self, field: DuplicateField, value: &str) -> DuplicateProbe {
        let entry = self.fields.entry(field).or_default();
        entry.generation += 1;
        entry.in_flight = true;
        DuplicateProbe {
            field,
            value: value.to_string(),
            generation: entry.generation,
            owner: None,
        }
    }

    /// Apply a finished probe. Returns false when the probe was superseded.
    pub fn apply(&mut self, result: ProbeResult) -> bool {
        let entry = self.fields.entry(result.field).or_default();
        if entry.generation != result.generation {
            debug!(
                field = %result.field,
                stale = result.generation,
                current = entry.generation,
                "Dropping superseded duplicate check"
            );
            return false;
        }
        entry.in_flight = false;
        entry.duplicate = result.duplicate;
        true
    }

    /// Clear the flag and orphan any in-flight probe for `field`.
    pub fn invalidate(&mut self, field: DuplicateField) {
        let entry = self.fields.entry(field).or_default();
        entry.generation += 1;
        entry.in_flight = false;
        entry.duplicate = false;
    }

    /// Record a result obtained outside a probe (submit-time re-check).
    pub fn mark(&mut self, field: DuplicateField, duplicate: bool) {
        let entry = self.fields.entry(field).or_default();
        entry.generation += 1;
        entry.in_flight = false;
        entry.duplicate = duplicate;
    }

    pub fn is_duplicate(&self, field: DuplicateField) -> bool {
        self.fields.get(&field).is_some_and(|p| p.duplicate)
    }

    pub fn is_in_flight(&self, field: DuplicateField) -> bool {
        self.fields.get(&field).is_some_and(|p| p.in_flight)
    }

    pub fn any_in_flight(&self) -> bool {
        self.fields.values().any(|p| p.in_flight)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::backend::{DuplicateReport, SubmitAck};
    use crate::error::BackendError;
    use crate::wizard::{Step, StepDraft};

    /// Backend whose duplicate endpoint either reports a fixed set of taken
    /// fields or fails outright.
    struct StubBackend {
        taken: Vec<DuplicateField>,
        fail: bool,
    }

    #[async_trait]
    impl RegistrationBackend for StubBackend {
        async fn fetch_step(
            &self,
            _step: Step,
            _id: &RegistrationId,
        ) -> Result<Option<StepDraft>, BackendError> {
            Ok(None)
        }

        async fn submit_step(
            &self,
            _step: Step,
            _id: Option<&RegistrationId>,
            _draft: &StepDraft,
        ) -> Result<SubmitAck, BackendError> {
            unimplemented!("not used in duplicate tests")
        }

        async fn check_duplicates(
            &self,
            query: &DuplicateQuery,
        ) -> Result<DuplicateReport, BackendError> {
            if self.fail {
                return Err(BackendError::Transport("connection refused".into()));
            }
            let mut report = DuplicateReport::default();
            for field in query.fields() {
                if self.taken.contains(&field) {
                    report.flag(field);
                }
            }
            Ok(report)
        }
    }

    fn checker(taken: Vec<DuplicateField>, fail: bool) -> DuplicateChecker {
        DuplicateChecker::new(Arc::new(StubBackend { taken, fail }))
    }

    #[test]
    fn triggers() {
        assert!(!DuplicateField::Mobile.is_triggered("987654321"));
        assert!(DuplicateField::Mobile.is_triggered("9876543210"));
        assert!(!DuplicateField::AccountNumber.is_triggered("12345678"));
        assert!(DuplicateField::AccountNumber.is_triggered("123456789"));
        assert!(!DuplicateField::Email.is_triggered("asha@example"));
        assert!(DuplicateField::Email.is_triggered("asha@example.com"));
        assert!(!DuplicateField::Pan.is_triggered("ABCDE1234"));
        assert!(DuplicateField::Pan.is_triggered("ABCDE1234F"));
    }

    #[test]
    fn field_names_roundtrip() {
        for field in DuplicateField::ALL {
            assert_eq!(DuplicateField::from_field_name(field.field_name()), Some(field));
            let json = serde_json::to_string(&field).unwrap();
            assert_eq!(json, format!("\"{}\"", field.field_name()));
        }
        assert_eq!(DuplicateField::from_field_name("firstName"), None);
    }

    #[tokio::test]
    async fn checker_reports_taken_value() {
        let checker = checker(vec![DuplicateField::Pan], false);
        assert!(checker.is_duplicate(DuplicateField::Pan, "ABCDE1234F", None).await);
        assert!(!checker.is_duplicate(DuplicateField::Email, "a@b.com", None).await);
    }

    #[tokio::test]
    async fn checker_fails_open() {
        let checker = checker(vec![DuplicateField::Pan], true);
        assert!(!checker.is_duplicate(DuplicateField::Pan, "ABCDE1234F", None).await);
    }

    #[tokio::test]
    async fn checker_skips_empty_values() {
        // A failing backend would still answer false, so use a taken field.
        let checker = checker(vec![DuplicateField::Mobile], false);
        assert!(!checker.is_duplicate(DuplicateField::Mobile, "   ", None).await);
    }

    #[tokio::test]
    async fn stale_probe_cannot_overwrite_newer_result() {
        let checker = checker(vec![DuplicateField::Mobile], false);
        let mut tracker = DuplicateTracker::new();

        let old = tracker.begin(DuplicateField::Mobile, "9876543210");
        let new = tracker.begin(DuplicateField::Mobile, "9876543211");
        assert!(tracker.is_in_flight(DuplicateField::Mobile));

        let new_result = ProbeResult {
            field: DuplicateField::Mobile,
            generation: new.generation,
            duplicate: false,
        };
        assert!(tracker.apply(new_result));
        assert!(!tracker.any_in_flight());

        // The older probe resolves late and says "duplicate".
        let old_result = old.run(&checker).await;
        assert!(old_result.duplicate);
        assert!(!tracker.apply(old_result));
        assert!(!tracker.is_duplicate(DuplicateField::Mobile));
    }

    #[test]
    fn invalidate_orphans_in_flight_probe() {
        let mut tracker = DuplicateTracker::new();
        let probe = tracker.begin(DuplicateField::Pan, "ABCDE1234F");
        tracker.invalidate(DuplicateField::Pan);
        assert!(!tracker.any_in_flight());
        assert!(!tracker.apply(ProbeResult {
            field: DuplicateField::Pan,
            generation: probe.generation,
            duplicate: true,
        }));
        assert!(!tracker.is_duplicate(DuplicateField::Pan));
    }

    #[test]
    fn mark_sets_flag() {
        let mut tracker = DuplicateTracker::new();
        tracker.mark(DuplicateField::Email, true);
        assert!(tracker.is_duplicate(DuplicateField::Email));
        tracker.mark(DuplicateField::Email, false);
        assert!(!tracker.is_duplicate(DuplicateField::Email));
    }
}
