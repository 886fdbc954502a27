//! Step controller: load, edit, duplicate-check and submit one wizard step.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::backend::RegistrationBackend;
use crate::error::{BackendError, WizardError};
use crate::store::DraftRepository;
use crate::validate::{self, DocumentKind, check_document, requires_overseas_address};

use super::draft::{FieldErrors, RegistrationId, StepDraft};
use super::duplicate::{DuplicateChecker, DuplicateField, DuplicateProbe, DuplicateTracker, ProbeResult};
use super::fields::{self, bank, contact, personal, CITIZEN_OVERSEAS, DOMESTIC_COUNTRY};
use super::input::sanitize;
use super::state::ControllerState;
use super::step::Step;

/// How a failed backend submit is shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitFailure {
    /// Message attached to a single field.
    Field { field: String, message: String },
    /// Screen-level alert.
    Alert(String),
}

impl SubmitFailure {
    fn field(field: &str, message: impl Into<String>) -> Self {
        Self::Field {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Field { message, .. } => message,
            Self::Alert(message) => message,
        }
    }
}

impl std::fmt::Display for SubmitFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field { field, message } => write!(f, "{field}: {message}"),
            Self::Alert(message) => f.write_str(message),
        }
    }
}

/// Result of a submit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Saved. `next` is `None` after the last step.
    Advanced {
        registration_id: RegistrationId,
        next: Option<Step>,
    },
    /// Local validation failed; nothing was sent.
    Invalid(FieldErrors),
    /// The submit-time duplicate check found existing registrations.
    Duplicate(FieldErrors),
    /// The backend refused the submit.
    Rejected(SubmitFailure),
}

impl SubmitOutcome {
    pub fn is_advanced(&self) -> bool {
        matches!(self, Self::Advanced { .. })
    }
}

/// Drives one step from load to submit.
pub struct StepController {
    step: Step,
    state: ControllerState,
    draft: StepDraft,
    errors: FieldErrors,
    alert: Option<String>,
    registration_id: Option<RegistrationId>,
    repository: DraftRepository,
    backend: Arc<dyn RegistrationBackend>,
    checker: DuplicateChecker,
    tracker: DuplicateTracker,
    /// Parent-name field currently holding a value (personal details only).
    active_parent: Option<&'static str>,
    today: NaiveDate,
}

impl StepController {
    pub fn new(
        step: Step,
        registration_id: Option<RegistrationId>,
        repository: DraftRepository,
        backend: Arc<dyn RegistrationBackend>,
    ) -> Self {
        Self {
            step,
            state: ControllerState::Loading,
            draft: fields::defaults(step),
            errors: FieldErrors::new(),
            alert: None,
            registration_id,
            repository,
            checker: DuplicateChecker::new(backend.clone()),
            backend,
            tracker: DuplicateTracker::new(),
            active_parent: None,
            today: chrono::Local::now().date_naive(),
        }
    }

    /// Fix the date age checks are evaluated against.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn draft(&self) -> &StepDraft {
        &self.draft
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    pub fn registration_id(&self) -> Option<&RegistrationId> {
        self.registration_id.as_ref()
    }

    /// Checker for running probes returned by [`edit`](Self::edit) elsewhere.
    pub fn checker(&self) -> DuplicateChecker {
        self.checker.clone()
    }

    /// Whether `field` is locked: one parent name by the other being filled,
    /// the permanent country by a non-overseas citizenship flag.
    pub fn is_locked(&self, field: &str) -> bool {
        self.locked_by(field).is_some()
    }

    fn locked_by(&self, field: &str) -> Option<&'static str> {
        match self.step {
            Step::PersonalDetails => self
                .active_parent
                .filter(|active| *active != field && parent_field(field).is_some()),
            Step::ContactDetails if field == contact::P_COUNTRY && country_locked(&self.draft) => {
                Some(contact::CITIZEN_FLAG)
            }
            _ => None,
        }
    }

    fn transition(&mut self, to: ControllerState) -> Result<(), WizardError> {
        if !self.state.can_transition_to(to) {
            return Err(WizardError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        debug!(step = %self.step, from = %self.state, to = %to, "Controller state change");
        self.state = to;
        Ok(())
    }

    /// Populate the draft: backend copy first, then the local draft, then defaults.
    ///
    /// Always ends in Ready. A backend copy overwrites the local draft.
    pub async fn load(&mut self) -> Result<(), WizardError> {
        if self.state != ControllerState::Loading {
            return Err(WizardError::InvalidTransition {
                from: self.state,
                to: ControllerState::Ready,
            });
        }

        let loaded = match self.fetch_remote(self.step).await {
            Some(remote) => {
                if let Err(e) = self.repository.save(self.step, &remote).await {
                    warn!(step = %self.step, error = %e, "Failed to mirror fetched draft locally");
                }
                info!(step = %self.step, "Loaded step from backend");
                Some(remote)
            }
            None => {
                let local = self.repository.load(self.step).await;
                if local.is_some() {
                    debug!(step = %self.step, "Loaded step from local draft");
                }
                local
            }
        };

        let mut draft = fields::defaults(self.step);
        if let Some(loaded) = loaded {
            draft = draft.merged_with(&loaded);
        }
        self.draft = draft;

        match self.step {
            Step::PersonalDetails => self.active_parent = active_parent(&self.draft),
            Step::ContactDetails if country_locked(&self.draft) => {
                self.draft.set(contact::P_COUNTRY, DOMESTIC_COUNTRY);
            }
            Step::BankTaxDetails if !self.draft.is_filled(bank::TAX_ID) => {
                if let Some(pan) = self.known_pan().await {
                    self.draft.set(bank::TAX_ID, sanitize(bank::TAX_ID, &pan));
                }
            }
            _ => {}
        }

        self.transition(ControllerState::Ready)
    }

    /// Fetch a step from the backend. Failures read as "nothing saved".
    async fn fetch_remote(&self, step: Step) -> Option<StepDraft> {
        let id = self.registration_id.as_ref()?;
        match self.backend.fetch_step(step, id).await {
            Ok(Some(draft)) => Some(draft),
            Ok(None) => {
                debug!(step = %step, registration_id = %id, "No saved record on backend");
                None
            }
            Err(e) => {
                warn!(
                    step = %step,
                    registration_id = %id,
                    error = %e,
                    "Failed to fetch step; falling back to local draft"
                );
                None
            }
        }
    }

    /// PAN entered on the personal details step, used to pre-fill the tax id.
    async fn known_pan(&self) -> Option<String> {
        let personal = match self.fetch_remote(Step::PersonalDetails).await {
            Some(remote) => Some(remote),
            None => self.repository.load(Step::PersonalDetails).await,
        }?;
        personal
            .is_filled(personal::PAN)
            .then(|| personal.get(personal::PAN).to_string())
    }

    /// Apply one field edit.
    ///
    /// Returns a probe when the new value should be checked for duplicates.
    /// Run it with [`DuplicateProbe::run`] and hand the result to
    /// [`apply_probe`](Self::apply_probe).
    pub fn edit(&mut self, field: &str, raw: &str) -> Result<Option<DuplicateProbe>, WizardError> {
        if !self.state.accepts_edits() {
            return Err(WizardError::InvalidTransition {
                from: self.state,
                to: ControllerState::Ready,
            });
        }
        if !fields::is_known_field(self.step, field) {
            return Err(WizardError::UnknownField {
                step: self.step,
                field: field.to_string(),
            });
        }
        let value = sanitize(field, raw);
        if let Some(active) = self.locked_by(field) {
            // Re-entering the value a lock already holds is a no-op.
            if value.trim().eq_ignore_ascii_case(self.draft.get(field)) {
                return Ok(None);
            }
            return Err(WizardError::FieldLocked {
                field: field.to_string(),
                active: active.to_string(),
            });
        }

        self.draft.set(field, value.as_str());
        self.errors.clear(field);
        self.alert = None;
        if self.state == ControllerState::ErrorShown {
            self.transition(ControllerState::Ready)?;
        }

        if let Some(parent) = parent_field(field).filter(|_| self.step == Step::PersonalDetails) {
            self.update_parent_lock(parent, &value);
        }
        if self.step == Step::ContactDetails
            && field == contact::CITIZEN_FLAG
            && country_locked(&self.draft)
        {
            self.draft.set(contact::P_COUNTRY, DOMESTIC_COUNTRY);
            self.errors.clear(contact::P_COUNTRY);
        }

        Ok(self.probe_for(field, &value))
    }

    fn update_parent_lock(&mut self, field: &'static str, value: &str) {
        self.errors.clear(personal::PARENT_NAME);
        if !value.trim().is_empty() {
            let other = other_parent(field);
            self.draft.set(other, "");
            self.errors.clear(other);
            self.active_parent = Some(field);
        } else if self.active_parent == Some(field) {
            self.active_parent = None;
        }
    }

    fn probe_for(&mut self, field: &str, value: &str) -> Option<DuplicateProbe> {
        let guarded = DuplicateField::from_field_name(field)
            .filter(|f| self.step.guarded_fields().contains(f))?;
        if guarded.is_triggered(value) {
            let probe = self
                .tracker
                .begin(guarded, value)
                .owned_by(self.registration_id.as_ref());
            Some(probe)
        } else {
            self.tracker.invalidate(guarded);
            None
        }
    }

    /// Apply a finished duplicate probe. Returns false for a superseded probe.
    pub fn apply_probe(&mut self, result: ProbeResult) -> bool {
        if !self.tracker.apply(result) {
            return false;
        }
        let name = result.field.field_name();
        if result.duplicate {
            self.errors.insert(name, result.field.live_message());
        } else if self
            .errors
            .get(name)
            .is_some_and(|m| m == result.field.live_message() || m == result.field.submit_message())
        {
            self.errors.clear(name);
        }
        true
    }

    /// Edit a field and run its duplicate check to completion.
    pub async fn edit_and_check(&mut self, field: &str, raw: &str) -> Result<(), WizardError> {
        if let Some(probe) = self.edit(field, raw)? {
            let result = probe.run(&self.checker).await;
            self.apply_probe(result);
        }
        Ok(())
    }

    /// Attach a scanned document on the upload step.
    ///
    /// Returns false when the file was rejected; the reason is recorded as a
    /// field error and any earlier attachment is kept.
    pub fn attach_document(
        &mut self,
        kind: DocumentKind,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<bool, WizardError> {
        if self.step != Step::UploadDocuments {
            return Err(WizardError::Document(format!(
                "{} can only be attached on the upload step",
                kind.label()
            )));
        }
        if !self.state.accepts_edits() {
            return Err(WizardError::InvalidTransition {
                from: self.state,
                to: ControllerState::Ready,
            });
        }

        if let Err(message) = check_document(content_type, bytes.len()) {
            debug!(document = kind.label(), size = bytes.len(), "Document rejected");
            self.errors.insert(kind.error_key(), message);
            return Ok(false);
        }
        self.draft.set(kind.data_field(), STANDARD.encode(bytes));
        self.errors.clear(kind.error_key());
        self.alert = None;
        if self.state == ControllerState::ErrorShown {
            self.transition(ControllerState::Ready)?;
        }
        Ok(true)
    }

    /// Whether the submit action is available.
    pub fn can_submit(&self) -> bool {
        self.state.accepts_edits() && !self.tracker.any_in_flight()
    }

    /// Validate, re-check duplicates, mirror locally and save to the backend.
    pub async fn submit(&mut self) -> Result<SubmitOutcome, WizardError> {
        if self.tracker.any_in_flight() {
            return Err(WizardError::SubmitBlocked {
                reason: "a duplicate check is still running".to_string(),
            });
        }
        if !self.state.accepts_edits() {
            return Err(WizardError::InvalidTransition {
                from: self.state,
                to: ControllerState::Submitting,
            });
        }
        if self.step != Step::first() && self.registration_id.is_none() {
            return Err(WizardError::MissingRegistrationId { step: self.step });
        }

        self.alert = None;
        self.errors = validate::validate(self.step, &self.draft, self.today);
        if !self.errors.is_empty() {
            debug!(step = %self.step, errors = %self.errors, "Validation failed");
            self.transition(ControllerState::ErrorShown)?;
            return Ok(SubmitOutcome::Invalid(self.errors.clone()));
        }

        if self.recheck_duplicates().await {
            self.transition(ControllerState::ErrorShown)?;
            return Ok(SubmitOutcome::Duplicate(self.errors.clone()));
        }

        self.transition(ControllerState::Submitting)?;
        let payload = prepare_payload(self.step, &self.draft);
        self.mirror_locally(&payload).await;

        let result = self
            .backend
            .submit_step(self.step, self.registration_id.as_ref(), &payload)
            .await;

        let ack = match result {
            Ok(ack) => ack,
            Err(e) => return self.reject(&e),
        };

        let registration_id = match (self.registration_id.clone(), ack.registration_id) {
            (Some(existing), Some(returned)) if existing != returned => {
                warn!(
                    step = %self.step,
                    existing = %existing,
                    returned = %returned,
                    "Backend returned a different registration id; keeping the existing one"
                );
                existing
            }
            (Some(existing), _) => existing,
            (None, Some(created)) => {
                if let Err(e) = self.repository.save_registration_id(&created).await {
                    warn!(registration_id = %created, error = %e, "Failed to store registration id");
                }
                info!(registration_id = %created, "Registration created");
                self.registration_id = Some(created.clone());
                created
            }
            (None, None) => {
                let e = BackendError::InvalidResponse("no registration id returned".into());
                return self.reject(&e);
            }
        };

        self.draft = payload;
        self.transition(ControllerState::Advanced)?;
        info!(step = %self.step, registration_id = %registration_id, "Step submitted");
        Ok(SubmitOutcome::Advanced {
            registration_id,
            next: self.step.next(),
        })
    }

    /// Second duplicate pass covering edits made after the last live check.
    async fn recheck_duplicates(&mut self) -> bool {
        let mut found = false;
        for &field in self.step.guarded_fields() {
            let value = self.draft.get(field.field_name()).trim().to_string();
            if value.is_empty() {
                continue;
            }
            let duplicate = self
                .checker
                .is_duplicate(field, &value, self.registration_id.as_ref())
                .await;
            self.tracker.mark(field, duplicate);
            if duplicate {
                self.errors.insert(field.field_name(), field.submit_message());
                found = true;
            }
        }
        found
    }

    async fn mirror_locally(&self, payload: &StepDraft) {
        if self.step == Step::first() && self.registration_id.is_none() {
            if let Err(e) = self.repository.discard_other_steps(self.step).await {
                warn!(error = %e, "Failed to discard drafts of a previous registration");
            }
        }
        if let Err(e) = self.repository.save(self.step, payload).await {
            warn!(step = %self.step, error = %e, "Failed to save draft locally");
        }
    }

    fn reject(&mut self, error: &BackendError) -> Result<SubmitOutcome, WizardError> {
        let failure = classify_failure(self.step, error);
        warn!(step = %self.step, error = %error, shown = %failure, "Step submit failed");
        match &failure {
            SubmitFailure::Field { field, message } => self.errors.insert(field.as_str(), message.as_str()),
            SubmitFailure::Alert(message) => self.alert = Some(message.clone()),
        }
        self.transition(ControllerState::ErrorShown)?;
        Ok(SubmitOutcome::Rejected(failure))
    }
}

fn parent_field(field: &str) -> Option<&'static str> {
    [personal::FATHERS_FIRST_NAME, personal::MOTHERS_FIRST_NAME]
        .into_iter()
        .find(|p| *p == field)
}

fn other_parent(field: &str) -> &'static str {
    if field == personal::FATHERS_FIRST_NAME {
        personal::MOTHERS_FIRST_NAME
    } else {
        personal::FATHERS_FIRST_NAME
    }
}

/// Only overseas citizens may choose the permanent country.
fn country_locked(draft: &StepDraft) -> bool {
    draft.get(contact::CITIZEN_FLAG).trim() != CITIZEN_OVERSEAS
}

/// Parent field to lock the other against. Both filled leaves both editable.
fn active_parent(draft: &StepDraft) -> Option<&'static str> {
    match (
        draft.is_filled(personal::FATHERS_FIRST_NAME),
        draft.is_filled(personal::MOTHERS_FIRST_NAME),
    ) {
        (true, false) => Some(personal::FATHERS_FIRST_NAME),
        (false, true) => Some(personal::MOTHERS_FIRST_NAME),
        _ => None,
    }
}

/// Shape the draft into the body sent to the backend.
///
/// Contact details are trimmed, the permanent country is pinned to the
/// domestic code unless the applicant is an overseas citizen, and the
/// overseas address is dropped for residents.
pub fn prepare_payload(step: Step, draft: &StepDraft) -> StepDraft {
    if step != Step::ContactDetails {
        return draft.clone();
    }
    let citizen_flag = draft.get(contact::CITIZEN_FLAG).trim().to_string();
    let overseas = requires_overseas_address(&citizen_flag);

    let mut payload: StepDraft = draft
        .iter()
        .filter(|(field, _)| overseas || !contact::OVERSEAS.contains(field))
        .map(|(field, value)| (field, value.trim()))
        .collect();

    let country = if citizen_flag == CITIZEN_OVERSEAS {
        draft.get(contact::P_COUNTRY).trim().to_uppercase()
    } else {
        DOMESTIC_COUNTRY.to_string()
    };
    payload.set(contact::P_COUNTRY, country);
    payload
}

/// Map a failed submit to what the user sees.
pub fn classify_failure(step: Step, error: &BackendError) -> SubmitFailure {
    let generic = || SubmitFailure::Alert(format!("Error saving {}. Please try again.", step.title()));
    let with_body = |body: &str| {
        if body.trim().is_empty() {
            generic()
        } else {
            SubmitFailure::Alert(body.trim().to_string())
        }
    };

    match error {
        BackendError::Status { status: 409, body } => {
            classify_conflict(step, body).unwrap_or_else(|| with_body(body))
        }
        BackendError::Status { status: 400, body } => {
            classify_bad_request(step, body).unwrap_or_else(|| with_body(body))
        }
        _ => generic(),
    }
}

fn classify_conflict(step: Step, body: &str) -> Option<SubmitFailure> {
    let guarded = step.guarded_fields();
    let lower = body.to_lowercase();
    let field = guarded
        .iter()
        .find(|f| lower.contains(f.conflict_keyword()))
        .or_else(|| match guarded {
            [only] => Some(only),
            _ => None,
        })?;
    Some(SubmitFailure::field(field.field_name(), field.submit_message()))
}

fn classify_bad_request(step: Step, body: &str) -> Option<SubmitFailure> {
    if fields::is_known_field(step, contact::EMAIL) && body.contains("Email address is too long") {
        return Some(SubmitFailure::field(
            contact::EMAIL,
            "Email address is too long. Maximum 80 characters allowed.",
        ));
    }
    if fields::is_known_field(step, contact::MOBILE) && body.contains("Mobile number is too long") {
        return Some(SubmitFailure::field(
            contact::MOBILE,
            "Mobile number is too long. Maximum 14 digits allowed.",
        ));
    }
    if body.contains("Duplicate entry") {
        if let Some(field) = step
            .guarded_fields()
            .iter()
            .find(|f| body.contains(f.column_name()))
        {
            return Some(SubmitFailure::field(field.field_name(), field.submit_message()));
        }
    }
    if step == Step::PersonalDetails && body.contains("PAN") {
        let pan = DuplicateField::Pan;
        let message = if body.contains("Duplicate entry") || body.to_lowercase().contains("already") {
            pan.submit_message()
        } else {
            body.trim()
        };
        return Some(SubmitFailure::field(pan.field_name(), message));
    }
    None
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::backend::{DuplicateQuery, DuplicateReport, MemoryBackend, SubmitAck};
    use crate::store::{DraftStore, MemoryDraftStore, keys};
    use crate::wizard::fields::{nominee, upload};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn repository() -> (Arc<MemoryDraftStore>, DraftRepository) {
        let store = Arc::new(MemoryDraftStore::new());
        (store.clone(), DraftRepository::new(store))
    }

    fn personal_answers() -> Vec<(&'static str, &'static str)> {
        vec![
            ("title", "Smt"),
            ("firstName", "Asha"),
            ("lastName", "Rao"),
            ("gender", "F"),
            ("dob", "1990-04-12"),
            ("fathersFirstName", "Ravi"),
            ("pan", "ABCDE1234F"),
        ]
    }

    async fn loaded(
        step: Step,
        id: Option<RegistrationId>,
        repo: DraftRepository,
        backend: Arc<dyn RegistrationBackend>,
    ) -> StepController {
        let mut controller = StepController::new(step, id, repo, backend).with_today(today());
        controller.load().await.unwrap();
        controller
    }

    /// Backend that fails every call after counting it.
    #[derive(Default)]
    struct DownBackend {
        submits: AtomicUsize,
    }

    #[async_trait]
    impl RegistrationBackend for DownBackend {
        async fn fetch_step(
            &self,
            _step: Step,
            _id: &RegistrationId,
        ) -> Result<Option<StepDraft>, BackendError> {
            Err(BackendError::Transport("connection refused".into()))
        }

        async fn submit_step(
            &self,
            _step: Step,
            _id: Option<&RegistrationId>,
            _draft: &StepDraft,
        ) -> Result<SubmitAck, BackendError> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            Err(BackendError::Transport("connection refused".into()))
        }

        async fn check_duplicates(
            &self,
            _query: &DuplicateQuery,
        ) -> Result<DuplicateReport, BackendError> {
            Err(BackendError::Transport("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn load_prefers_backend_and_mirrors_locally() {
        let (store, repo) = repository();
        let backend = Arc::new(MemoryBackend::new());
        let saved: StepDraft = [("schemeChoice", "active")].into_iter().collect();
        let id = backend.preload(Step::SchemeSelection, saved).await;
        store
            .set(keys::SCHEME_SELECTION, r#"{"schemeChoice":"auto"}"#)
            .await
            .unwrap();

        let controller = loaded(Step::SchemeSelection, Some(id), repo.clone(), backend).await;
        assert_eq!(controller.state(), ControllerState::Ready);
        assert_eq!(controller.draft().get("schemeChoice"), "active");
        // Defaults fill what the backend copy lacks.
        assert_eq!(controller.draft().get("lifeCycleFund"), "B");
        let mirrored = repo.load(Step::SchemeSelection).await.unwrap();
        assert_eq!(mirrored.get("schemeChoice"), "active");
    }

    #[tokio::test]
    async fn load_falls_back_to_local_draft_when_backend_is_down() {
        let (store, repo) = repository();
        store
            .set(keys::NOMINEE_DETAILS, r#"{"nomineeName":"Meera"}"#)
            .await
            .unwrap();
        let id = RegistrationId::parse("reg-1").unwrap();
        let controller = loaded(
            Step::NomineeDetails,
            Some(id),
            repo,
            Arc::new(DownBackend::default()),
        )
        .await;
        assert_eq!(controller.state(), ControllerState::Ready);
        assert_eq!(controller.draft().get(nominee::NOMINEE_NAME), "Meera");
    }

    #[tokio::test]
    async fn load_uses_defaults_when_nothing_is_saved() {
        let (_, repo) = repository();
        let controller = loaded(
            Step::ContactDetails,
            None,
            repo,
            Arc::new(MemoryBackend::new()),
        )
        .await;
        assert_eq!(controller.draft().get(contact::CITIZEN_FLAG), "RI");
        assert_eq!(controller.draft().get(contact::P_COUNTRY), "IN");
    }

    #[tokio::test]
    async fn bank_step_prefills_tax_id_from_pan() {
        let (_, repo) = repository();
        let personal: StepDraft = personal_answers().into_iter().collect();
        repo.save(Step::PersonalDetails, &personal).await.unwrap();
        let id = RegistrationId::parse("reg-1").unwrap();
        let controller = loaded(
            Step::BankTaxDetails,
            Some(id),
            repo,
            Arc::new(DownBackend::default()),
        )
        .await;
        assert_eq!(controller.draft().get(bank::TAX_ID), "ABCDE1234F");
    }

    #[tokio::test]
    async fn edits_are_sanitized() {
        let (_, repo) = repository();
        let mut controller =
            loaded(Step::PersonalDetails, None, repo, Arc::new(MemoryBackend::new())).await;
        controller.edit("pan", "abcde1234fzz").unwrap();
        assert_eq!(controller.draft().get("pan"), "ABCDE1234F");
    }

    #[tokio::test]
    async fn unknown_field_is_rejected() {
        let (_, repo) = repository();
        let mut controller =
            loaded(Step::SchemeSelection, None, repo, Arc::new(MemoryBackend::new())).await;
        let err = controller.edit("pan", "ABCDE1234F").unwrap_err();
        assert!(matches!(err, WizardError::UnknownField { .. }));
    }

    #[tokio::test]
    async fn parent_names_are_mutually_exclusive() {
        let (_, repo) = repository();
        let mut controller =
            loaded(Step::PersonalDetails, None, repo, Arc::new(MemoryBackend::new())).await;

        controller.edit(personal::MOTHERS_FIRST_NAME, "Lata").unwrap();
        assert!(controller.edit(personal::FATHERS_FIRST_NAME, "").unwrap().is_none());
        assert_eq!(controller.draft().get(personal::MOTHERS_FIRST_NAME), "Lata");
        assert!(controller.is_locked(personal::FATHERS_FIRST_NAME));

        controller.edit(personal::MOTHERS_FIRST_NAME, "").unwrap();
        assert!(!controller.is_locked(personal::FATHERS_FIRST_NAME));

        controller.edit(personal::FATHERS_FIRST_NAME, "Ravi").unwrap();
        assert_eq!(controller.draft().get(personal::MOTHERS_FIRST_NAME), "");
        assert!(controller.is_locked(personal::MOTHERS_FIRST_NAME));
        let err = controller.edit(personal::MOTHERS_FIRST_NAME, "Lata").unwrap_err();
        assert!(matches!(err, WizardError::FieldLocked { .. }));
        assert!(controller.edit(personal::MOTHERS_FIRST_NAME, "").unwrap().is_none());
        assert_eq!(controller.draft().get(personal::FATHERS_FIRST_NAME), "Ravi");

        controller.edit(personal::FATHERS_FIRST_NAME, "").unwrap();
        assert!(!controller.is_locked(personal::MOTHERS_FIRST_NAME));
        assert!(!controller.is_locked(personal::FATHERS_FIRST_NAME));
    }

    #[tokio::test]
    async fn permanent_country_follows_citizenship() {
        let (_, repo) = repository();
        let mut controller =
            loaded(Step::ContactDetails, None, repo, Arc::new(MemoryBackend::new())).await;

        assert!(controller.is_locked(contact::P_COUNTRY));
        let err = controller.edit(contact::P_COUNTRY, "AE").unwrap_err();
        assert!(matches!(err, WizardError::FieldLocked { .. }));
        assert_eq!(controller.draft().get(contact::P_COUNTRY), "IN");
        assert!(controller.edit(contact::P_COUNTRY, "in").unwrap().is_none());

        controller.edit(contact::CITIZEN_FLAG, "OCI").unwrap();
        assert!(!controller.is_locked(contact::P_COUNTRY));
        controller.edit(contact::P_COUNTRY, "AE").unwrap();
        assert_eq!(controller.draft().get(contact::P_COUNTRY), "AE");

        controller.edit(contact::CITIZEN_FLAG, "NRI").unwrap();
        assert!(controller.is_locked(contact::P_COUNTRY));
        assert_eq!(controller.draft().get(contact::P_COUNTRY), "IN");
    }

    #[tokio::test]
    async fn stored_foreign_country_is_reset_for_residents() {
        let (_, repo) = repository();
        let stored: StepDraft = [("citizenFlag", "RI"), ("pCountry", "AE")].into_iter().collect();
        repo.save(Step::ContactDetails, &stored).await.unwrap();
        let controller =
            loaded(Step::ContactDetails, None, repo, Arc::new(MemoryBackend::new())).await;
        assert_eq!(controller.draft().get(contact::P_COUNTRY), "IN");
    }

    #[tokio::test]
    async fn invalid_draft_never_reaches_backend() {
        let (store, repo) = repository();
        let backend = Arc::new(DownBackend::default());
        let mut controller = loaded(Step::PersonalDetails, None, repo, backend.clone()).await;
        controller.edit("pan", "ABCDE").unwrap();

        let outcome = controller.submit().await.unwrap();
        let SubmitOutcome::Invalid(errors) = outcome else {
            panic!("expected validation failure");
        };
        assert!(errors.contains("pan"));
        assert!(errors.contains("firstName"));
        assert!(errors.contains(personal::PARENT_NAME));
        assert_eq!(controller.state(), ControllerState::ErrorShown);
        assert_eq!(backend.submits.load(Ordering::SeqCst), 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn edit_after_error_returns_to_ready() {
        let (_, repo) = repository();
        let id = RegistrationId::parse("reg-1").unwrap();
        let mut controller =
            loaded(Step::NomineeDetails, Some(id), repo, Arc::new(MemoryBackend::new())).await;
        assert!(matches!(controller.submit().await.unwrap(), SubmitOutcome::Invalid(_)));
        assert_eq!(controller.state(), ControllerState::ErrorShown);
        controller.edit(nominee::NOMINEE_NAME, "Meera").unwrap();
        assert_eq!(controller.state(), ControllerState::Ready);
    }

    #[tokio::test]
    async fn first_submit_creates_registration() {
        let (store, repo) = repository();
        store.set(keys::CONTACT_DETAILS, "{}").await.unwrap();
        let backend = Arc::new(MemoryBackend::new());
        let mut controller = loaded(Step::PersonalDetails, None, repo.clone(), backend.clone()).await;
        for (field, value) in personal_answers() {
            controller.edit_and_check(field, value).await.unwrap();
        }

        let outcome = controller.submit().await.unwrap();
        let SubmitOutcome::Advanced { registration_id, next } = outcome else {
            panic!("expected advance, got {outcome:?}");
        };
        assert_eq!(next, Some(Step::ContactDetails));
        assert_eq!(controller.state(), ControllerState::Advanced);
        assert_eq!(repo.registration_id().await, Some(registration_id.clone()));
        assert!(repo.load(Step::PersonalDetails).await.is_some());
        // A new registration drops stale drafts from an earlier applicant.
        assert!(store.get(keys::CONTACT_DETAILS).await.is_none());
        assert!(backend.record(&registration_id, Step::PersonalDetails).await.is_some());

        let err = controller.submit().await.unwrap_err();
        assert!(matches!(err, WizardError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn later_step_needs_registration_id() {
        let (_, repo) = repository();
        let mut controller =
            loaded(Step::NomineeDetails, None, repo, Arc::new(MemoryBackend::new())).await;
        let err = controller.submit().await.unwrap_err();
        assert!(matches!(err, WizardError::MissingRegistrationId { .. }));
    }

    #[tokio::test]
    async fn live_duplicate_check_flags_field() {
        let (_, repo) = repository();
        let backend = Arc::new(MemoryBackend::new());
        let taken: StepDraft = [("pan", "ABCDE1234F")].into_iter().collect();
        backend.preload(Step::PersonalDetails, taken).await;

        let mut controller = loaded(Step::PersonalDetails, None, repo, backend).await;
        controller.edit_and_check("pan", "ABCDE1234F").await.unwrap();
        assert_eq!(controller.errors().get("pan"), Some("PAN already registered"));

        // Dropping below the trigger clears the flag without a lookup.
        assert!(controller.edit("pan", "ABCDE").unwrap().is_none());
        assert!(!controller.errors().contains("pan"));
    }

    #[tokio::test]
    async fn submit_waits_for_in_flight_probe() {
        let (_, repo) = repository();
        let mut controller =
            loaded(Step::ContactDetails, None, repo, Arc::new(MemoryBackend::new())).await;
        let probe = controller.edit("mobile", "9876543210").unwrap().unwrap();
        assert!(!controller.can_submit());
        assert!(matches!(
            controller.submit().await.unwrap_err(),
            WizardError::SubmitBlocked { .. }
        ));

        let result = probe.run(&controller.checker()).await;
        assert!(controller.apply_probe(result));
        assert!(controller.can_submit());
    }

    #[tokio::test]
    async fn superseded_probe_is_ignored() {
        let (_, repo) = repository();
        let backend = Arc::new(MemoryBackend::new());
        let taken: StepDraft = [("mobile", "9876543210")].into_iter().collect();
        backend.preload(Step::ContactDetails, taken).await;

        let mut controller = loaded(Step::ContactDetails, None, repo, backend).await;
        let stale = controller.edit("mobile", "9876543210").unwrap().unwrap();
        let fresh = controller.edit("mobile", "9876543211").unwrap().unwrap();
        let checker = controller.checker();

        let fresh_result = fresh.run(&checker).await;
        assert!(controller.apply_probe(fresh_result));
        let stale_result = stale.run(&checker).await;
        assert!(stale_result.duplicate);
        assert!(!controller.apply_probe(stale_result));
        assert!(!controller.errors().contains("mobile"));
    }

    #[tokio::test]
    async fn submit_time_duplicate_blocks_backend_call() {
        let (_, repo) = repository();
        let backend = Arc::new(MemoryBackend::new());
        let mut controller = loaded(Step::PersonalDetails, None, repo, backend.clone()).await;
        for (field, value) in personal_answers() {
            controller.edit_and_check(field, value).await.unwrap();
        }
        assert!(controller.errors().is_empty());
        // Someone else registers the PAN between the edit and the click.
        let taken: StepDraft = [("pan", "ABCDE1234F")].into_iter().collect();
        backend.preload(Step::PersonalDetails, taken).await;

        let outcome = controller.submit().await.unwrap();
        let SubmitOutcome::Duplicate(errors) = outcome else {
            panic!("expected duplicate, got {outcome:?}");
        };
        assert_eq!(errors.get("pan"), Some("PAN already registered"));
        assert_eq!(backend.registration_count().await, 1);
        assert_eq!(controller.state(), ControllerState::ErrorShown);
    }

    #[tokio::test]
    async fn failed_duplicate_check_defers_to_backend_conflict() {
        let (_, repo) = repository();
        let backend = Arc::new(MemoryBackend::new());
        let taken: StepDraft = [("pan", "ABCDE1234F")].into_iter().collect();
        backend.preload(Step::PersonalDetails, taken).await;
        backend.set_fail_duplicate_checks(true);

        let mut controller = loaded(Step::PersonalDetails, None, repo, backend).await;
        for (field, value) in personal_answers() {
            controller.edit_and_check(field, value).await.unwrap();
        }
        assert!(controller.errors().is_empty());

        let outcome = controller.submit().await.unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Rejected(SubmitFailure::Field {
                field: "pan".into(),
                message: "PAN already registered".into(),
            })
        );
        assert_eq!(controller.errors().get("pan"), Some("PAN already registered"));
        assert_eq!(controller.state(), ControllerState::ErrorShown);
    }

    #[tokio::test]
    async fn transport_failure_keeps_draft_for_retry() {
        let (_, repo) = repository();
        let backend = Arc::new(DownBackend::default());
        let id = RegistrationId::parse("reg-1").unwrap();
        let mut controller = loaded(Step::NomineeDetails, Some(id), repo.clone(), backend).await;
        controller.edit(nominee::NOMINEE_NAME, "Meera").unwrap();
        controller.edit(nominee::NOMINEE_RELATIONSHIP, "Sister").unwrap();

        let outcome = controller.submit().await.unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Rejected(SubmitFailure::Alert(
                "Error saving nominee details. Please try again.".into()
            ))
        );
        assert_eq!(
            controller.alert(),
            Some("Error saving nominee details. Please try again.")
        );
        let kept = repo.load(Step::NomineeDetails).await.unwrap();
        assert_eq!(kept.get(nominee::NOMINEE_NAME), "Meera");
        assert!(controller.can_submit());
    }

    #[tokio::test]
    async fn attach_document_checks_type_and_size() {
        let (_, repo) = repository();
        let id = RegistrationId::parse("reg-1").unwrap();
        let mut controller = loaded(
            Step::UploadDocuments,
            Some(id),
            repo,
            Arc::new(MemoryBackend::new()),
        )
        .await;

        assert!(!controller.attach_document(DocumentKind::Photo, "image/png", &[0; 8192]).unwrap());
        assert_eq!(controller.errors().get(upload::PHOTO), Some("Only JPEG files are allowed"));

        assert!(!controller.attach_document(DocumentKind::Photo, "image/jpeg", &[0; 100]).unwrap());
        assert!(controller.draft().get(upload::PHOTO_FILE_DATA).is_empty());

        assert!(controller.attach_document(DocumentKind::Photo, "image/jpeg", &[0; 8192]).unwrap());
        assert!(!controller.errors().contains(upload::PHOTO));
        assert_eq!(
            controller.draft().get(upload::PHOTO_FILE_DATA),
            STANDARD.encode([0u8; 8192])
        );
    }

    #[tokio::test]
    async fn documents_only_attach_on_upload_step() {
        let (_, repo) = repository();
        let mut controller =
            loaded(Step::NomineeDetails, None, repo, Arc::new(MemoryBackend::new())).await;
        let err = controller
            .attach_document(DocumentKind::Signature, "image/jpeg", &[0; 8192])
            .unwrap_err();
        assert!(matches!(err, WizardError::Document(_)));
    }

    #[test]
    fn contact_payload_for_resident() {
        let draft: StepDraft = [
            ("citizenFlag", "RI"),
            ("email", "  asha@example.com "),
            ("pAddrLine1", " 12 MG Road "),
            ("pCountry", "US"),
            ("cAddrLine1", "Somewhere abroad"),
        ]
        .into_iter()
        .collect();
        let payload = prepare_payload(Step::ContactDetails, &draft);
        assert_eq!(payload.get("email"), "asha@example.com");
        assert_eq!(payload.get("pAddrLine1"), "12 MG Road");
        assert_eq!(payload.get("pCountry"), "IN");
        assert!(payload.iter().all(|(k, _)| k != "cAddrLine1"));
    }

    #[test]
    fn contact_payload_for_overseas_citizen() {
        let draft: StepDraft = [
            ("citizenFlag", "OCI"),
            ("pCountry", " us "),
            ("cAddrLine1", " 5th Avenue "),
        ]
        .into_iter()
        .collect();
        let payload = prepare_payload(Step::ContactDetails, &draft);
        assert_eq!(payload.get("pCountry"), "US");
        assert_eq!(payload.get("cAddrLine1"), "5th Avenue");
    }

    #[test]
    fn classify_conflicts() {
        let conflict = |body: &str| BackendError::Status {
            status: 409,
            body: body.to_string(),
        };
        assert_eq!(
            classify_failure(Step::ContactDetails, &conflict("Mobile number already registered")),
            SubmitFailure::field("mobile", "Mobile number already registered")
        );
        assert_eq!(
            classify_failure(Step::ContactDetails, &conflict("Email already registered")),
            SubmitFailure::field("email", "Email already registered")
        );
        assert_eq!(
            classify_failure(Step::ContactDetails, &conflict("Conflict")),
            SubmitFailure::Alert("Conflict".into())
        );
        // Single guarded field takes any conflict.
        assert_eq!(
            classify_failure(Step::BankTaxDetails, &conflict("")),
            SubmitFailure::field("accountNumber", "Bank account number already registered")
        );
        assert_eq!(
            classify_failure(Step::SchemeSelection, &conflict("")),
            SubmitFailure::Alert("Error saving scheme selection. Please try again.".into())
        );
    }

    #[test]
    fn classify_bad_requests() {
        let bad = |body: &str| BackendError::Status {
            status: 400,
            body: body.to_string(),
        };
        assert_eq!(
            classify_failure(Step::ContactDetails, &bad("Email address is too long")),
            SubmitFailure::field("email", "Email address is too long. Maximum 80 characters allowed.")
        );
        assert_eq!(
            classify_failure(Step::ContactDetails, &bad("Mobile number is too long")),
            SubmitFailure::field("mobile", "Mobile number is too long. Maximum 14 digits allowed.")
        );
        assert_eq!(
            classify_failure(
                Step::BankTaxDetails,
                &bad("Duplicate entry '123456789' for key 'account_number'")
            ),
            SubmitFailure::field("accountNumber", "Bank account number already registered")
        );
        assert_eq!(
            classify_failure(Step::PersonalDetails, &bad("Invalid PAN format")),
            SubmitFailure::field("pan", "Invalid PAN format")
        );
        assert_eq!(
            classify_failure(Step::PersonalDetails, &bad("PAN is already in use")),
            SubmitFailure::field("pan", "PAN already registered")
        );
        assert_eq!(
            classify_failure(Step::SchemeSelection, &bad("schemeChoice is required")),
            SubmitFailure::Alert("schemeChoice is required".into())
        );
    }

    #[test]
    fn classify_other_failures_as_generic_alert() {
        let expected = SubmitFailure::Alert("Error saving documents. Please try again.".into());
        let server = BackendError::Status {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(classify_failure(Step::UploadDocuments, &server), expected);
        let transport = BackendError::Transport("timed out".into());
        assert_eq!(classify_failure(Step::UploadDocuments, &transport), expected);
    }
}
