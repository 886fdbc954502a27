//! `RegistrationBackend` trait and the wire types it exchanges.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::wizard::{DuplicateField, RegistrationId, Step, StepDraft};

/// Partial record of unique fields to look up.
///
/// Only present, non-empty fields are serialized. `userId` excludes the
/// caller's own registration from the lookup; it is an extension of the
/// duplicate-check contract, and a backend that does not know the key
/// ignores it and checks the listed fields against every registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl DuplicateQuery {
    /// Query for a single field.
    pub fn single(field: DuplicateField, value: &str) -> Self {
        Self::default().with(field, value)
    }

    /// Add a field. Blank values are ignored.
    pub fn with(mut self, field: DuplicateField, value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() {
            return self;
        }
        *self.slot_mut(field) = Some(value.to_string());
        self
    }

    /// Exclude a registration (the caller's own) from the lookup.
    pub fn excluding(mut self, id: Option<&RegistrationId>) -> Self {
        self.user_id = id.map(|id| id.as_str().to_string());
        self
    }

    pub fn get(&self, field: DuplicateField) -> Option<&str> {
        match field {
            DuplicateField::Email => self.email.as_deref(),
            DuplicateField::Mobile => self.mobile.as_deref(),
            DuplicateField::Pan => self.pan.as_deref(),
            DuplicateField::AccountNumber => self.account_number.as_deref(),
        }
    }

    /// Fields present in the query.
    pub fn fields(&self) -> Vec<DuplicateField> {
        DuplicateField::ALL
            .into_iter()
            .filter(|f| self.get(*f).is_some_and(|v| !v.is_empty()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    fn slot_mut(&mut self, field: DuplicateField) -> &mut Option<String> {
        match field {
            DuplicateField::Email => &mut self.email,
            DuplicateField::Mobile => &mut self.mobile,
            DuplicateField::Pan => &mut self.pan,
            DuplicateField::AccountNumber => &mut self.account_number,
        }
    }
}

/// Reply to a duplicate lookup: `{hasErrors, errors: {field: bool}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateReport {
    #[serde(default)]
    pub has_errors: bool,
    #[serde(default)]
    pub errors: HashMap<String, bool>,
}

impl DuplicateReport {
    pub fn is_duplicate(&self, field: DuplicateField) -> bool {
        self.has_errors && self.errors.get(field.field_name()).copied().unwrap_or(false)
    }

    /// Mark a field as taken.
    pub fn flag(&mut self, field: DuplicateField) {
        self.has_errors = true;
        self.errors.insert(field.field_name().to_string(), true);
    }
}

/// Successful submit acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitAck {
    /// Registration id returned by the personal-details submission.
    pub registration_id: Option<RegistrationId>,
    /// Raw response body.
    pub body: String,
}

impl SubmitAck {
    /// Interpret a submit response body for `step`.
    ///
    /// The personal-details reply carries the registration id, as a JSON
    /// string or number, an object with `userId`/`id`, or bare text.
    pub fn from_body(step: Step, body: String) -> Result<Self, BackendError> {
        if step != Step::PersonalDetails {
            return Ok(Self {
                registration_id: None,
                body,
            });
        }
        let registration_id = parse_registration_id(&body).ok_or_else(|| {
            BackendError::InvalidResponse("personal details reply carried no registration id".into())
        })?;
        Ok(Self {
            registration_id: Some(registration_id),
            body,
        })
    }
}

fn parse_registration_id(body: &str) -> Option<RegistrationId> {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::String(s)) => RegistrationId::parse(&s),
        Ok(serde_json::Value::Number(n)) => RegistrationId::parse(&n.to_string()),
        Ok(serde_json::Value::Object(obj)) => ["userId", "id"]
            .iter()
            .filter_map(|k| obj.get(*k))
            .find_map(|v| match v {
                serde_json::Value::String(s) => RegistrationId::parse(s),
                serde_json::Value::Number(n) => RegistrationId::parse(&n.to_string()),
                _ => None,
            }),
        Ok(_) => None,
        Err(_) => RegistrationId::parse(body),
    }
}

/// The registration API the wizard talks to.
#[async_trait]
pub trait RegistrationBackend: Send + Sync {
    /// Fetch the saved record for a step. Not found → `Ok(None)`.
    async fn fetch_step(
        &self,
        step: Step,
        id: &RegistrationId,
    ) -> Result<Option<StepDraft>, BackendError>;

    /// Save a step. `id` is `None` only for the first personal-details submit.
    async fn submit_step(
        &self,
        step: Step,
        id: Option<&RegistrationId>,
        draft: &StepDraft,
    ) -> Result<SubmitAck, BackendError>;

    /// Look up whether any of the query's values already exist.
    async fn check_duplicates(&self, query: &DuplicateQuery)
    -> Result<DuplicateReport, BackendError>;
}
