//! In-process registration backend.
//!
//! Enforces the same uniqueness rules as the real service so dry runs and
//! tests exercise conflict handling without a network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::BackendError;
use crate::wizard::{DuplicateField, RegistrationId, Step, StepDraft};

use super::traits::{DuplicateQuery, DuplicateReport, RegistrationBackend, SubmitAck};

type Records = HashMap<RegistrationId, HashMap<Step, StepDraft>>;

/// Registration store held in memory.
#[derive(Default)]
pub struct MemoryBackend {
    records: RwLock<Records>,
    fail_duplicate_checks: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every duplicate lookup fail with a transport error.
    pub fn set_fail_duplicate_checks(&self, fail: bool) {
        self.fail_duplicate_checks.store(fail, Ordering::SeqCst);
    }

    /// Seed an existing registration holding `draft` for `step`.
    pub async fn preload(&self, step: Step, draft: StepDraft) -> RegistrationId {
        let id = mint_id();
        self.records
            .write()
            .await
            .entry(id.clone())
            .or_default()
            .insert(step, draft);
        id
    }

    /// Saved record for a registration and step.
    pub async fn record(&self, id: &RegistrationId, step: Step) -> Option<StepDraft> {
        self.records.read().await.get(id)?.get(&step).cloned()
    }

    pub async fn registration_count(&self) -> usize {
        self.records.read().await.len()
    }
}

fn mint_id() -> RegistrationId {
    Uuid::new_v4().into()
}

/// First unique field of `draft` already held by another registration.
fn find_conflict(
    records: &Records,
    own: Option<&RegistrationId>,
    draft: &StepDraft,
) -> Option<DuplicateField> {
    DuplicateField::ALL.into_iter().find(|field| {
        let value = draft.get(field.field_name()).trim();
        !value.is_empty() && is_taken(records, own, *field, value)
    })
}

fn is_taken(
    records: &Records,
    own: Option<&RegistrationId>,
    field: DuplicateField,
    value: &str,
) -> bool {
    records
        .iter()
        .filter(|(id, _)| Some(*id) != own)
        .flat_map(|(_, steps)| steps.values())
        .any(|draft| draft.get(field.field_name()).trim() == value)
}

#[async_trait]
impl RegistrationBackend for MemoryBackend {
    async fn fetch_step(
        &self,
        step: Step,
        id: &RegistrationId,
    ) -> Result<Option<StepDraft>, BackendError> {
        Ok(self.record(id, step).await)
    }

    async fn submit_step(
        &self,
        step: Step,
        id: Option<&RegistrationId>,
        draft: &StepDraft,
    ) -> Result<SubmitAck, BackendError> {
        let mut records = self.records.write().await;

        if let Some(field) = find_conflict(&records, id, draft) {
            debug!(step = %step, field = %field, "Rejecting duplicate value");
            return Err(BackendError::Status {
                status: 409,
                body: field.submit_message().to_string(),
            });
        }

        let id = match id {
            Some(id) if records.contains_key(id) => id.clone(),
            Some(id) => {
                return Err(BackendError::Status {
                    status: 400,
                    body: format!("Unknown userId {id}"),
                });
            }
            None if step == Step::PersonalDetails => {
                let id = mint_id();
                info!(registration_id = %id, "Registration created");
                id
            }
            None => {
                return Err(BackendError::Status {
                    status: 400,
                    body: "userId is required".to_string(),
                });
            }
        };

        records.entry(id.clone()).or_default().insert(step, draft.clone());
        SubmitAck::from_body(step, id.to_string())
    }

    async fn check_duplicates(
        &self,
        query: &DuplicateQuery,
    ) -> Result<DuplicateReport, BackendError> {
        if self.fail_duplicate_checks.load(Ordering::SeqCst) {
            return Err(BackendError::Transport("duplicate check unavailable".into()));
        }
        let own = query.user_id.as_deref().and_then(RegistrationId::parse);
        let records = self.records.read().await;
        let mut report = DuplicateReport::default();
        for field in query.fields() {
            let value = query.get(field).unwrap_or_default();
            if is_taken(&records, own.as_ref(), field, value) {
                report.flag(field);
            }
        }
        Ok(report)
    }
}
