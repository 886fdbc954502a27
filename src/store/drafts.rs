//! Typed access to the draft store.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::wizard::{RegistrationId, Step, StepDraft};

use super::traits::{keys, DraftStore};

/// Step drafts and the registration id on top of a [`DraftStore`].
#[derive(Clone)]
pub struct DraftRepository {
    store: Arc<dyn DraftStore>,
}

impl DraftRepository {
    pub fn new(store: Arc<dyn DraftStore>) -> Self {
        Self { store }
    }

    /// Stored draft for a step. Missing or malformed data reads as `None`.
    pub async fn load(&self, step: Step) -> Option<StepDraft> {
        let key = step.storage_key();
        let raw = self.store.get(key).await?;
        match StepDraft::from_json_str(&raw) {
            Some(draft) => Some(draft),
            None => {
                warn!(step = %step, key, "Ignoring malformed stored draft");
                None
            }
        }
    }

    pub async fn save(&self, step: Step, draft: &StepDraft) -> Result<(), StoreError> {
        let key = step.storage_key();
        let json = serde_json::to_string(draft).map_err(|source| StoreError::Serialization {
            key: key.to_string(),
            source,
        })?;
        self.store.set(key, &json).await?;
        debug!(step = %step, fields = draft.len(), "Draft saved locally");
        Ok(())
    }

    pub async fn registration_id(&self) -> Option<RegistrationId> {
        let raw = self.store.get(keys::USER_ID).await?;
        RegistrationId::parse(&raw)
    }

    pub async fn save_registration_id(&self, id: &RegistrationId) -> Result<(), StoreError> {
        self.store.set(keys::USER_ID, id.as_str()).await
    }

    /// Drop the registration id and every draft except `keep`'s.
    ///
    /// Called before a new registration is created so an earlier applicant's
    /// data does not carry over.
    pub async fn discard_other_steps(&self, keep: Step) -> Result<(), StoreError> {
        self.store.remove(keys::USER_ID).await?;
        for step in Step::ALL.into_iter().filter(|s| *s != keep) {
            self.store.remove(step.storage_key()).await?;
        }
        debug!(kept = %keep, "Discarded stale drafts");
        Ok(())
    }

    pub async fn clear_all(&self) -> Result<(), StoreError> {
        self.store.clear_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDraftStore;

    fn repository() -> (Arc<MemoryDraftStore>, DraftRepository) {
        let store = Arc::new(MemoryDraftStore::new());
        (store.clone(), DraftRepository::new(store))
    }

    #[test]
    fn storage_keys_are_store_keys() {
        for step in Step::ALL {
            assert!(keys::ALL.contains(&step.storage_key()), "{step}");
        }
    }

    #[tokio::test]
    async fn save_and_load_draft() {
        let (_, repo) = repository();
        let draft: StepDraft = [("mobile", "9876543210")].into_iter().collect();
        repo.save(Step::ContactDetails, &draft).await.unwrap();
        assert_eq!(repo.load(Step::ContactDetails).await, Some(draft));
        assert_eq!(repo.load(Step::BankTaxDetails).await, None);
    }

    #[tokio::test]
    async fn malformed_draft_reads_as_absent() {
        let (store, repo) = repository();
        store.set(keys::PERSONAL_DETAILS, "{not json").await.unwrap();
        assert_eq!(repo.load(Step::PersonalDetails).await, None);
        store.set(keys::PERSONAL_DETAILS, "[1, 2]").await.unwrap();
        assert_eq!(repo.load(Step::PersonalDetails).await, None);
    }

    #[tokio::test]
    async fn registration_id_roundtrip() {
        let (store, repo) = repository();
        assert!(repo.registration_id().await.is_none());

        let id = RegistrationId::parse("reg-7").unwrap();
        repo.save_registration_id(&id).await.unwrap();
        assert_eq!(repo.registration_id().await, Some(id));

        // Older clients stored the id JSON-quoted.
        store.set(keys::USER_ID, "\"reg-8\"").await.unwrap();
        assert_eq!(repo.registration_id().await.unwrap().as_str(), "reg-8");
    }

    #[tokio::test]
    async fn discard_keeps_only_the_named_step() {
        let (store, repo) = repository();
        for key in keys::ALL {
            store.set(key, "{}").await.unwrap();
        }
        repo.discard_other_steps(Step::PersonalDetails).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert!(store.get(keys::PERSONAL_DETAILS).await.is_some());
    }
}
