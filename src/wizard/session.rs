//! Wizard session: wires the store, backend and sequencer together and hands
//! out a loaded controller for whichever step is current.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::backend::{HttpBackend, MemoryBackend, RegistrationBackend};
use crate::config::WizardConfig;
use crate::error::{ConfigError, Result, WizardError};
use crate::store::{DraftRepository, FileDraftStore};

use super::controller::{StepController, SubmitOutcome};
use super::draft::RegistrationId;
use super::sequencer::WizardSequencer;
use super::step::Step;

/// Where the wizard went after a submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The step was not saved; stay on it.
    Stayed,
    /// The step was saved and the wizard moved on.
    Moved(Step),
    /// The last step was saved. Drafts are cleared and the wizard restarted.
    Completed,
}

/// One applicant's pass through the wizard.
pub struct WizardSession {
    repository: DraftRepository,
    backend: Arc<dyn RegistrationBackend>,
    sequencer: WizardSequencer,
    today: Option<NaiveDate>,
}

impl WizardSession {
    pub fn new(repository: DraftRepository, backend: Arc<dyn RegistrationBackend>) -> Self {
        Self {
            repository,
            backend,
            sequencer: WizardSequencer::new(),
            today: None,
        }
    }

    /// File-backed drafts plus the HTTP backend, or the in-process one for dry runs.
    pub fn from_config(config: &WizardConfig) -> std::result::Result<Self, ConfigError> {
        let store = Arc::new(FileDraftStore::new(config.draft_dir.clone()));
        let backend: Arc<dyn RegistrationBackend> = if config.dry_run {
            info!("Dry run: using in-process registration backend");
            Arc::new(MemoryBackend::new())
        } else {
            Arc::new(HttpBackend::new(config)?)
        };
        Ok(Self::new(DraftRepository::new(store), backend))
    }

    /// Evaluate age checks against a fixed date.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn current_step(&self) -> Step {
        self.sequencer.current()
    }

    pub fn sequencer(&self) -> &WizardSequencer {
        &self.sequencer
    }

    pub fn repository(&self) -> &DraftRepository {
        &self.repository
    }

    /// Pick up a registration id stored by an earlier run.
    pub async fn resume(&mut self) -> Option<RegistrationId> {
        let id = self.repository.registration_id().await?;
        if let Err(e) = self.sequencer.bind_registration(id.clone()) {
            warn!(error = %e, "Ignoring stored registration id");
            return None;
        }
        info!(registration_id = %id, "Resumed registration");
        Some(id)
    }

    /// Build and load the controller for the current step.
    pub async fn open_step(&self) -> Result<StepController> {
        let mut controller = StepController::new(
            self.sequencer.current(),
            self.sequencer.registration_id().cloned(),
            self.repository.clone(),
            self.backend.clone(),
        );
        if let Some(today) = self.today {
            controller = controller.with_today(today);
        }
        controller.load().await?;
        Ok(controller)
    }

    /// Move the wizard according to a submit outcome.
    ///
    /// Only an outcome from the current step moves it; anything else is a
    /// `StepMismatch`.
    pub async fn record(&mut self, outcome: &SubmitOutcome) -> Result<Progress> {
        let SubmitOutcome::Advanced {
            registration_id,
            next,
        } = outcome
        else {
            return Ok(Progress::Stayed);
        };
        let current = self.sequencer.current();
        if *next != current.next() {
            return Err(WizardError::StepMismatch { current }.into());
        }

        self.sequencer.bind_registration(registration_id.clone())?;
        match self.sequencer.advance()? {
            Some(next) => Ok(Progress::Moved(next)),
            None => {
                self.repository.clear_all().await?;
                self.sequencer.reset();
                info!(registration_id = %registration_id, "Registration complete");
                Ok(Progress::Completed)
            }
        }
    }

    /// Go back one step.
    pub fn back(&mut self) -> Step {
        self.sequencer.back()
    }
}
