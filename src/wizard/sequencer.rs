//! Wizard sequencer: current step plus the registration id shared by all steps.

use tracing::{debug, info};

use crate::error::WizardError;

use super::draft::RegistrationId;
use super::step::Step;

/// Position in the wizard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WizardSequencer {
    current: Step,
    registration_id: Option<RegistrationId>,
}

impl WizardSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Step {
        self.current
    }

    pub fn registration_id(&self) -> Option<&RegistrationId> {
        self.registration_id.as_ref()
    }

    /// Record the registration id. Set once; re-binding the same id is a no-op.
    pub fn bind_registration(&mut self, id: RegistrationId) -> Result<(), WizardError> {
        match &self.registration_id {
            Some(existing) if *existing == id => Ok(()),
            Some(existing) => Err(WizardError::RegistrationIdMismatch {
                existing: existing.to_string(),
                offered: id.to_string(),
            }),
            None => {
                info!(registration_id = %id, "Registration bound to wizard");
                self.registration_id = Some(id);
                Ok(())
            }
        }
    }

    /// Move to the next step. Returns `None` when already on the last step.
    pub fn advance(&mut self) -> Result<Option<Step>, WizardError> {
        if self.registration_id.is_none() {
            return Err(WizardError::MissingRegistrationId { step: self.current });
        }
        let Some(next) = self.current.next() else {
            return Ok(None);
        };
        debug_assert!(self.current.can_transition_to(next));
        debug!(from = %self.current, to = %next, "Advancing wizard");
        self.current = next;
        Ok(Some(next))
    }

    /// Go back one step without re-validation. Stays on the first step.
    pub fn back(&mut self) -> Step {
        if let Some(previous) = self.current.previous() {
            debug!(from = %self.current, to = %previous, "Wizard back");
            self.current = previous;
        }
        self.current
    }

    /// Forget the registration and return to the first step.
    pub fn reset(&mut self) {
        self.current = Step::first();
        self.registration_id = None;
    }

    /// "Step n of 6".
    pub fn progress(&self) -> String {
        format!("Step {} of {}", self.current.number(), Step::ALL.len())
    }
}
