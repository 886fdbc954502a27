//! Registration wizard.
//!
//! Six steps are filled in a fixed order. Each step is driven by a
//! `StepController` that loads the saved draft, applies edits, runs live
//! duplicate checks and submits to the backend. `WizardSession` moves between
//! steps and carries the registration id minted by the first submit.

pub mod controller;
pub mod draft;
pub mod duplicate;
pub mod fields;
pub mod input;
pub mod sequencer;
pub mod session;
pub mod state;
pub mod step;

pub use controller::{StepController, SubmitFailure, SubmitOutcome, classify_failure, prepare_payload};
pub use draft::{FieldErrors, RegistrationId, StepDraft};
pub use duplicate::{DuplicateChecker, DuplicateField, DuplicateProbe, DuplicateTracker, ProbeResult};
pub use sequencer::WizardSequencer;
pub use session::{Progress, WizardSession};
pub use state::ControllerState;
pub use step::Step;
