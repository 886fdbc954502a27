//! Error types for the enrollment wizard.

use crate::wizard::{ControllerState, Step};

/// Top-level error type for the wizard.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Draft store error: {0}")]
    Store(#[from] StoreError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Wizard error: {0}")]
    Wizard(#[from] WizardError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Local draft store errors.
///
/// Only writes surface errors; reads degrade to "absent".
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to write draft key {key}: {reason}")]
    Write { key: String, reason: String },

    #[error("Failed to serialize draft for {key}: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors talking to the registration backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The server answered with a non-success status.
    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never got an answer (connect, timeout, IO).
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The server answered but the body could not be interpreted.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// HTTP status, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Response body, if the server answered.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Step controller and sequencer errors.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("Cannot transition from {from} to {to}")]
    InvalidTransition {
        from: ControllerState,
        to: ControllerState,
    },

    #[error("Submit is blocked: {reason}")]
    SubmitBlocked { reason: String },

    #[error("Registration id already set to {existing}, refusing {offered}")]
    RegistrationIdMismatch { existing: String, offered: String },

    #[error("Submit outcome does not follow the current step {current}")]
    StepMismatch { current: Step },

    #[error("Step {step} requires a registration id")]
    MissingRegistrationId { step: Step },

    #[error("Field {field} does not belong to step {step}")]
    UnknownField { step: Step, field: String },

    #[error("Field {field} is locked by {active}")]
    FieldLocked { field: String, active: String },

    #[error("Document error: {0}")]
    Document(String),
}

/// Result type alias for the wizard.
pub type Result<T> = std::result::Result<T, Error>;
