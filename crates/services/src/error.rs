//! Shared error types for the services crate.

use gateway::GatewayError;
use hubx_core::model::AssessmentId;
use thiserror::Error;

use crate::sessions::SessionStatus;

/// Errors emitted while loading an assessment into a session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum LoadError {
    #[error("assessment id cannot be empty")]
    InvalidId,
    #[error("assessment {0} not found")]
    NotFound(AssessmentId),
    #[error("network error: {0}")]
    Network(String),
    #[error("assessment content is invalid: {0}")]
    Invalid(String),
    #[error("session already loaded")]
    AlreadyLoaded,
    #[error("load superseded by a newer request")]
    Superseded,
}

impl LoadError {
    pub(crate) fn from_gateway(err: GatewayError, id: &AssessmentId) -> Self {
        match err {
            GatewayError::NotFound => Self::NotFound(id.clone()),
            GatewayError::Network(msg) => Self::Network(msg),
            GatewayError::Validation(msg) | GatewayError::Decode(msg) => Self::Invalid(msg),
            other => Self::Network(other.to_string()),
        }
    }

    /// Message suitable for a full-page error state with a retry action.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidId => "No assessment was selected.".to_owned(),
            Self::NotFound(_) => "This assessment could not be found.".to_owned(),
            Self::Network(_) => {
                "We couldn't reach the server. Check your connection and try again.".to_owned()
            }
            Self::Invalid(_) => "This assessment could not be opened.".to_owned(),
            Self::AlreadyLoaded | Self::Superseded => self.to_string(),
        }
    }
}

/// Errors emitted by `confirm_submit`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SubmitError {
    #[error("network error: {0}")]
    Network(String),
    #[error("submission rejected: {0}")]
    Validation(String),
    #[error("a submission is already in progress")]
    InProgress,
    #[error("session is not ready to submit ({0})")]
    NotReady(SessionStatus),
}

impl From<GatewayError> for SubmitError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Validation(msg) => Self::Validation(msg),
            GatewayError::NotFound => Self::Validation("assessment no longer exists".to_owned()),
            GatewayError::Network(msg) => Self::Network(msg),
            other => Self::Network(other.to_string()),
        }
    }
}

/// Errors emitted when starting the countdown timer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TimerError {
    #[error("countdown timer is already running")]
    AlreadyRunning,
    #[error("countdown timer requires a tokio runtime")]
    NoRuntime,
}

/// Errors emitted while reading session settings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("tick interval must be > 0")]
    InvalidTickInterval,
    #[error("invalid value for {key}: {raw}")]
    InvalidValue { key: &'static str, raw: String },
}
