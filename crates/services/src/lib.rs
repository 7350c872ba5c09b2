#![forbid(unsafe_code)]

pub mod error;
pub mod sessions;
pub mod settings;

pub use hubx_core::Clock;
pub use sessions as session;

pub use error::{LoadError, SettingsError, SubmitError, TimerError};
pub use settings::{SessionSettings, TimeoutPolicy};

pub use sessions::{
    AssessmentSession, AssessmentSessionController, AssessmentSnapshot, Feedback,
    QuestionMarker, SessionEvent, SessionStatus, SubmitConfirmation, TickOutcome, TimerHandle,
};
