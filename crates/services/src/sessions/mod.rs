mod feedback;
mod progress;
mod service;
mod timer;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::{LoadError, SubmitError, TimerError};
pub use feedback::{Feedback, QuestionFeedback};
pub use progress::{AssessmentSnapshot, QuestionMarker, SubmitConfirmation};
pub use service::{AssessmentSession, SessionEvent, SessionStatus, TickOutcome};
pub use timer::TimerHandle;
pub use workflow::AssessmentSessionController;
