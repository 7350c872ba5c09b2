#![forbid(unsafe_code)]

pub mod http;
pub mod mock;
pub mod provider;
pub mod records;

pub use http::{GatewayConfig, HttpAssessmentClient};
pub use mock::{InMemoryAssessmentService, RecordedSubmission};
pub use provider::{AssessmentDetailProvider, AssessmentSubmitter, Gateway, GatewayError};
