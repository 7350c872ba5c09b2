use std::sync::Arc;

use async_trait::async_trait;
use hubx_core::model::{AnswerSheet, AssessmentDetail, AssessmentId, SubmitReceipt};
use thiserror::Error;

use crate::http::{GatewayConfig, HttpAssessmentClient};
use crate::mock::InMemoryAssessmentService;

/// Errors surfaced by assessment backends.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("not found")]
    NotFound,

    #[error("network error: {0}")]
    Network(String),

    #[error("rejected by server: {0}")]
    Validation(String),

    #[error("malformed payload: {0}")]
    Decode(String),

    #[error("invalid gateway configuration: {0}")]
    InvalidConfig(String),
}

/// Source of assessment content for an attempt.
#[async_trait]
pub trait AssessmentDetailProvider: Send + Sync {
    /// Fetch the full assessment, including its ordered questions.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::NotFound` if the assessment does not exist,
    /// `GatewayError::Network` for transport failures.
    async fn get_assessment_detail(&self, id: &AssessmentId)
    -> Result<AssessmentDetail, GatewayError>;
}

/// Records a finished attempt.
#[async_trait]
pub trait AssessmentSubmitter: Send + Sync {
    /// Submit the selected answers for an assessment.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Network` for transport failures and
    /// `GatewayError::Validation` when the server rejects the answer sheet.
    async fn submit_assessment(
        &self,
        id: &AssessmentId,
        answers: &AnswerSheet,
    ) -> Result<SubmitReceipt, GatewayError>;
}

/// Aggregates both collaborators behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Gateway {
    pub details: Arc<dyn AssessmentDetailProvider>,
    pub submissions: Arc<dyn AssessmentSubmitter>,
}

impl Gateway {
    #[must_use]
    pub fn in_memory(service: InMemoryAssessmentService) -> Self {
        let details: Arc<dyn AssessmentDetailProvider> = Arc::new(service.clone());
        let submissions: Arc<dyn AssessmentSubmitter> = Arc::new(service);
        Self {
            details,
            submissions,
        }
    }

    #[must_use]
    pub fn http(config: GatewayConfig) -> Self {
        let client = HttpAssessmentClient::new(config);
        let details: Arc<dyn AssessmentDetailProvider> = Arc::new(client.clone());
        let submissions: Arc<dyn AssessmentSubmitter> = Arc::new(client);
        Self {
            details,
            submissions,
        }
    }
}
