use std::env;

use async_trait::async_trait;
use hubx_core::Clock;
use hubx_core::model::{AnswerSheet, AssessmentDetail, AssessmentId, SubmitReceipt};
use reqwest::{Client, StatusCode};
use url::Url;

use crate::provider::{AssessmentDetailProvider, AssessmentSubmitter, GatewayError};
use crate::records::{AssessmentRecord, ReceiptRecord, SubmissionRequest};

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub base_url: Url,
    pub api_token: Option<String>,
}

impl GatewayConfig {
    /// # Errors
    ///
    /// Returns `GatewayError::InvalidConfig` if `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, GatewayError> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|e| GatewayError::InvalidConfig(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(GatewayError::InvalidConfig(format!(
                "{base_url}: expected an http(s) base URL"
            )));
        }
        Ok(Self {
            base_url,
            api_token: None,
        })
    }

    #[must_use]
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.api_token = (!token.trim().is_empty()).then_some(token);
        self
    }

    /// Read `HUBX_API_URL` and `HUBX_API_TOKEN`. Returns `Ok(None)` when no URL is set.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::InvalidConfig` if the URL is present but invalid.
    pub fn from_env() -> Result<Option<Self>, GatewayError> {
        let Ok(raw) = env::var("HUBX_API_URL") else {
            return Ok(None);
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let mut config = Self::new(&raw)?;
        if let Ok(token) = env::var("HUBX_API_TOKEN") {
            config = config.with_api_token(token);
        }
        Ok(Some(config))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| GatewayError::InvalidConfig(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn detail_url(&self, id: &AssessmentId) -> Result<Url, GatewayError> {
        self.endpoint(&["assessments", id.as_str()])
    }

    fn submit_url(&self, id: &AssessmentId) -> Result<Url, GatewayError> {
        self.endpoint(&["assessments", id.as_str(), "submissions"])
    }
}

/// `reqwest` client for the HubX assessment API.
#[derive(Clone)]
pub struct HttpAssessmentClient {
    client: Client,
    config: GatewayConfig,
    clock: Clock,
}

impl HttpAssessmentClient {
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            clock: Clock::default(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.api_token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl AssessmentDetailProvider for HttpAssessmentClient {
    async fn get_assessment_detail(
        &self,
        id: &AssessmentId,
    ) -> Result<AssessmentDetail, GatewayError> {
        let url = self.config.detail_url(id)?;
        tracing::debug!(%url, "fetching assessment detail");
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let record: AssessmentRecord = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        record
            .into_detail()
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AssessmentSubmitter for HttpAssessmentClient {
    async fn submit_assessment(
        &self,
        id: &AssessmentId,
        answers: &AnswerSheet,
    ) -> Result<SubmitReceipt, GatewayError> {
        let url = self.config.submit_url(id)?;
        tracing::debug!(%url, answered = answers.len(), "submitting assessment");
        let payload = SubmissionRequest {
            assessment_id: id,
            answers,
        };
        let response = self
            .authorize(self.client.post(url))
            .json(&payload)
            .send()
            .await
            .map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let record: ReceiptRecord = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        record.into_receipt(self.clock.now())
    }
}

fn network(err: reqwest::Error) -> GatewayError {
    GatewayError::Network(err.to_string())
}

fn status_error(status: StatusCode, body: String) -> GatewayError {
    match status {
        StatusCode::NOT_FOUND => GatewayError::NotFound,
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            let detail = body.trim();
            if detail.is_empty() {
                GatewayError::Validation(status.to_string())
            } else {
                GatewayError::Validation(detail.to_owned())
            }
        }
        other => GatewayError::Network(format!("unexpected status {other}")),
    }
}
