use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hubx_core::Clock;
use hubx_core::model::{
    AnswerSheet, AssessmentDetail, AssessmentId, ResultId, SubmitReceipt,
};
use rand::Rng;

use crate::provider::{AssessmentDetailProvider, AssessmentSubmitter, GatewayError};
use crate::records::decode_catalogue;

const SAMPLE_CATALOGUE: &str = include_str!("../fixtures/sample_assessments.json");

/// A submission accepted by the in-memory service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSubmission {
    pub assessment_id: AssessmentId,
    pub answers: AnswerSheet,
    pub receipt: SubmitReceipt,
}

#[derive(Default)]
struct MockState {
    assessments: HashMap<AssessmentId, AssessmentDetail>,
    load_failures: VecDeque<GatewayError>,
    submit_failures: VecDeque<GatewayError>,
    submissions: Vec<RecordedSubmission>,
    submit_calls: usize,
}

/// In-memory assessment backend for prototyping and tests.
///
/// Simulates network latency and can be told to fail the next load or submit
/// calls. Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryAssessmentService {
    state: Arc<Mutex<MockState>>,
    latency: Option<(Duration, Duration)>,
    clock: Clock,
}

impl InMemoryAssessmentService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Service seeded with the bundled sample catalogue.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Decode` if the bundled catalogue is malformed.
    pub fn with_sample_catalogue() -> Result<Self, GatewayError> {
        let service = Self::new();
        for detail in decode_catalogue(SAMPLE_CATALOGUE)? {
            service.insert(detail)?;
        }
        Ok(service)
    }

    /// Delay every call by a random duration in `[min, max]`.
    #[must_use]
    pub fn with_latency(mut self, min: Duration, max: Duration) -> Self {
        self.latency = if max.is_zero() {
            None
        } else {
            Some((min.min(max), max))
        };
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Add or replace an assessment.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Network` if the state lock is poisoned.
    pub fn insert(&self, detail: AssessmentDetail) -> Result<(), GatewayError> {
        let mut guard = self.lock()?;
        guard.assessments.insert(detail.id().clone(), detail);
        Ok(())
    }

    /// Queue an error for the next `get_assessment_detail` call.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Network` if the state lock is poisoned.
    pub fn fail_next_load(&self, error: GatewayError) -> Result<(), GatewayError> {
        self.lock()?.load_failures.push_back(error);
        Ok(())
    }

    /// Queue an error for the next `submit_assessment` call.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Network` if the state lock is poisoned.
    pub fn fail_next_submit(&self, error: GatewayError) -> Result<(), GatewayError> {
        self.lock()?.submit_failures.push_back(error);
        Ok(())
    }

    /// Number of submit calls received, including failed ones.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Network` if the state lock is poisoned.
    pub fn submit_calls(&self) -> Result<usize, GatewayError> {
        Ok(self.lock()?.submit_calls)
    }

    /// Accepted submissions, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Network` if the state lock is poisoned.
    pub fn submissions(&self) -> Result<Vec<RecordedSubmission>, GatewayError> {
        Ok(self.lock()?.submissions.clone())
    }

    /// Ids of every assessment in the catalogue, sorted.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Network` if the state lock is poisoned.
    pub fn assessment_ids(&self) -> Result<Vec<AssessmentId>, GatewayError> {
        let mut ids: Vec<_> = self.lock()?.assessments.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MockState>, GatewayError> {
        self.state
            .lock()
            .map_err(|e| GatewayError::Network(e.to_string()))
    }

    async fn simulate_latency(&self) {
        let Some((min, max)) = self.latency else {
            return;
        };
        let delay = if min == max {
            min
        } else {
            rand::rng().random_range(min..=max)
        };
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl AssessmentDetailProvider for InMemoryAssessmentService {
    async fn get_assessment_detail(
        &self,
        id: &AssessmentId,
    ) -> Result<AssessmentDetail, GatewayError> {
        self.simulate_latency().await;
        let mut guard = self.lock()?;
        if let Some(error) = guard.load_failures.pop_front() {
            return Err(error);
        }
        guard
            .assessments
            .get(id)
            .cloned()
            .ok_or(GatewayError::NotFound)
    }
}

#[async_trait]
impl AssessmentSubmitter for InMemoryAssessmentService {
    async fn submit_assessment(
        &self,
        id: &AssessmentId,
        answers: &AnswerSheet,
    ) -> Result<SubmitReceipt, GatewayError> {
        self.simulate_latency().await;
        let mut guard = self.lock()?;
        guard.submit_calls += 1;
        if let Some(error) = guard.submit_failures.pop_front() {
            return Err(error);
        }

        let detail = guard
            .assessments
            .get(id)
            .ok_or_else(|| GatewayError::Validation(format!("unknown assessment {id}")))?;
        let score = score_answers(detail, answers)?;

        let receipt = SubmitReceipt::new(
            ResultId::new(uuid::Uuid::new_v4().to_string()),
            score,
            self.clock.now(),
        );
        guard.submissions.push(RecordedSubmission {
            assessment_id: id.clone(),
            answers: answers.clone(),
            receipt: receipt.clone(),
        });
        Ok(receipt)
    }
}

/// Validate an answer sheet and grade it when the assessment has an answer key.
fn score_answers(
    detail: &AssessmentDetail,
    answers: &AnswerSheet,
) -> Result<Option<u32>, GatewayError> {
    let mut earned = 0_u32;
    for (question_id, option_id) in answers {
        let question = detail
            .questions()
            .iter()
            .find(|q| q.id() == question_id)
            .ok_or_else(|| GatewayError::Validation(format!("unknown question {question_id}")))?;
        if !question.has_option(option_id) {
            return Err(GatewayError::Validation(format!(
                "option {option_id} does not belong to question {question_id}"
            )));
        }
        if question.correct_option() == Some(option_id) {
            earned = earned.saturating_add(question.points());
        }
    }
    Ok(detail.has_answer_key().then_some(earned))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubx_core::model::{OptionId, QuestionId};
    use hubx_core::time::fixed_clock;

    fn biology() -> AssessmentId {
        AssessmentId::new("practice-biology-101")
    }

    #[tokio::test]
    async fn loads_sample_assessment() {
        let service = InMemoryAssessmentService::with_sample_catalogue().unwrap();
        let detail = service.get_assessment_detail(&biology()).await.unwrap();
        assert_eq!(detail.questions().len(), 3);
        assert_eq!(detail.duration_secs(), 600);
    }

    #[tokio::test]
    async fn unknown_assessment_is_not_found() {
        let service = InMemoryAssessmentService::with_sample_catalogue().unwrap();
        let err = service
            .get_assessment_detail(&AssessmentId::new("missing"))
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::NotFound);
    }

    #[tokio::test]
    async fn submit_scores_against_answer_key() {
        let service = InMemoryAssessmentService::with_sample_catalogue()
            .unwrap()
            .with_clock(fixed_clock());
        let mut answers = AnswerSheet::new();
        answers.insert(QuestionId::new("bio-q1"), OptionId::new("b"));
        answers.insert(QuestionId::new("bio-q2"), OptionId::new("c"));

        let receipt = service.submit_assessment(&biology(), &answers).await.unwrap();
        assert_eq!(receipt.score, Some(2));
        assert_eq!(service.submit_calls().unwrap(), 1);
        assert_eq!(service.submissions().unwrap()[0].answers, answers);
    }

    #[tokio::test]
    async fn submit_without_answer_key_has_no_score() {
        let service = InMemoryAssessmentService::with_sample_catalogue().unwrap();
        let receipt = service
            .submit_assessment(
                &AssessmentId::new("assessment-physics-midterm"),
                &AnswerSheet::new(),
            )
            .await
            .unwrap();
        assert_eq!(receipt.score, None);
    }

    #[tokio::test]
    async fn submit_rejects_foreign_option() {
        let service = InMemoryAssessmentService::with_sample_catalogue().unwrap();
        let mut answers = AnswerSheet::new();
        answers.insert(QuestionId::new("bio-q1"), OptionId::new("z"));
        let err = service
            .submit_assessment(&biology(), &answers)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
        assert!(service.submissions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn queued_failures_are_consumed_in_order() {
        let service = InMemoryAssessmentService::with_sample_catalogue().unwrap();
        service
            .fail_next_submit(GatewayError::Network("offline".into()))
            .unwrap();

        let first = service
            .submit_assessment(&biology(), &AnswerSheet::new())
            .await;
        assert_eq!(first.unwrap_err(), GatewayError::Network("offline".into()));

        let second = service
            .submit_assessment(&biology(), &AnswerSheet::new())
            .await;
        assert!(second.is_ok());
        assert_eq!(service.submit_calls().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn latency_delays_responses() {
        let service = InMemoryAssessmentService::with_sample_catalogue()
            .unwrap()
            .with_latency(Duration::from_millis(500), Duration::from_millis(500));
        let started = tokio::time::Instant::now();
        service.get_assessment_detail(&biology()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(500));
    }
}
