use chrono::{DateTime, Utc};
use hubx_core::model::{
    AnswerOption, AnswerSheet, AssessmentDetail, AssessmentError, AssessmentId, OptionId,
    Question, QuestionId, ResultId, SubmitReceipt,
};
use serde::{Deserialize, Serialize};

use crate::provider::GatewayError;

/// Wire shape of an assessment as served by the backend.
///
/// This mirrors the domain `AssessmentDetail` so adapters can deserialize
/// without leaking transport concerns into the domain layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub total_score: Option<u32>,
    #[serde(alias = "duration")]
    pub duration_secs: u32,
    pub questions: Vec<QuestionRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: String,
    #[serde(alias = "question", alias = "text")]
    pub prompt: String,
    pub options: Vec<OptionRecord>,
    #[serde(default = "default_points")]
    pub points: u32,
    #[serde(default)]
    pub correct_option: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionRecord {
    pub id: String,
    pub text: String,
}

fn default_points() -> u32 {
    1
}

impl AssessmentRecord {
    /// Convert the record into a validated domain `AssessmentDetail`.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError` if any question or the assessment itself fails validation.
    pub fn into_detail(self) -> Result<AssessmentDetail, AssessmentError> {
        let questions = self
            .questions
            .into_iter()
            .map(QuestionRecord::into_question)
            .collect::<Result<Vec<_>, _>>()?;

        let mut detail = AssessmentDetail::new(
            AssessmentId::new(self.id),
            self.title,
            self.duration_secs,
            questions,
        )?
        .with_subjects(self.subjects);

        if let Some(raw) = self.difficulty {
            detail = detail.with_difficulty(raw.parse()?);
        }
        if let Some(total) = self.total_score {
            detail = detail.with_total_score(total);
        }
        Ok(detail)
    }
}

impl QuestionRecord {
    fn into_question(self) -> Result<Question, AssessmentError> {
        let options = self
            .options
            .into_iter()
            .map(|o| AnswerOption::new(o.id, o.text))
            .collect();
        let question = Question::new(QuestionId::new(self.id), self.prompt, options, self.points)?;
        match self.correct_option {
            Some(correct) => Ok(question.with_correct_option(OptionId::new(correct))?),
            None => Ok(question),
        }
    }
}

/// Body of a submit request.
#[derive(Debug, Serialize)]
pub struct SubmissionRequest<'a> {
    pub assessment_id: &'a AssessmentId,
    pub answers: &'a AnswerSheet,
}

/// Wire shape of the submit acknowledgement.
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptRecord {
    #[serde(alias = "resultId", alias = "id")]
    pub result_id: String,
    #[serde(default)]
    pub score: Option<u32>,
}

impl ReceiptRecord {
    /// # Errors
    ///
    /// Returns `GatewayError::Decode` when the result id is blank.
    pub fn into_receipt(self, submitted_at: DateTime<Utc>) -> Result<SubmitReceipt, GatewayError> {
        if self.result_id.trim().is_empty() {
            return Err(GatewayError::Decode("empty result id".into()));
        }
        Ok(SubmitReceipt::new(
            ResultId::new(self.result_id),
            self.score,
            submitted_at,
        ))
    }
}

/// Decode a JSON catalogue of assessments.
///
/// # Errors
///
/// Returns `GatewayError::Decode` for malformed JSON or invalid assessments.
pub fn decode_catalogue(raw: &str) -> Result<Vec<AssessmentDetail>, GatewayError> {
    let records: Vec<AssessmentRecord> =
        serde_json::from_str(raw).map_err(|e| GatewayError::Decode(e.to_string()))?;
    records
        .into_iter()
        .map(|r| {
            r.into_detail()
                .map_err(|e| GatewayError::Decode(e.to_string()))
        })
        .collect()
}
