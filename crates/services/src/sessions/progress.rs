use hubx_core::model::{AssessmentId, Difficulty, OptionId, Question, QuestionId, SubmitReceipt};

use super::service::SessionStatus;

/// Summary shown before submission, useful for a confirmation dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitConfirmation {
    pub total: usize,
    pub answered: usize,
    /// 1-based question numbers that have no answer yet.
    pub unanswered: Vec<usize>,
    pub flagged: usize,
    pub ask_teacher: usize,
    pub time_remaining_secs: u32,
}

impl SubmitConfirmation {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.unanswered.is_empty()
    }
}

/// One entry of the question navigator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionMarker {
    pub index: usize,
    pub question_id: QuestionId,
    pub answered: bool,
    pub flagged: bool,
    pub ask_teacher: bool,
    pub current: bool,
}

/// Aggregated, owned view of a session for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentSnapshot {
    pub assessment_id: AssessmentId,
    pub status: SessionStatus,
    pub title: Option<String>,
    pub subjects: Vec<String>,
    pub difficulty: Option<Difficulty>,
    pub total_score: u32,
    pub current_index: usize,
    pub total_questions: usize,
    pub current_question: Option<Question>,
    pub selected_option: Option<OptionId>,
    pub answered: usize,
    pub time_remaining_secs: u32,
    pub palette: Vec<QuestionMarker>,
    pub failure: Option<String>,
    pub receipt: Option<SubmitReceipt>,
}
