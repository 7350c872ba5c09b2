use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::model::ids::{OptionId, QuestionId, ResultId};

/// Selected option per answered question. Unanswered questions have no entry.
pub type AnswerSheet = BTreeMap<QuestionId, OptionId>;

/// Server acknowledgement that an attempt's answers were recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub result_id: ResultId,
    /// Score awarded by the server, when it grades synchronously.
    pub score: Option<u32>,
    pub submitted_at: DateTime<Utc>,
}

impl SubmitReceipt {
    #[must_use]
    pub fn new(result_id: ResultId, score: Option<u32>, submitted_at: DateTime<Utc>) -> Self {
        Self {
            result_id,
            score,
            submitted_at,
        }
    }
}
