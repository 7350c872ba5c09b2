use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{AssessmentId, QuestionId};
use crate::model::question::{Question, QuestionError};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssessmentError {
    #[error("assessment id cannot be empty")]
    EmptyId,

    #[error("assessment title cannot be empty")]
    EmptyTitle,

    #[error("assessment has no questions")]
    NoQuestions,

    #[error("assessment duration must be > 0 seconds")]
    InvalidDuration,

    #[error("question id {0} appears more than once")]
    DuplicateQuestion(QuestionId),

    #[error("unknown difficulty: {0}")]
    UnknownDifficulty(String),

    #[error(transparent)]
    Question(#[from] QuestionError),
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = AssessmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            _ => Err(AssessmentError::UnknownDifficulty(s.to_owned())),
        }
    }
}

//
// ─── ASSESSMENT DETAIL ─────────────────────────────────────────────────────────
//

/// Everything needed to run one attempt: metadata plus the ordered question list.
///
/// Question order is presentation order. The list is never empty and question ids
/// are unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentDetail {
    id: AssessmentId,
    title: String,
    subjects: Vec<String>,
    difficulty: Difficulty,
    total_score: u32,
    duration_secs: u32,
    questions: Vec<Question>,
}

impl AssessmentDetail {
    /// Validate and build an assessment detail.
    ///
    /// `total_score` defaults to the sum of question points; override it with
    /// [`AssessmentDetail::with_total_score`].
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError` for a blank id or title, a zero duration, an empty
    /// question list or a repeated question id.
    pub fn new(
        id: AssessmentId,
        title: impl Into<String>,
        duration_secs: u32,
        questions: Vec<Question>,
    ) -> Result<Self, AssessmentError> {
        if id.is_blank() {
            return Err(AssessmentError::EmptyId);
        }
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(AssessmentError::EmptyTitle);
        }
        if duration_secs == 0 {
            return Err(AssessmentError::InvalidDuration);
        }
        if questions.is_empty() {
            return Err(AssessmentError::NoQuestions);
        }

        let mut seen = HashSet::with_capacity(questions.len());
        for question in &questions {
            if !seen.insert(question.id()) {
                return Err(AssessmentError::DuplicateQuestion(question.id().clone()));
            }
        }

        let total_score = questions
            .iter()
            .fold(0_u32, |acc, q| acc.saturating_add(q.points()));

        Ok(Self {
            id,
            title,
            subjects: Vec::new(),
            difficulty: Difficulty::default(),
            total_score,
            duration_secs,
            questions,
        })
    }

    #[must_use]
    pub fn with_subjects(mut self, subjects: Vec<String>) -> Self {
        self.subjects = subjects
            .into_iter()
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    #[must_use]
    pub fn with_total_score(mut self, total_score: u32) -> Self {
        self.total_score = total_score;
        self
    }

    #[must_use]
    pub fn id(&self) -> &AssessmentId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn total_score(&self) -> u32 {
        self.total_score
    }

    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// True when every question carries a correct option, so the attempt can be
    /// graded locally.
    #[must_use]
    pub fn has_answer_key(&self) -> bool {
        self.questions.iter().all(|q| q.correct_option().is_some())
    }

    #[must_use]
    pub fn into_questions(self) -> Vec<Question> {
        self.questions
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
