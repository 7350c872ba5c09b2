use std::collections::HashSet;

use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("question {0} has no options")]
    NoOptions(QuestionId),

    #[error("question {question} repeats option {option}")]
    DuplicateOption {
        question: QuestionId,
        option: OptionId,
    },

    #[error("question {question} marks unknown option {option} as correct")]
    UnknownCorrectOption {
        question: QuestionId,
        option: OptionId,
    },
}

//
// ─── OPTION ────────────────────────────────────────────────────────────────────
//

/// One selectable choice of a multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOption {
    pub id: OptionId,
    pub text: String,
}

impl AnswerOption {
    #[must_use]
    pub fn new(id: impl Into<OptionId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A loaded question. Read-only once the assessment is loaded.
///
/// `correct_option` is only present in feedback-enabled flows (practice papers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    options: Vec<AnswerOption>,
    points: u32,
    correct_option: Option<OptionId>,
}

impl Question {
    /// Build a question, checking the prompt and option list.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::EmptyPrompt` for a blank prompt,
    /// `QuestionError::NoOptions` when `options` is empty and
    /// `QuestionError::DuplicateOption` when two options share an id.
    pub fn new(
        id: QuestionId,
        prompt: impl Into<String>,
        options: Vec<AnswerOption>,
        points: u32,
    ) -> Result<Self, QuestionError> {
        let prompt = prompt.into().trim().to_owned();
        if prompt.is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if options.is_empty() {
            return Err(QuestionError::NoOptions(id));
        }

        let mut seen = HashSet::with_capacity(options.len());
        for option in &options {
            if !seen.insert(&option.id) {
                return Err(QuestionError::DuplicateOption {
                    question: id,
                    option: option.id.clone(),
                });
            }
        }

        Ok(Self {
            id,
            prompt,
            options,
            points,
            correct_option: None,
        })
    }

    /// Attach the correct option for feedback-enabled flows.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::UnknownCorrectOption` if the option is not part of this question.
    pub fn with_correct_option(mut self, option: OptionId) -> Result<Self, QuestionError> {
        if !self.has_option(&option) {
            return Err(QuestionError::UnknownCorrectOption {
                question: self.id,
                option,
            });
        }
        self.correct_option = Some(option);
        Ok(self)
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[AnswerOption] {
        &self.options
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }

    #[must_use]
    pub fn correct_option(&self) -> Option<&OptionId> {
        self.correct_option.as_ref()
    }

    #[must_use]
    pub fn has_option(&self, option: &OptionId) -> bool {
        self.options.iter().any(|candidate| &candidate.id == option)
    }

    /// Look up an option by its display label position ("A" = first option).
    #[must_use]
    pub fn option_by_label(&self, label: char) -> Option<&AnswerOption> {
        let label = label.to_ascii_uppercase();
        if !label.is_ascii_uppercase() {
            return None;
        }
        let index = usize::from(label as u8 - b'A');
        self.options.get(index)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
