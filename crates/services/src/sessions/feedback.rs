use hubx_core::model::{AnswerSheet, AssessmentDetail, OptionId, QuestionId};

/// Outcome for a single question of a graded attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionFeedback {
    pub question_id: QuestionId,
    pub selected: Option<OptionId>,
    pub correct: OptionId,
    pub points_awarded: u32,
}

impl QuestionFeedback {
    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.selected.as_ref() == Some(&self.correct)
    }
}

/// Local grading of an attempt against the assessment's answer key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub questions: Vec<QuestionFeedback>,
    pub earned_points: u32,
    pub possible_points: u32,
}

impl Feedback {
    /// Grade `answers`. Returns `None` unless every question has a correct option.
    #[must_use]
    pub fn grade(detail: &AssessmentDetail, answers: &AnswerSheet) -> Option<Self> {
        let mut questions = Vec::with_capacity(detail.questions().len());
        let mut earned_points = 0_u32;
        let mut possible_points = 0_u32;

        for question in detail.questions() {
            let correct = question.correct_option()?.clone();
            let selected = answers.get(question.id()).cloned();
            let points_awarded = if selected.as_ref() == Some(&correct) {
                question.points()
            } else {
                0
            };
            earned_points = earned_points.saturating_add(points_awarded);
            possible_points = possible_points.saturating_add(question.points());
            questions.push(QuestionFeedback {
                question_id: question.id().clone(),
                selected,
                correct,
                points_awarded,
            });
        }

        Some(Self {
            questions,
            earned_points,
            possible_points,
        })
    }

    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.questions.iter().filter(|q| q.is_correct()).count()
    }
}
