mod assessment;
mod ids;
mod question;
mod submission;

pub use ids::{AssessmentId, OptionId, QuestionId, ResultId};

pub use assessment::{AssessmentDetail, AssessmentError, Difficulty};
pub use question::{AnswerOption, Question, QuestionError};
pub use submission::{AnswerSheet, SubmitReceipt};
