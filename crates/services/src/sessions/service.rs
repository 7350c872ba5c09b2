use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use hubx_core::model::{
    AnswerSheet, AssessmentDetail, AssessmentId, OptionId, Question, QuestionId, SubmitReceipt,
};

use super::feedback::Feedback;
use super::progress::{AssessmentSnapshot, QuestionMarker, SubmitConfirmation};

//
// ─── STATUS & EVENTS ───────────────────────────────────────────────────────────
//

/// Lifecycle of one attempt.
///
/// `Loading -> Ready -> Submitting -> Submitted`, with `Submitting -> Ready` when a
/// submit fails and `Loading -> Failed` when the content cannot be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Loading,
    Ready,
    Submitting,
    Submitted,
    Failed,
}

impl SessionStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Submitted | Self::Failed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Submitting => "submitting",
            Self::Submitted => "submitted",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Everything that can happen to a session. Applied with [`AssessmentSession::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Loaded {
        detail: AssessmentDetail,
        started_at: DateTime<Utc>,
    },
    LoadFailed {
        message: String,
    },
    OptionSelected {
        question_id: QuestionId,
        option_id: OptionId,
    },
    FlagToggled(QuestionId),
    AskTeacherToggled(QuestionId),
    Navigated(usize),
    Next,
    Prev,
    Tick,
    SubmitStarted,
    SubmitSucceeded(SubmitReceipt),
    SubmitFailed,
}

/// Result of a countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Time was decremented and some remains.
    Running(u32),
    /// Remaining time is zero.
    Expired,
    /// The session is not accepting ticks right now (loading or submitting).
    Idle,
    /// The session reached a terminal status; the timer can be released.
    Finished,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory state of one assessment attempt.
///
/// All mutation goes through [`AssessmentSession::apply`]; events that do not make
/// sense in the current status, or that reference a stale question, are ignored.
#[derive(Clone)]
pub struct AssessmentSession {
    assessment_id: AssessmentId,
    status: SessionStatus,
    detail: Option<AssessmentDetail>,
    current: usize,
    answers: AnswerSheet,
    flagged: BTreeSet<QuestionId>,
    ask_teacher: BTreeSet<QuestionId>,
    time_remaining_secs: u32,
    started_at: Option<DateTime<Utc>>,
    failure: Option<String>,
    receipt: Option<SubmitReceipt>,
}

impl AssessmentSession {
    /// A fresh session in `Loading` status.
    #[must_use]
    pub fn new(assessment_id: AssessmentId) -> Self {
        Self {
            assessment_id,
            status: SessionStatus::Loading,
            detail: None,
            current: 0,
            answers: AnswerSheet::new(),
            flagged: BTreeSet::new(),
            ask_teacher: BTreeSet::new(),
            time_remaining_secs: 0,
            started_at: None,
            failure: None,
            receipt: None,
        }
    }

    /// Apply an event. Returns `true` if the session changed.
    pub fn apply(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Loaded { detail, started_at } => self.on_loaded(detail, started_at),
            SessionEvent::LoadFailed { message } => {
                if !matches!(self.status, SessionStatus::Loading | SessionStatus::Failed) {
                    return false;
                }
                self.status = SessionStatus::Failed;
                self.failure = Some(message);
                true
            }
            SessionEvent::OptionSelected {
                question_id,
                option_id,
            } => self.on_option_selected(question_id, option_id),
            SessionEvent::FlagToggled(question_id) => {
                let known = self.is_interactive() && self.knows(&question_id);
                toggle(&mut self.flagged, known, question_id)
            }
            SessionEvent::AskTeacherToggled(question_id) => {
                let known = self.is_interactive() && self.knows(&question_id);
                toggle(&mut self.ask_teacher, known, question_id)
            }
            SessionEvent::Navigated(index) => self.navigate(Some(index)),
            SessionEvent::Next => self.navigate(self.current.checked_add(1)),
            SessionEvent::Prev => self.navigate(self.current.checked_sub(1)),
            SessionEvent::Tick => {
                let before = self.time_remaining_secs;
                self.tick();
                before != self.time_remaining_secs
            }
            SessionEvent::SubmitStarted => {
                if self.status != SessionStatus::Ready {
                    return false;
                }
                self.status = SessionStatus::Submitting;
                true
            }
            SessionEvent::SubmitSucceeded(receipt) => self.on_submitted(receipt),
            SessionEvent::SubmitFailed => {
                if self.status != SessionStatus::Submitting {
                    return false;
                }
                self.status = SessionStatus::Ready;
                true
            }
        }
    }

    /// Decrement the countdown by one second while `Ready`, never below zero.
    pub fn tick(&mut self) -> TickOutcome {
        match self.status {
            SessionStatus::Ready => {}
            SessionStatus::Loading | SessionStatus::Submitting => return TickOutcome::Idle,
            SessionStatus::Submitted | SessionStatus::Failed => return TickOutcome::Finished,
        }
        if self.time_remaining_secs == 0 {
            return TickOutcome::Expired;
        }
        self.time_remaining_secs -= 1;
        if self.time_remaining_secs == 0 {
            TickOutcome::Expired
        } else {
            TickOutcome::Running(self.time_remaining_secs)
        }
    }

    fn on_loaded(&mut self, detail: AssessmentDetail, started_at: DateTime<Utc>) -> bool {
        if !matches!(self.status, SessionStatus::Loading | SessionStatus::Failed) {
            return false;
        }
        self.time_remaining_secs = detail.duration_secs();
        self.detail = Some(detail);
        self.current = 0;
        self.answers.clear();
        self.flagged.clear();
        self.ask_teacher.clear();
        self.started_at = Some(started_at);
        self.failure = None;
        self.status = SessionStatus::Ready;
        true
    }

    fn on_option_selected(&mut self, question_id: QuestionId, option_id: OptionId) -> bool {
        if self.status != SessionStatus::Ready {
            return false;
        }
        let Some(current) = self.current_question() else {
            return false;
        };
        // Only the displayed question may be answered; anything else is a stale write.
        if current.id() != &question_id || !current.has_option(&option_id) {
            return false;
        }
        if self.answers.get(&question_id) == Some(&option_id) {
            return false;
        }
        self.answers.insert(question_id, option_id);
        true
    }

    fn on_submitted(&mut self, mut receipt: SubmitReceipt) -> bool {
        if self.status != SessionStatus::Submitting {
            return false;
        }
        self.status = SessionStatus::Submitted;
        if receipt.score.is_none() {
            receipt.score = self.feedback().map(|f| f.earned_points);
        }
        self.receipt = Some(receipt);
        true
    }

    fn navigate(&mut self, target: Option<usize>) -> bool {
        if !self.is_interactive() {
            return false;
        }
        match target {
            Some(index) if index < self.questions().len() && index != self.current => {
                self.current = index;
                true
            }
            _ => false,
        }
    }

    fn is_interactive(&self) -> bool {
        matches!(self.status, SessionStatus::Ready | SessionStatus::Submitting)
    }

    fn knows(&self, question_id: &QuestionId) -> bool {
        self.questions().iter().any(|q| q.id() == question_id)
    }

    #[must_use]
    pub fn assessment_id(&self) -> &AssessmentId {
        &self.assessment_id
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn detail(&self) -> Option<&AssessmentDetail> {
        self.detail.as_ref()
    }

    /// Loaded questions in presentation order; empty until loaded.
    #[must_use]
    pub fn questions(&self) -> &[Question] {
        self.detail
            .as_ref()
            .map(AssessmentDetail::questions)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions().get(self.current)
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerSheet {
        &self.answers
    }

    #[must_use]
    pub fn flagged(&self) -> &BTreeSet<QuestionId> {
        &self.flagged
    }

    #[must_use]
    pub fn ask_teacher(&self) -> &BTreeSet<QuestionId> {
        &self.ask_teacher
    }

    #[must_use]
    pub fn time_remaining_secs(&self) -> u32 {
        self.time_remaining_secs
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn failure_message(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    #[must_use]
    pub fn receipt(&self) -> Option<&SubmitReceipt> {
        self.receipt.as_ref()
    }

    /// Per-question results, available once submitted and only when the assessment
    /// carries an answer key.
    #[must_use]
    pub fn feedback(&self) -> Option<Feedback> {
        if self.status != SessionStatus::Submitted {
            return None;
        }
        Feedback::grade(self.detail.as_ref()?, &self.answers)
    }

    /// Summary shown before the student confirms submission. Does not change state.
    #[must_use]
    pub fn submit_confirmation(&self) -> SubmitConfirmation {
        let unanswered = self
            .questions()
            .iter()
            .enumerate()
            .filter(|(_, q)| !self.answers.contains_key(q.id()))
            .map(|(index, _)| index + 1)
            .collect::<Vec<_>>();
        SubmitConfirmation {
            total: self.questions().len(),
            answered: self.answers.len(),
            unanswered,
            flagged: self.flagged.len(),
            ask_teacher: self.ask_teacher.len(),
            time_remaining_secs: self.time_remaining_secs,
        }
    }

    /// Read-only view for rendering.
    #[must_use]
    pub fn snapshot(&self) -> AssessmentSnapshot {
        let palette = self
            .questions()
            .iter()
            .enumerate()
            .map(|(index, q)| QuestionMarker {
                index,
                question_id: q.id().clone(),
                answered: self.answers.contains_key(q.id()),
                flagged: self.flagged.contains(q.id()),
                ask_teacher: self.ask_teacher.contains(q.id()),
                current: index == self.current,
            })
            .collect();
        let current_question = self.current_question().cloned();
        let selected_option = current_question
            .as_ref()
            .and_then(|q| self.answers.get(q.id()).cloned());

        AssessmentSnapshot {
            assessment_id: self.assessment_id.clone(),
            status: self.status,
            title: self.detail.as_ref().map(|d| d.title().to_owned()),
            subjects: self
                .detail
                .as_ref()
                .map(|d| d.subjects().to_vec())
                .unwrap_or_default(),
            difficulty: self.detail.as_ref().map(AssessmentDetail::difficulty),
            total_score: self.detail.as_ref().map_or(0, AssessmentDetail::total_score),
            current_index: self.current,
            total_questions: self.questions().len(),
            current_question,
            selected_option,
            answered: self.answers.len(),
            time_remaining_secs: self.time_remaining_secs,
            palette,
            failure: self.failure.clone(),
            receipt: self.receipt.clone(),
        }
    }
}

fn toggle(set: &mut BTreeSet<QuestionId>, known: bool, question_id: QuestionId) -> bool {
    if !known {
        return false;
    }
    if !set.remove(&question_id) {
        set.insert(question_id);
    }
    true
}

impl fmt::Debug for AssessmentSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssessmentSession")
            .field("assessment_id", &self.assessment_id)
            .field("status", &self.status)
            .field("questions_len", &self.questions().len())
            .field("current", &self.current)
            .field("answers_len", &self.answers.len())
            .field("time_remaining_secs", &self.time_remaining_secs)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use hubx_core::model::{AnswerOption, ResultId};
    use hubx_core::time::fixed_now;

    fn detail(keyed: bool) -> AssessmentDetail {
        let question = |id: &str| {
            let q = Question::new(
                QuestionId::new(id),
                "Pick one",
                vec![AnswerOption::new("A", "a"), AnswerOption::new("B", "b")],
                2,
            )
            .unwrap();
            if keyed {
                q.with_correct_option(OptionId::new("A")).unwrap()
            } else {
                q
            }
        };
        AssessmentDetail::new(
            AssessmentId::new("a1"),
            "Session test",
            5,
            vec![question("q1"), question("q2")],
        )
        .unwrap()
    }

    fn ready(keyed: bool) -> AssessmentSession {
        let mut session = AssessmentSession::new(AssessmentId::new("a1"));
        assert!(session.apply(SessionEvent::Loaded {
            detail: detail(keyed),
            started_at: fixed_now(),
        }));
        session
    }

    fn receipt(score: Option<u32>) -> SubmitReceipt {
        SubmitReceipt::new(ResultId::new("r1"), score, fixed_now())
    }

    #[test]
    fn loading_session_ignores_interaction() {
        let mut session = AssessmentSession::new(AssessmentId::new("a1"));
        assert!(!session.apply(SessionEvent::Next));
        assert!(!session.apply(SessionEvent::FlagToggled(QuestionId::new("q1"))));
        assert_eq!(session.tick(), TickOutcome::Idle);
        assert!(!session.apply(SessionEvent::SubmitStarted));
        assert!(session.questions().is_empty());
        assert_eq!(session.status(), SessionStatus::Loading);
    }

    #[test]
    fn loaded_event_is_ignored_once_ready() {
        let mut session = ready(false);
        session.apply(SessionEvent::Tick);
        assert!(!session.apply(SessionEvent::Loaded {
            detail: detail(false),
            started_at: fixed_now(),
        }));
        assert_eq!(session.time_remaining_secs(), 4);
        assert_eq!(session.started_at(), Some(fixed_now()));
    }

    #[test]
    fn load_failure_is_terminal_for_interaction() {
        let mut session = AssessmentSession::new(AssessmentId::new("a1"));
        assert!(session.apply(SessionEvent::LoadFailed {
            message: "offline".into(),
        }));
        assert_eq!(session.status(), SessionStatus::Failed);
        assert_eq!(session.failure_message(), Some("offline"));
        assert_eq!(session.tick(), TickOutcome::Finished);
        assert!(!session.apply(SessionEvent::Navigated(1)));
    }

    #[test]
    fn selecting_the_same_option_twice_reports_no_change() {
        let mut session = ready(false);
        let select = |option: &str| SessionEvent::OptionSelected {
            question_id: QuestionId::new("q1"),
            option_id: OptionId::new(option),
        };
        assert!(session.apply(select("A")));
        assert!(!session.apply(select("A")));
        assert!(session.apply(select("B")));
        assert_eq!(
            session.answers().get(&QuestionId::new("q1")),
            Some(&OptionId::new("B"))
        );
    }

    #[test]
    fn tick_event_reports_changes_until_zero() {
        let mut session = ready(false);
        for _ in 0..5 {
            assert!(session.apply(SessionEvent::Tick));
        }
        assert!(!session.apply(SessionEvent::Tick));
        assert_eq!(session.time_remaining_secs(), 0);
    }

    #[test]
    fn submit_cycle_freezes_countdown_and_answers() {
        let mut session = ready(false);
        assert!(session.apply(SessionEvent::SubmitStarted));
        assert!(!session.apply(SessionEvent::SubmitStarted));
        assert_eq!(session.tick(), TickOutcome::Idle);
        assert!(!session.apply(SessionEvent::OptionSelected {
            question_id: QuestionId::new("q1"),
            option_id: OptionId::new("A"),
        }));
        assert!(session.apply(SessionEvent::Next));

        assert!(session.apply(SessionEvent::SubmitFailed));
        assert_eq!(session.status(), SessionStatus::Ready);
        assert!(!session.apply(SessionEvent::SubmitFailed));

        session.apply(SessionEvent::SubmitStarted);
        assert!(session.apply(SessionEvent::SubmitSucceeded(receipt(Some(7)))));
        assert_eq!(session.status(), SessionStatus::Submitted);
        assert_eq!(session.receipt().and_then(|r| r.score), Some(7));
        assert_eq!(session.time_remaining_secs(), 5);
    }

    #[test]
    fn missing_server_score_falls_back_to_local_grade() {
        let mut session = ready(true);
        session.apply(SessionEvent::OptionSelected {
            question_id: QuestionId::new("q1"),
            option_id: OptionId::new("A"),
        });
        session.apply(SessionEvent::SubmitStarted);
        session.apply(SessionEvent::SubmitSucceeded(receipt(None)));

        assert_eq!(session.receipt().and_then(|r| r.score), Some(2));
        let feedback = session.feedback().unwrap();
        assert_eq!(feedback.possible_points, 4);
    }

    #[test]
    fn snapshot_reflects_markers() {
        let mut session = ready(false);
        session.apply(SessionEvent::FlagToggled(QuestionId::new("q2")));
        session.apply(SessionEvent::Navigated(1));
        session.apply(SessionEvent::AskTeacherToggled(QuestionId::new("q2")));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.current_index, 1);
        assert_eq!(snapshot.total_score, 4);
        let marker = &snapshot.palette[1];
        assert!(marker.current && marker.flagged && marker.ask_teacher && !marker.answered);
        assert!(!snapshot.palette[0].current);
    }
}
