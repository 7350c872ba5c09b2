use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gateway::{AssessmentDetailProvider, AssessmentSubmitter, Gateway};
use hubx_core::Clock;
use hubx_core::model::{AssessmentId, OptionId, QuestionId, SubmitReceipt};

use super::feedback::Feedback;
use super::progress::{AssessmentSnapshot, SubmitConfirmation};
use super::service::{AssessmentSession, SessionEvent, SessionStatus, TickOutcome};
use crate::error::{LoadError, SubmitError};
use crate::settings::SessionSettings;

struct Inner {
    session: Option<AssessmentSession>,
    load_generation: u64,
    /// Token of the countdown allowed to tick, if any.
    timer: Option<u64>,
    next_timer: u64,
}

struct Shared {
    state: Mutex<Inner>,
    details: Arc<dyn AssessmentDetailProvider>,
    submissions: Arc<dyn AssessmentSubmitter>,
    settings: SessionSettings,
    clock: Clock,
}

/// Owns one assessment attempt and mediates between the UI and the backend.
///
/// Cheap to clone; clones share the same session. Every operation takes the state
/// lock for a short critical section and never holds it across a backend call, so
/// UI events and timer ticks may interleave freely with an outstanding `load` or
/// `confirm_submit`.
#[derive(Clone)]
pub struct AssessmentSessionController {
    shared: Arc<Shared>,
}

impl AssessmentSessionController {
    #[must_use]
    pub fn new(clock: Clock, gateway: Gateway, settings: SessionSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(Inner {
                    session: None,
                    load_generation: 0,
                    timer: None,
                    next_timer: 0,
                }),
                details: gateway.details,
                submissions: gateway.submissions,
                settings,
                clock,
            }),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.shared.settings
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, event: SessionEvent) -> bool {
        let mut inner = self.lock();
        let Some(session) = inner.session.as_mut() else {
            tracing::debug!(?event, "no session; event ignored");
            return false;
        };
        let traced = tracing::enabled!(tracing::Level::DEBUG).then(|| event.clone());
        let changed = session.apply(event);
        if let (false, Some(event)) = (changed, traced) {
            tracing::debug!(?event, status = %session.status(), "event ignored");
        }
        changed
    }

    /// Fetch the assessment and move the session to `Ready`.
    ///
    /// May be called again after a failure; a successful load cannot be repeated.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::NotFound` / `LoadError::Network` from the backend (the
    /// session is then `Failed`), `LoadError::InvalidId` for a blank id,
    /// `LoadError::AlreadyLoaded` once the session is past loading and
    /// `LoadError::Superseded` when a newer load or an abandon raced this one.
    pub async fn load(&self, assessment_id: AssessmentId) -> Result<AssessmentSnapshot, LoadError> {
        if assessment_id.is_blank() {
            return Err(LoadError::InvalidId);
        }

        let generation = {
            let mut inner = self.lock();
            if let Some(session) = inner.session.as_ref() {
                if !matches!(session.status(), SessionStatus::Loading | SessionStatus::Failed) {
                    return Err(LoadError::AlreadyLoaded);
                }
            }
            inner.load_generation += 1;
            inner.session = Some(AssessmentSession::new(assessment_id.clone()));
            inner.load_generation
        };

        tracing::debug!(%assessment_id, "loading assessment");
        let fetched = self
            .shared
            .details
            .get_assessment_detail(&assessment_id)
            .await;

        let mut inner = self.lock();
        if inner.load_generation != generation {
            return Err(LoadError::Superseded);
        }
        let Some(session) = inner.session.as_mut() else {
            return Err(LoadError::Superseded);
        };

        let outcome = match fetched {
            Ok(detail) if detail.id() != &assessment_id => Err(LoadError::Invalid(format!(
                "requested {assessment_id}, received {}",
                detail.id()
            ))),
            Ok(detail) => Ok(detail),
            Err(err) => Err(LoadError::from_gateway(err, &assessment_id)),
        };

        match outcome {
            Ok(detail) => {
                let questions = detail.questions().len();
                let duration_secs = detail.duration_secs();
                session.apply(SessionEvent::Loaded {
                    detail,
                    started_at: self.shared.clock.now(),
                });
                tracing::info!(%assessment_id, questions, duration_secs, "assessment loaded");
                Ok(session.snapshot())
            }
            Err(err) => {
                tracing::warn!(%assessment_id, error = %err, "assessment load failed");
                session.apply(SessionEvent::LoadFailed {
                    message: err.user_message(),
                });
                Err(err)
            }
        }
    }

    /// Record an answer for the displayed question. Stale or unknown ids are ignored.
    pub fn select_option(&self, question_id: QuestionId, option_id: OptionId) {
        self.dispatch(SessionEvent::OptionSelected {
            question_id,
            option_id,
        });
    }

    pub fn toggle_flag(&self, question_id: QuestionId) {
        self.dispatch(SessionEvent::FlagToggled(question_id));
    }

    pub fn toggle_ask_teacher(&self, question_id: QuestionId) {
        self.dispatch(SessionEvent::AskTeacherToggled(question_id));
    }

    /// Jump to a question. Out-of-range indices are ignored.
    pub fn go_to_question(&self, index: usize) {
        self.dispatch(SessionEvent::Navigated(index));
    }

    pub fn next(&self) {
        self.dispatch(SessionEvent::Next);
    }

    pub fn prev(&self) {
        self.dispatch(SessionEvent::Prev);
    }

    /// Advance the countdown by one second.
    pub fn tick(&self) -> TickOutcome {
        let mut inner = self.lock();
        inner
            .session
            .as_mut()
            .map_or(TickOutcome::Finished, AssessmentSession::tick)
    }

    /// Summary for the confirmation dialog. Does not change state.
    #[must_use]
    pub fn request_submit(&self) -> SubmitConfirmation {
        self.lock()
            .session
            .as_ref()
            .map(AssessmentSession::submit_confirmation)
            .unwrap_or_default()
    }

    /// Submit the current answers.
    ///
    /// Only one submission can be in flight; a failed submission returns the
    /// session to `Ready` with its answers intact so the student can retry.
    ///
    /// # Errors
    ///
    /// Returns `SubmitError::InProgress` while another submit is outstanding,
    /// `SubmitError::NotReady` outside `Ready`, and `SubmitError::Network` /
    /// `SubmitError::Validation` from the backend.
    pub async fn confirm_submit(&self) -> Result<SubmitReceipt, SubmitError> {
        let (assessment_id, answers, generation) = {
            let mut inner = self.lock();
            let generation = inner.load_generation;
            let Some(session) = inner.session.as_mut() else {
                return Err(SubmitError::NotReady(SessionStatus::Loading));
            };
            match session.status() {
                SessionStatus::Ready => {}
                SessionStatus::Submitting => return Err(SubmitError::InProgress),
                other => return Err(SubmitError::NotReady(other)),
            }
            session.apply(SessionEvent::SubmitStarted);
            (
                session.assessment_id().clone(),
                session.answers().clone(),
                generation,
            )
        };

        tracing::info!(%assessment_id, answered = answers.len(), "submitting assessment");
        let submitted = self
            .shared
            .submissions
            .submit_assessment(&assessment_id, &answers)
            .await;

        let mut inner = self.lock();
        let current = inner.load_generation == generation;
        let Some(session) = inner.session.as_mut().filter(|_| current) else {
            // The attempt was abandoned while the request was outstanding. The
            // response belongs to it alone; report what the server said.
            tracing::info!(%assessment_id, "submit response for an abandoned attempt");
            return submitted.map_err(SubmitError::from);
        };

        match submitted {
            Ok(receipt) => {
                session.apply(SessionEvent::SubmitSucceeded(receipt));
                let receipt = session
                    .receipt()
                    .cloned()
                    .ok_or(SubmitError::NotReady(session.status()))?;
                tracing::info!(
                    %assessment_id,
                    result_id = %receipt.result_id,
                    score = ?receipt.score,
                    "assessment submitted"
                );
                Ok(receipt)
            }
            Err(err) => {
                session.apply(SessionEvent::SubmitFailed);
                let err = SubmitError::from(err);
                tracing::warn!(%assessment_id, error = %err, "submit failed; session ready for retry");
                Err(err)
            }
        }
    }

    /// Discard the session, e.g. when the student navigates away.
    pub fn abandon(&self) {
        let mut inner = self.lock();
        if let Some(session) = inner.session.take() {
            tracing::info!(assessment_id = %session.assessment_id(), status = %session.status(), "session abandoned");
        }
        inner.load_generation += 1;
        inner.timer = None;
    }

    /// Reserve the countdown slot. `None` while another countdown owns it.
    pub(super) fn claim_timer(&self) -> Option<u64> {
        let mut inner = self.lock();
        if inner.timer.is_some() {
            return None;
        }
        inner.next_timer += 1;
        inner.timer = Some(inner.next_timer);
        inner.timer
    }

    /// Free the countdown slot if `token` still owns it.
    pub(super) fn release_timer(&self, token: u64) {
        let mut inner = self.lock();
        if inner.timer == Some(token) {
            inner.timer = None;
        }
    }

    /// Tick on behalf of the countdown holding `token`; `None` once it lost the slot.
    pub(super) fn tick_for(&self, token: u64) -> Option<TickOutcome> {
        let mut inner = self.lock();
        if inner.timer != Some(token) {
            return None;
        }
        Some(
            inner
                .session
                .as_mut()
                .map_or(TickOutcome::Finished, AssessmentSession::tick),
        )
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.lock()
            .session
            .as_ref()
            .map_or(SessionStatus::Loading, AssessmentSession::status)
    }

    #[must_use]
    pub fn snapshot(&self) -> Option<AssessmentSnapshot> {
        self.lock().session.as_ref().map(AssessmentSession::snapshot)
    }

    #[must_use]
    pub fn feedback(&self) -> Option<Feedback> {
        self.lock().session.as_ref().and_then(AssessmentSession::feedback)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
