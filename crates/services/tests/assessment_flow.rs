use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use gateway::{AssessmentSubmitter, Gateway, GatewayError, InMemoryAssessmentService};
use hubx_core::model::{
    AnswerOption, AnswerSheet, AssessmentDetail, AssessmentId, OptionId, Question, QuestionId,
    ResultId, SubmitReceipt,
};
use hubx_core::time::{fixed_clock, fixed_now};
use services::{
    AssessmentSessionController, SessionSettings, SessionStatus, SubmitError, TickOutcome,
};

fn question(id: &str) -> Question {
    Question::new(
        QuestionId::new(id),
        format!("Question {id}"),
        vec![
            AnswerOption::new("A", "first"),
            AnswerOption::new("B", "second"),
            AnswerOption::new("C", "third"),
        ],
        1,
    )
    .unwrap()
}

fn quiz(question_count: usize, duration_secs: u32) -> AssessmentDetail {
    let questions = (1..=question_count)
        .map(|n| question(&format!("q{n}")))
        .collect();
    AssessmentDetail::new(AssessmentId::new("quiz"), "Quiz", duration_secs, questions).unwrap()
}

async fn ready(detail: AssessmentDetail) -> (AssessmentSessionController, InMemoryAssessmentService) {
    let service = InMemoryAssessmentService::new();
    service.insert(detail).unwrap();
    let controller = AssessmentSessionController::new(
        fixed_clock(),
        Gateway::in_memory(service.clone()),
        SessionSettings::default(),
    );
    controller.load(AssessmentId::new("quiz")).await.unwrap();
    (controller, service)
}

fn q(id: &str) -> QuestionId {
    QuestionId::new(id)
}

fn opt(id: &str) -> OptionId {
    OptionId::new(id)
}

#[tokio::test]
async fn load_two_questions_ninety_seconds() {
    let (controller, _) = ready(quiz(2, 90)).await;
    let snapshot = controller.snapshot().unwrap();
    assert_eq!(snapshot.time_remaining_secs, 90);
    assert_eq!(snapshot.status, SessionStatus::Ready);
    assert_eq!(snapshot.current_index, 0);
    assert_eq!(snapshot.title.as_deref(), Some("Quiz"));
}

#[tokio::test]
async fn reselecting_keeps_only_the_last_choice() {
    let (controller, _) = ready(quiz(2, 90)).await;
    controller.select_option(q("q1"), opt("A"));
    controller.select_option(q("q1"), opt("B"));
    controller.select_option(q("q1"), opt("B"));

    let snapshot = controller.snapshot().unwrap();
    assert_eq!(snapshot.selected_option, Some(opt("B")));
    assert_eq!(snapshot.answered, 1);
}

#[tokio::test]
async fn long_selection_sequences_keep_the_final_option() {
    let (controller, _) = ready(quiz(1, 60)).await;
    let sequence = ["A", "C", "B", "A", "C", "C", "B"];
    for option in sequence {
        controller.select_option(q("q1"), opt(option));
    }
    assert_eq!(controller.snapshot().unwrap().selected_option, Some(opt("B")));
}

#[tokio::test]
async fn stale_and_unknown_writes_are_ignored() {
    let (controller, _) = ready(quiz(2, 90)).await;
    controller.next();
    // q1 is no longer displayed.
    controller.select_option(q("q1"), opt("A"));
    // Option from nowhere.
    controller.select_option(q("q2"), opt("Z"));
    // Question from nowhere.
    controller.toggle_flag(q("q99"));

    let snapshot = controller.snapshot().unwrap();
    assert_eq!(snapshot.answered, 0);
    assert!(snapshot.palette.iter().all(|m| !m.flagged));
}

#[tokio::test]
async fn flag_twice_restores_membership() {
    let (controller, _) = ready(quiz(2, 90)).await;
    controller.toggle_flag(q("q1"));
    assert!(controller.snapshot().unwrap().palette[0].flagged);

    controller.toggle_flag(q("q1"));
    assert!(!controller.snapshot().unwrap().palette[0].flagged);
}

#[tokio::test]
async fn flag_and_ask_teacher_are_independent() {
    let (controller, _) = ready(quiz(2, 90)).await;
    controller.toggle_flag(q("q2"));
    controller.toggle_ask_teacher(q("q2"));
    controller.toggle_ask_teacher(q("q1"));
    controller.toggle_ask_teacher(q("q1"));

    let palette = controller.snapshot().unwrap().palette;
    assert!(palette[1].flagged && palette[1].ask_teacher);
    assert!(!palette[0].flagged && !palette[0].ask_teacher);

    let confirmation = controller.request_submit();
    assert_eq!(confirmation.flagged, 1);
    assert_eq!(confirmation.ask_teacher, 1);
}

#[tokio::test]
async fn countdown_clamps_at_zero() {
    let (controller, _) = ready(quiz(1, 3)).await;
    assert_eq!(controller.tick(), TickOutcome::Running(2));
    assert_eq!(controller.tick(), TickOutcome::Running(1));
    assert_eq!(controller.tick(), TickOutcome::Expired);
    for _ in 0..10 {
        assert_eq!(controller.tick(), TickOutcome::Expired);
    }
    let snapshot = controller.snapshot().unwrap();
    assert_eq!(snapshot.time_remaining_secs, 0);
    // No auto-submit by default.
    assert_eq!(snapshot.status, SessionStatus::Ready);
}

#[tokio::test]
async fn out_of_range_navigation_is_a_no_op() {
    let (controller, _) = ready(quiz(3, 60)).await;
    controller.go_to_question(2);
    assert_eq!(controller.snapshot().unwrap().current_index, 2);

    controller.go_to_question(3);
    controller.go_to_question(usize::MAX);
    assert_eq!(controller.snapshot().unwrap().current_index, 2);
}

#[tokio::test]
async fn next_and_prev_stop_at_the_edges() {
    let (controller, _) = ready(quiz(2, 60)).await;
    controller.prev();
    assert_eq!(controller.snapshot().unwrap().current_index, 0);

    controller.next();
    controller.next();
    let snapshot = controller.snapshot().unwrap();
    assert_eq!(snapshot.current_index, 1);
    assert!(snapshot.palette[1].current);
}

#[tokio::test]
async fn request_submit_summarises_without_side_effects() {
    let (controller, service) = ready(quiz(3, 60)).await;
    controller.select_option(q("q1"), opt("A"));
    controller.go_to_question(2);
    controller.select_option(q("q3"), opt("C"));

    let confirmation = controller.request_submit();
    assert_eq!(confirmation.total, 3);
    assert_eq!(confirmation.answered, 2);
    assert_eq!(confirmation.unanswered, vec![2]);
    assert!(!confirmation.is_complete());
    assert_eq!(controller.status(), SessionStatus::Ready);
    assert_eq!(service.submit_calls().unwrap(), 0);
}

#[tokio::test]
async fn failed_submit_reverts_to_ready_and_retry_succeeds() {
    let (controller, service) = ready(quiz(2, 90)).await;
    controller.select_option(q("q1"), opt("C"));
    service
        .fail_next_submit(GatewayError::Network("connection reset".into()))
        .unwrap();

    let err = controller.confirm_submit().await.unwrap_err();
    assert_eq!(err, SubmitError::Network("connection reset".into()));
    assert_eq!(controller.status(), SessionStatus::Ready);
    assert_eq!(controller.snapshot().unwrap().selected_option, Some(opt("C")));

    let receipt = controller.confirm_submit().await.unwrap();
    assert_eq!(controller.status(), SessionStatus::Submitted);
    let submissions = service.submissions().unwrap();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].receipt, receipt);
    assert_eq!(submissions[0].answers.get(&q("q1")), Some(&opt("C")));
}

#[tokio::test]
async fn validation_errors_surface_and_keep_answers() {
    let (controller, service) = ready(quiz(1, 90)).await;
    controller.select_option(q("q1"), opt("A"));
    service
        .fail_next_submit(GatewayError::Validation("attempt window closed".into()))
        .unwrap();

    let err = controller.confirm_submit().await.unwrap_err();
    assert!(matches!(err, SubmitError::Validation(_)));
    assert_eq!(controller.snapshot().unwrap().answered, 1);
}

#[tokio::test]
async fn submitted_session_rejects_further_mutation() {
    let (controller, _) = ready(quiz(2, 90)).await;
    controller.select_option(q("q1"), opt("A"));
    controller.confirm_submit().await.unwrap();
    let before = controller.snapshot().unwrap();

    controller.select_option(q("q1"), opt("B"));
    controller.toggle_flag(q("q1"));
    controller.toggle_ask_teacher(q("q2"));
    controller.next();
    assert_eq!(controller.tick(), TickOutcome::Finished);

    assert_eq!(controller.snapshot().unwrap(), before);
}

#[tokio::test]
async fn practice_papers_are_graded_locally_when_server_omits_score() {
    let keyed = |id: &str, correct: &str| question(id).with_correct_option(opt(correct)).unwrap();
    let detail = AssessmentDetail::new(
        AssessmentId::new("quiz"),
        "Practice",
        60,
        vec![keyed("q1", "A"), keyed("q2", "B")],
    )
    .unwrap();

    let service = InMemoryAssessmentService::new();
    service.insert(detail).unwrap();
    let gateway = Gateway {
        details: Arc::new(service.clone()),
        submissions: Arc::new(SlowSubmitter::new(Duration::ZERO)),
    };
    let controller =
        AssessmentSessionController::new(fixed_clock(), gateway, SessionSettings::default());
    controller.load(AssessmentId::new("quiz")).await.unwrap();
    assert!(controller.feedback().is_none());

    controller.select_option(q("q1"), opt("A"));
    controller.next();
    controller.select_option(q("q2"), opt("C"));
    let receipt = controller.confirm_submit().await.unwrap();

    assert_eq!(receipt.score, Some(1));
    let feedback = controller.feedback().unwrap();
    assert_eq!(feedback.correct_count(), 1);
    assert_eq!(feedback.possible_points, 2);
}

//
// ─── CONCURRENT SUBMIT ─────────────────────────────────────────────────────────
//

struct SlowSubmitter {
    delay: Duration,
    calls: AtomicUsize,
}

impl SlowSubmitter {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AssessmentSubmitter for SlowSubmitter {
    async fn submit_assessment(
        &self,
        _id: &AssessmentId,
        _answers: &AnswerSheet,
    ) -> Result<SubmitReceipt, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(SubmitReceipt::new(ResultId::new("result-1"), None, fixed_now()))
    }
}

#[tokio::test(start_paused = true)]
async fn duplicate_confirms_produce_one_submit_call() {
    let service = InMemoryAssessmentService::new();
    service.insert(quiz(2, 90)).unwrap();
    let submitter = Arc::new(SlowSubmitter::new(Duration::from_millis(300)));
    let gateway = Gateway {
        details: Arc::new(service),
        submissions: submitter.clone(),
    };
    let controller =
        AssessmentSessionController::new(fixed_clock(), gateway, SessionSettings::default());
    controller.load(AssessmentId::new("quiz")).await.unwrap();
    controller.select_option(q("q1"), opt("A"));

    let while_submitting = async {
        assert_eq!(controller.status(), SessionStatus::Submitting);
        // Flags still work while the request is outstanding; answers do not.
        controller.toggle_flag(q("q2"));
        controller.select_option(q("q1"), opt("B"));
        assert_eq!(controller.tick(), TickOutcome::Idle);
    };

    let (first, second, third, ()) = tokio::join!(
        controller.confirm_submit(),
        controller.confirm_submit(),
        controller.confirm_submit(),
        while_submitting,
    );

    assert!(first.is_ok());
    assert_eq!(second.unwrap_err(), SubmitError::InProgress);
    assert_eq!(third.unwrap_err(), SubmitError::InProgress);
    assert_eq!(submitter.calls.load(Ordering::SeqCst), 1);

    let snapshot = controller.snapshot().unwrap();
    assert_eq!(snapshot.status, SessionStatus::Submitted);
    assert_eq!(snapshot.time_remaining_secs, 90);
    assert!(snapshot.palette[1].flagged);
    assert_eq!(snapshot.selected_option, Some(opt("A")));
}

/// Replays one `(delay, outcome)` step per submit call.
struct ScriptedSubmitter {
    steps: Mutex<VecDeque<(Duration, Result<SubmitReceipt, GatewayError>)>>,
    calls: AtomicUsize,
}

impl ScriptedSubmitter {
    fn new(steps: Vec<(Duration, Result<SubmitReceipt, GatewayError>)>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AssessmentSubmitter for ScriptedSubmitter {
    async fn submit_assessment(
        &self,
        _id: &AssessmentId,
        _answers: &AnswerSheet,
    ) -> Result<SubmitReceipt, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front();
        let Some((delay, outcome)) = step else {
            return Err(GatewayError::Network("no scripted response".into()));
        };
        tokio::time::sleep(delay).await;
        outcome
    }
}

#[tokio::test(start_paused = true)]
async fn late_response_from_abandoned_attempt_leaves_reloaded_attempt_alone() {
    let service = InMemoryAssessmentService::new();
    service.insert(quiz(2, 90)).unwrap();
    let receipt = SubmitReceipt::new(ResultId::new("fresh"), None, fixed_now());
    let submitter = Arc::new(ScriptedSubmitter::new(vec![
        (
            Duration::from_millis(500),
            Err(GatewayError::Network("gateway timeout".into())),
        ),
        (Duration::from_millis(1_000), Ok(receipt)),
    ]));
    let gateway = Gateway {
        details: Arc::new(service),
        submissions: submitter.clone(),
    };
    let controller =
        AssessmentSessionController::new(fixed_clock(), gateway, SessionSettings::default());
    controller.load(AssessmentId::new("quiz")).await.unwrap();

    let stale = tokio::spawn({
        let controller = controller.clone();
        async move { controller.confirm_submit().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    controller.abandon();
    controller.load(AssessmentId::new("quiz")).await.unwrap();
    controller.select_option(q("q1"), opt("A"));
    let fresh = tokio::spawn({
        let controller = controller.clone();
        async move { controller.confirm_submit().await }
    });

    tokio::time::sleep(Duration::from_millis(500)).await;
    let stale = stale.await.unwrap();
    assert_eq!(stale.unwrap_err(), SubmitError::Network("gateway timeout".into()));
    assert_eq!(controller.status(), SessionStatus::Submitting);
    assert_eq!(
        controller.confirm_submit().await.unwrap_err(),
        SubmitError::InProgress
    );

    let fresh = fresh.await.unwrap().unwrap();
    assert_eq!(fresh.result_id, ResultId::new("fresh"));
    assert_eq!(controller.status(), SessionStatus::Submitted);
    assert_eq!(submitter.calls.load(Ordering::SeqCst), 2);
}
