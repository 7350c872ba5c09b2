//! Line-oriented front end that drives one assessment attempt.

use hubx_core::model::{AssessmentId, QuestionId};
use hubx_core::time::format_countdown;
use services::{
    AssessmentSessionController, AssessmentSnapshot, SessionStatus, SubmitConfirmation,
    TimerHandle,
};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ShellCommand {
    Next,
    Prev,
    GoTo(usize),
    Select(String),
    Flag,
    AskTeacher,
    Status,
    Submit,
    Confirm,
    Retry,
    Help,
    Quit,
}

impl ShellCommand {
    pub(crate) fn parse(line: &str) -> Result<Self, String> {
        let mut parts = line.split_whitespace();
        let Some(head) = parts.next() else {
            return Ok(Self::Status);
        };
        let arg = parts.next();
        let cmd = match (head.to_ascii_lowercase().as_str(), arg) {
            ("n" | "next", None) => Self::Next,
            ("p" | "prev", None) => Self::Prev,
            ("g" | "go", Some(raw)) => {
                let number: usize = raw
                    .parse()
                    .map_err(|_| format!("not a question number: {raw}"))?;
                if number == 0 {
                    return Err("question numbers start at 1".to_owned());
                }
                Self::GoTo(number - 1)
            }
            ("s" | "select", Some(choice)) => Self::Select(choice.to_owned()),
            ("f" | "flag", None) => Self::Flag,
            ("a" | "ask", None) => Self::AskTeacher,
            ("status", None) => Self::Status,
            ("submit", None) => Self::Submit,
            ("confirm", None) => Self::Confirm,
            ("retry", None) => Self::Retry,
            ("h" | "help" | "?", None) => Self::Help,
            ("q" | "quit" | "exit", None) => Self::Quit,
            (other, _) => return Err(format!("unknown command: {other} (try `help`)")),
        };
        if parts.next().is_some() {
            return Err(format!("too many arguments for `{head}`"));
        }
        Ok(cmd)
    }
}

const HELP: &str = "\
commands:
  n / p          next / previous question
  g <num>        go to question <num>
  s <label|id>   select an option (A, B, ... or the option id)
  f              toggle review-later flag
  a              toggle ask-teacher
  status         show the current question
  submit         review before submitting
  confirm        submit answers
  retry          reload after a load error
  quit           leave the attempt";

pub(crate) async fn run(
    controller: &AssessmentSessionController,
    assessment_id: AssessmentId,
) -> Result<(), std::io::Error> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut timer: Option<TimerHandle> = None;

    load(controller, &assessment_id, &mut timer).await;

    while let Some(line) = lines.next_line().await? {
        let command = match ShellCommand::parse(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        match command {
            ShellCommand::Quit => break,
            ShellCommand::Help => println!("{HELP}"),
            ShellCommand::Retry => {
                if controller.status() == SessionStatus::Failed {
                    load(controller, &assessment_id, &mut timer).await;
                } else {
                    println!("nothing to retry");
                }
                continue;
            }
            ShellCommand::Next => controller.next(),
            ShellCommand::Prev => controller.prev(),
            ShellCommand::GoTo(index) => controller.go_to_question(index),
            ShellCommand::Select(choice) => select(controller, &choice),
            ShellCommand::Flag => {
                if let Some(id) = current_question_id(controller) {
                    controller.toggle_flag(id);
                }
            }
            ShellCommand::AskTeacher => {
                if let Some(id) = current_question_id(controller) {
                    controller.toggle_ask_teacher(id);
                }
            }
            ShellCommand::Status => {}
            ShellCommand::Submit => {
                print_confirmation(&controller.request_submit());
                continue;
            }
            ShellCommand::Confirm => match controller.confirm_submit().await {
                Ok(_) => {}
                Err(err) => println!("submit failed: {err}. Your answers are kept; `confirm` to try again."),
            },
        }

        if let Some(snapshot) = controller.snapshot() {
            render(&snapshot);
            if snapshot.status == SessionStatus::Submitted {
                print_result(controller, &snapshot);
                break;
            }
        }
    }

    if let Some(timer) = timer.take() {
        timer.stop();
    }
    controller.abandon();
    Ok(())
}

async fn load(
    controller: &AssessmentSessionController,
    assessment_id: &AssessmentId,
    timer: &mut Option<TimerHandle>,
) {
    println!("loading {assessment_id}...");
    match controller.load(assessment_id.clone()).await {
        Ok(snapshot) => {
            if let Some(title) = snapshot.title.as_deref() {
                println!("== {title} ==");
            }
            if !snapshot.subjects.is_empty() {
                println!("subjects: {}", snapshot.subjects.join(", "));
            }
            match controller.start_timer() {
                Ok(handle) => *timer = Some(handle),
                Err(err) => tracing::warn!(error = %err, "countdown not started"),
            }
            render(&snapshot);
            println!("type `help` for commands");
        }
        Err(err) => {
            println!("{}", err.user_message());
            println!("type `retry` to try again or `quit` to leave");
        }
    }
}

fn current_question_id(controller: &AssessmentSessionController) -> Option<QuestionId> {
    controller
        .snapshot()
        .and_then(|s| s.current_question)
        .map(|q| q.id().clone())
}

fn select(controller: &AssessmentSessionController, choice: &str) {
    let Some(question) = controller.snapshot().and_then(|s| s.current_question) else {
        return;
    };
    let mut chars = choice.chars();
    let by_label = match (chars.next(), chars.next()) {
        (Some(label), None) => question.option_by_label(label),
        _ => None,
    };
    let option = by_label.or_else(|| {
        question
            .options()
            .iter()
            .find(|o| o.id.as_str() == choice)
    });
    match option {
        Some(option) => controller.select_option(question.id().clone(), option.id.clone()),
        None => println!("no option {choice} on this question"),
    }
}

fn render(snapshot: &AssessmentSnapshot) {
    println!();
    println!(
        "[{}] question {}/{}  answered {}/{}",
        format_countdown(snapshot.time_remaining_secs),
        snapshot.current_index + 1,
        snapshot.total_questions,
        snapshot.answered,
        snapshot.total_questions,
    );
    let palette: Vec<String> = snapshot
        .palette
        .iter()
        .map(|m| {
            let mut cell = (m.index + 1).to_string();
            if m.answered {
                cell.push('*');
            }
            if m.flagged {
                cell.push('!');
            }
            if m.ask_teacher {
                cell.push('?');
            }
            if m.current {
                cell = format!("[{cell}]");
            }
            cell
        })
        .collect();
    println!("{}", palette.join(" "));

    if let Some(question) = snapshot.current_question.as_ref() {
        println!("{} ({} pt)", question.prompt(), question.points());
        for (offset, option) in question.options().iter().enumerate() {
            let label = u8::try_from(offset)
                .ok()
                .and_then(|o| b'A'.checked_add(o))
                .map_or('?', char::from);
            let marker = if snapshot.selected_option.as_ref() == Some(&option.id) {
                ">"
            } else {
                " "
            };
            println!(" {marker} {label}. {}", option.text);
        }
    }
    if snapshot.status == SessionStatus::Ready && snapshot.time_remaining_secs == 0 {
        println!("time is up; `confirm` to submit your answers");
    }
}

fn print_confirmation(confirmation: &SubmitConfirmation) {
    println!(
        "answered {} of {} questions, {} left on the clock",
        confirmation.answered,
        confirmation.total,
        format_countdown(confirmation.time_remaining_secs)
    );
    if !confirmation.is_complete() {
        let numbers: Vec<String> = confirmation
            .unanswered
            .iter()
            .map(ToString::to_string)
            .collect();
        println!("unanswered: {}", numbers.join(", "));
    }
    if confirmation.flagged > 0 {
        println!("{} question(s) flagged for review", confirmation.flagged);
    }
    if confirmation.ask_teacher > 0 {
        println!("{} question(s) marked for your teacher", confirmation.ask_teacher);
    }
    println!("type `confirm` to submit");
}

fn print_result(controller: &AssessmentSessionController, snapshot: &AssessmentSnapshot) {
    let Some(receipt) = snapshot.receipt.as_ref() else {
        return;
    };
    println!("submitted; result {}", receipt.result_id);
    if let Some(score) = receipt.score {
        println!("score: {score}/{}", snapshot.total_score);
    }
    if let Some(feedback) = controller.feedback() {
        for (number, item) in feedback.questions.iter().enumerate() {
            let verdict = if item.is_correct() { "correct" } else { "incorrect" };
            println!("  {}. {verdict}", number + 1);
        }
    }
}
