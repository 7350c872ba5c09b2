use std::fmt;

use hubx_core::model::SubmitReceipt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::service::TickOutcome;
use super::workflow::AssessmentSessionController;
use crate::error::{SubmitError, TimerError};
use crate::settings::TimeoutPolicy;

/// Owned handle to a running countdown. Dropping it stops the timer.
///
/// Stopping frees the controller's countdown slot immediately, so a new timer
/// can be started right away.
pub struct TimerHandle {
    controller: AssessmentSessionController,
    token: u64,
    task: Option<JoinHandle<()>>,
}

impl TimerHandle {
    /// Stop the countdown now.
    pub fn stop(mut self) {
        self.cancel();
    }

    /// True once the countdown task has exited on its own or been stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.controller.release_timer(self.token);
            tracing::debug!(token = self.token, "countdown stopped");
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("token", &self.token)
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}

/// Frees the countdown slot however the countdown task ends.
struct SlotGuard {
    controller: AssessmentSessionController,
    token: u64,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.controller.release_timer(self.token);
    }
}

impl AssessmentSessionController {
    /// Start ticking the countdown at the configured interval.
    ///
    /// Start it after a successful `load`; the task exits by itself once the
    /// session is submitted, failed or abandoned, and when time runs out under
    /// `TimeoutPolicy::Ignore`.
    ///
    /// # Errors
    ///
    /// Returns `TimerError::NoRuntime` outside a tokio runtime and
    /// `TimerError::AlreadyRunning` if a countdown is already active.
    pub fn start_timer(&self) -> Result<TimerHandle, TimerError> {
        let runtime = Handle::try_current().map_err(|_| TimerError::NoRuntime)?;
        let token = self.claim_timer().ok_or(TimerError::AlreadyRunning)?;
        let guard = SlotGuard {
            controller: self.clone(),
            token,
        };
        let task = runtime.spawn(run_countdown(guard));
        tracing::debug!(token, "countdown started");
        Ok(TimerHandle {
            controller: self.clone(),
            token,
            task: Some(task),
        })
    }
}

async fn run_countdown(guard: SlotGuard) {
    let controller = &guard.controller;
    let period = controller.settings().tick_interval();
    let mut interval = time::interval_at(Instant::now() + period, period);
    // Late ticks are spaced out again rather than fired in a burst.
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let Some(outcome) = controller.tick_for(guard.token) else {
            tracing::debug!(token = guard.token, "countdown superseded");
            break;
        };
        match outcome {
            TickOutcome::Running(_) | TickOutcome::Idle => {}
            TickOutcome::Finished => break,
            TickOutcome::Expired => match controller.settings().timeout_policy() {
                TimeoutPolicy::Ignore => {
                    tracing::info!("time is up; waiting for the student to submit");
                    break;
                }
                TimeoutPolicy::AutoSubmit => match auto_submit(controller).await {
                    Ok(receipt) => {
                        tracing::info!(result_id = %receipt.result_id, "time is up; answers submitted");
                        break;
                    }
                    Err(SubmitError::InProgress) => {}
                    Err(err @ SubmitError::Network(_)) => {
                        tracing::warn!(error = %err, "auto-submit failed; retrying on next tick");
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "auto-submit rejected; leaving the attempt open");
                        break;
                    }
                },
            },
        }
    }
}

/// Runs the submit on its own task so stopping the countdown never strands the
/// session in `Submitting`.
async fn auto_submit(controller: &AssessmentSessionController) -> Result<SubmitReceipt, SubmitError> {
    let controller = controller.clone();
    tokio::spawn(async move { controller.confirm_submit().await })
        .await
        .unwrap_or_else(|err| Err(SubmitError::Network(format!("auto-submit task failed: {err}"))))
}
