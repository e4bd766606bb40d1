//! Bounded-concurrency execution of queued actions.
//!
//! Action ids flow through a FIFO admission queue. A single dispatcher pulls
//! the next id and then waits for one of `queue_concurrency` slots, so ids
//! start in push order as slots free up. Failed attempts are re-enqueued by a detached timer
//! that holds no slot while it sleeps.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::common::error::{AppError, AppResult};
use crate::modules::action::catalog::{ActionKind, ActionOutcome};
use crate::modules::action::model::{ActionStatus, TranscodeAction};
use crate::modules::action::repository::ActionRepository;
use crate::modules::action::service::ActionService;
use crate::state::AppState;
use crate::workers::context::{ActionContext, Slot};

/// Wait before claiming an action again after the store failed to start its attempt.
pub const CLAIM_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Sending half of the admission queue; cheap to clone into anything that enqueues work.
#[derive(Clone)]
pub struct ActionQueue {
    sender: async_channel::Sender<i64>,
}

impl ActionQueue {
    pub fn new() -> (Self, async_channel::Receiver<i64>) {
        let (sender, receiver) = async_channel::unbounded();
        (Self { sender }, receiver)
    }

    pub async fn push(&self, action_id: i64) -> AppResult<()> {
        self.sender
            .send(action_id)
            .await
            .map_err(|_| AppError::QueueClosed)
    }
}

enum Verdict {
    Completed,
    GaveUp,
}

/// Spawns the dispatcher. It runs until every [`ActionQueue`] handle is dropped.
pub fn start_scheduler(state: AppState, receiver: async_channel::Receiver<i64>) -> JoinHandle<()> {
    let slots = Arc::new(Semaphore::new(state.config.queue_concurrency));
    info!(concurrency = state.config.queue_concurrency, "🎥 Starting action scheduler");
    tokio::spawn(dispatch(state, receiver, slots))
}

async fn dispatch(state: AppState, receiver: async_channel::Receiver<i64>, slots: Arc<Semaphore>) {
    // Receive before acquiring: an idle dispatcher must not sit on a permit
    // that a resuming handler is waiting for.
    while let Ok(action_id) = receiver.recv().await {
        let Ok(permit) = slots.clone().acquire_owned().await else {
            break;
        };

        let slot = Slot::new(slots.clone(), permit);
        tokio::spawn(run_action(state.clone(), action_id, slot));
    }

    info!("Action scheduler stopped (queue closed)");
}

async fn run_action(state: AppState, action_id: i64, slot: Slot) {
    let action = match ActionRepository::begin_attempt(&state.db, action_id).await {
        Ok(Some(action)) => action,
        Ok(None) => {
            skip_unclaimable(&state, action_id).await;
            return;
        }
        Err(e) => {
            error!(action_id, error = %e, "Failed to start attempt; claiming again later");
            requeue_unclaimed(state, action_id);
            return;
        }
    };

    info!(
        action_id,
        action = %action.action,
        attempt = action.current_attempt,
        max_attempts = action.max_attempts,
        "Starting execution"
    );

    let ctx = ActionContext::new(state.clone(), action.clone(), slot);
    let result = attempt(&ctx).await;
    drop(ctx);

    match result {
        Ok(Verdict::Completed) => {
            info!(action_id, action = %action.action, "Finished");
        }
        Ok(Verdict::GaveUp) => {
            finish_failed(&state, &action, "handler reported a non-retryable failure").await;
        }
        Err(e) if action.has_attempts_left() => schedule_retry(state, action, e),
        Err(e) => finish_failed(&state, &action, &format!("{e:#}")).await,
    }
}

async fn attempt(ctx: &ActionContext) -> anyhow::Result<Verdict> {
    let state = ctx.state();
    let action = ctx.action();

    let kind = ActionKind::lookup(&action.action)?;
    ActionService::update_status(state, action.id, ActionStatus::Running).await?;

    match kind.run(ctx).await? {
        ActionOutcome::Completed => {
            ActionService::update_status(state, action.id, ActionStatus::Completed).await?;
            Ok(Verdict::Completed)
        }
        ActionOutcome::Failed { retry: true } => {
            Err(AppError::HandlerFailure("handler reported a retryable failure".into()).into())
        }
        ActionOutcome::Failed { retry: false } => Ok(Verdict::GaveUp),
    }
}

fn schedule_retry(state: AppState, action: TranscodeAction, cause: anyhow::Error) {
    warn!(
        action_id = action.id,
        action = %action.action,
        attempt = action.current_attempt,
        max_attempts = action.max_attempts,
        delay_ms = action.delay,
        error = %format!("{cause:#}"),
        "Attempt failed; waiting before retry"
    );

    tokio::spawn(async move {
        sleep(Duration::from_millis(action.delay.max(0) as u64)).await;

        let requeue = async {
            ActionService::update_status(&state, action.id, ActionStatus::Pending).await?;
            state.queue.push(action.id).await
        };

        match requeue.await {
            Ok(()) => info!(
                action_id = action.id,
                action = %action.action,
                retry = action.current_attempt + 1,
                max_attempts = action.max_attempts,
                "Back in queue for retry"
            ),
            Err(e) => finish_failed(&state, &action, &format!("could not re-enqueue: {e}")).await,
        }
    });
}

/// Moves the action to FAILED. A mirror outage must not leave the action
/// RUNNING forever, so the local write goes ahead when mirroring fails.
async fn finish_failed(state: &AppState, action: &TranscodeAction, reason: &str) {
    if let Err(e) = ActionService::update_status(state, action.id, ActionStatus::Failed).await {
        warn!(action_id = action.id, error = %e, "Could not mirror terminal failure; committing locally");
        if let Err(e) = ActionRepository::set_status(&state.db, action.id, ActionStatus::Failed).await {
            error!(action_id = action.id, error = %e, "Failed to persist terminal failure");
        }
        state.outputs.publish();
    }

    error!(
        action_id = action.id,
        action = %action.action,
        attempt = action.current_attempt,
        reason,
        "Not retrying anymore"
    );
}

async fn skip_unclaimable(state: &AppState, action_id: i64) {
    match ActionRepository::find_by_id(&state.db, action_id).await {
        Ok(Some(action)) if action.status == ActionStatus::Pending && !action.has_attempts_left() => {
            finish_failed(state, &action, "no attempts left").await;
        }
        Ok(Some(action)) => {
            warn!(action_id, status = %action.status, "Action is not pending; skipping");
        }
        Ok(None) => error!(action_id, "Action not found; dropping from queue"),
        Err(e) => {
            error!(action_id, error = %e, "Failed to load action; claiming again later");
            requeue_unclaimed(state.clone(), action_id);
        }
    }
}

/// Puts an action back on the queue after [`CLAIM_RETRY_INTERVAL`] without
/// consuming an attempt. Used when the store could not be read or written, so
/// the row is still PENDING and nothing else would pick it up.
fn requeue_unclaimed(state: AppState, action_id: i64) {
    tokio::spawn(async move {
        sleep(CLAIM_RETRY_INTERVAL).await;
        if let Err(e) = state.queue.push(action_id).await {
            error!(action_id, error = %e, "Could not re-enqueue unclaimed action");
        }
    });
}

/// Re-enqueues work interrupted by a restart.
///
/// PENDING actions go straight back on the queue. RUNNING actions return to
/// PENDING when attempts remain and are failed otherwise. Retry timers are not
/// persisted, so this is also what revives actions caught mid-delay.
pub async fn recover_unfinished(state: &AppState) -> anyhow::Result<usize> {
    let pending = ActionRepository::list_by_status(&state.db, ActionStatus::Pending).await?;
    let running = ActionRepository::list_by_status(&state.db, ActionStatus::Running).await?;
    let mut requeued = 0;

    for action in pending {
        state.queue.push(action.id).await?;
        requeued += 1;
    }

    for action in running {
        if action.has_attempts_left() {
            ActionRepository::set_status(&state.db, action.id, ActionStatus::Pending).await?;
            state.queue.push(action.id).await?;
            requeued += 1;
        } else {
            finish_failed(state, &action, "interrupted during its final attempt").await;
        }
    }

    if requeued > 0 {
        info!(requeued, "Recovered unfinished actions");
    }
    Ok(requeued)
}
