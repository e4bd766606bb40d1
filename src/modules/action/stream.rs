//! Log-following reads over the append-only output table.
//!
//! The table stays the single source of truth. Writers call
//! [`OutputEvents::publish`] after every output insert and status change so
//! in-process readers wake immediately; [`POLL_INTERVAL`] bounds the wait when
//! the writer lives in another process.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;

use super::model::ActionOutput;
use super::repository::ActionRepository;
use crate::common::error::{AppError, AppResult};
use crate::infrastructure::db::pool::DbPool;
use crate::state::AppState;

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct OutputEvents {
    version: Arc<watch::Sender<u64>>,
}

impl Default for OutputEvents {
    fn default() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            version: Arc::new(version),
        }
    }
}

impl OutputEvents {
    pub fn publish(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    /// Resolves on the next publish or after the poll interval.
    ///
    /// Call it before reading the store: a publish that lands between the read
    /// and the await still wakes the caller.
    fn changed(&self) -> impl Future<Output = ()> + use<> {
        let mut rx = self.version.subscribe();
        async move {
            tokio::select! {
                _ = rx.changed() => {}
                _ = sleep(POLL_INTERVAL) => {}
            }
        }
    }
}

/// A cursor over one action's outputs.
///
/// Each call to [`next_batch`](Self::next_batch) yields the rows produced since
/// the previous call, in id order, until the action is terminal and drained.
/// The cursor is held in memory only, so a restarted reader starts over and
/// callbacks built on it must be idempotent.
pub struct OutputSubscription {
    db: DbPool,
    events: OutputEvents,
    action_id: i64,
    cursor: i64,
    finished: bool,
}

impl OutputSubscription {
    pub fn new(state: &AppState, action_id: i64) -> Self {
        Self {
            db: state.db.clone(),
            events: state.outputs.clone(),
            action_id,
            cursor: 0,
            finished: false,
        }
    }

    /// Id of the last delivered output, `0` before the first delivery.
    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    pub async fn next_batch(&mut self) -> AppResult<Option<Vec<ActionOutput>>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            let changed = self.events.changed();

            // Status first: a terminal status read here guarantees every output
            // written before the transition is visible to the query below.
            let status = ActionRepository::status(&self.db, self.action_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("action {}", self.action_id)))?;
            let rows = ActionRepository::outputs_after(&self.db, self.action_id, self.cursor).await?;

            if status.is_terminal() {
                self.finished = true;
            }

            if let Some(last) = rows.last() {
                self.cursor = last.id;
                let batch = rows
                    .into_iter()
                    .map(ActionOutput::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                return Ok(Some(batch));
            }

            if self.finished {
                return Ok(None);
            }

            changed.await;
        }
    }
}

/// Blocks until the action is COMPLETED or FAILED, then returns all of its outputs.
///
/// An action that failed without producing anything yields an empty set.
pub async fn collect(state: &AppState, action_id: i64) -> AppResult<Vec<ActionOutput>> {
    loop {
        let changed = state.outputs.changed();

        let status = ActionRepository::status(&state.db, action_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("action {action_id}")))?;

        if status.is_terminal() {
            let rows = ActionRepository::outputs(&state.db, action_id).await?;
            return Ok(rows
                .into_iter()
                .map(ActionOutput::try_from)
                .collect::<Result<Vec<_>, _>>()?);
        }

        changed.await;
    }
}

/// Invokes `callback` once per output of `action_id`, in id order, until the
/// action is terminal and every output up to the transition has been delivered.
pub async fn subscribe<F, Fut>(state: &AppState, action_id: i64, mut callback: F) -> anyhow::Result<()>
where
    F: FnMut(ActionOutput) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let mut subscription = OutputSubscription::new(state, action_id);

    while let Some(batch) = subscription.next_batch().await? {
        for output in batch {
            callback(output).await?;
        }
    }

    Ok(())
}
