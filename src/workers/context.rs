use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

use crate::common::error::AppResult;
use crate::modules::action::dto::CreateActionRequest;
use crate::modules::action::model::{ActionOutput, TranscodeAction};
use crate::modules::action::service::ActionService;
use crate::modules::action::stream::{self, OutputSubscription};
use crate::state::AppState;

/// One of the scheduler's N execution slots, held by a running action.
pub struct Slot {
    semaphore: Option<Arc<Semaphore>>,
    permit: Mutex<Option<OwnedSemaphorePermit>>,
}

impl Slot {
    pub fn new(semaphore: Arc<Semaphore>, permit: OwnedSemaphorePermit) -> Self {
        Self {
            semaphore: Some(semaphore),
            permit: Mutex::new(Some(permit)),
        }
    }

    /// A slot that belongs to no pool; suspending it releases nothing.
    pub fn detached() -> Self {
        Self {
            semaphore: None,
            permit: Mutex::new(None),
        }
    }

    /// Runs `fut` with this slot's permit handed back to the pool.
    ///
    /// Nested calls are fine: only the outermost one holds a permit to release
    /// and so only it waits to reacquire one.
    pub async fn suspend<F: Future>(&self, fut: F) -> anyhow::Result<F::Output> {
        let released = self.permit.lock().await.take().is_some();

        let output = fut.await;

        if released {
            if let Some(semaphore) = &self.semaphore {
                let permit = semaphore.clone().acquire_owned().await?;
                *self.permit.lock().await = Some(permit);
            }
        }

        Ok(output)
    }
}

/// Everything a handler gets to work with for one attempt of one action.
pub struct ActionContext {
    state: AppState,
    action: TranscodeAction,
    slot: Slot,
}

impl ActionContext {
    pub fn new(state: AppState, action: TranscodeAction, slot: Slot) -> Self {
        Self { state, action, slot }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn action(&self) -> &TranscodeAction {
        &self.action
    }

    /// Waits on a sub-task without occupying a worker slot.
    pub async fn suspend<F: Future>(&self, fut: F) -> anyhow::Result<F::Output> {
        self.slot.suspend(fut).await
    }

    /// Appends an output to this action's log and mirrors it.
    pub async fn emit<T: Serialize>(&self, output: &T) -> AppResult<ActionOutput> {
        let value = serde_json::to_value(output)?;
        ActionService::create_output(&self.state, self.action.id, value).await
    }

    /// Creates a child action in the same transcode and enqueues it.
    pub async fn spawn_child(&self, request: CreateActionRequest) -> AppResult<i64> {
        ActionService::submit(&self.state, self.action.transcode_id, request).await
    }

    /// Blocks until `action_id` is terminal and returns its outputs, with this slot released.
    pub async fn await_child(&self, action_id: i64) -> anyhow::Result<Vec<ActionOutput>> {
        let outputs = self.suspend(stream::collect(&self.state, action_id)).await??;
        Ok(outputs)
    }

    /// Feeds every output of `producer_id` to `callback` as it is produced.
    ///
    /// The slot is released while waiting for the producer and held while the
    /// callback runs.
    pub async fn follow<F, Fut>(&self, producer_id: i64, mut callback: F) -> anyhow::Result<()>
    where
        F: FnMut(ActionOutput) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let mut subscription = OutputSubscription::new(&self.state, producer_id);

        while let Some(batch) = self.suspend(subscription.next_batch()).await?? {
            for output in batch {
                callback(output).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn suspend_frees_the_permit_until_the_future_resolves() {
        let semaphore = Arc::new(Semaphore::new(1));
        let permit = semaphore.clone().acquire_owned().await.unwrap();
        let slot = Slot::new(semaphore.clone(), permit);

        assert_eq!(semaphore.available_permits(), 0);

        let observed = slot
            .suspend(async { semaphore.available_permits() })
            .await
            .unwrap();

        assert_eq!(observed, 1);
        assert_eq!(semaphore.available_permits(), 0);
    }

    #[tokio::test]
    async fn suspend_waits_for_a_free_permit_before_resuming() {
        let semaphore = Arc::new(Semaphore::new(1));
        let permit = semaphore.clone().acquire_owned().await.unwrap();
        let slot = Slot::new(semaphore.clone(), permit);

        let contender = semaphore.clone();
        let resumed = slot.suspend(async move {
            // Someone else takes the freed slot and keeps it for a while.
            let held = contender.acquire_owned().await.unwrap();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                drop(held);
            });
        });

        tokio::time::timeout(Duration::from_secs(2), resumed)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(semaphore.available_permits(), 0);
    }

    #[tokio::test]
    async fn nested_suspends_release_once() {
        let semaphore = Arc::new(Semaphore::new(1));
        let permit = semaphore.clone().acquire_owned().await.unwrap();
        let slot = Slot::new(semaphore.clone(), permit);

        slot.suspend(async {
            slot.suspend(async {
                assert_eq!(semaphore.available_permits(), 1);
            })
            .await
            .unwrap();
            assert_eq!(semaphore.available_permits(), 1);
        })
        .await
        .unwrap();

        assert_eq!(semaphore.available_permits(), 0);
    }

    #[tokio::test]
    async fn detached_slot_passes_through() {
        let slot = Slot::detached();
        assert_eq!(slot.suspend(async { 7 }).await.unwrap(), 7);
    }
}
