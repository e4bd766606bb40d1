use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::config::settings::AppConfig;
use crate::infrastructure::db::pool::DbPool;
use crate::infrastructure::mirror::client::MirrorClient;
use crate::modules::action::stream::OutputEvents;
use crate::workers::scheduler::ActionQueue;

/// Per-transcode locks serializing session materialization.
pub type SessionLocks = Arc<DashMap<i64, Arc<Mutex<()>>>>;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub mirror: MirrorClient,
    pub queue: ActionQueue,
    pub outputs: OutputEvents,
    pub session_locks: SessionLocks,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: DbPool,
        mirror: MirrorClient,
        queue: ActionQueue,
        http: reqwest::Client,
    ) -> Self {
        Self {
            config,
            db,
            mirror,
            queue,
            outputs: OutputEvents::default(),
            session_locks: SessionLocks::default(),
            http,
        }
    }
}
