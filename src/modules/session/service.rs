use std::sync::Arc;

use tracing::{info, warn};

use super::model::TranscodeSession;
use super::repository::SessionRepository;
use crate::modules::action::catalog::ActionKind;
use crate::modules::action::dto::{CreateActionRequest, RetryPolicy};
use crate::workers::actions::download_source_file::SourceFile;
use crate::workers::context::ActionContext;

pub struct SessionManager;

impl SessionManager {
    /// Returns the transcode's ACTIVE session, downloading the source to create one if needed.
    ///
    /// Calls for the same transcode are serialized so that only one download
    /// ever runs. Waiting for the lock and for the download happens with the
    /// caller's slot released. `None` means the download produced nothing.
    pub async fn get_session(ctx: &ActionContext) -> anyhow::Result<Option<TranscodeSession>> {
        let state = ctx.state();
        let transcode_id = ctx.action().transcode_id;

        let lock = state.session_locks.entry(transcode_id).or_default().clone();
        let session = match ctx.suspend(lock.clone().lock_owned()).await {
            Ok(_guard) => Self::find_or_create(ctx).await,
            Err(err) => Err(err),
        };

        // The map and `lock` account for two references; any more are waiters.
        state
            .session_locks
            .remove_if(&transcode_id, |_, held| Arc::strong_count(held) <= 2);

        session
    }

    async fn find_or_create(ctx: &ActionContext) -> anyhow::Result<Option<TranscodeSession>> {
        let state = ctx.state();
        let transcode_id = ctx.action().transcode_id;

        if let Some(session) = SessionRepository::find_active(&state.db, transcode_id).await? {
            return Ok(Some(session));
        }

        let download = ctx
            .spawn_child(CreateActionRequest {
                action: ActionKind::DownloadSourceFile.name().to_string(),
                payload: None,
                payload_from_action_id: None,
                retry: RetryPolicy {
                    max_attempts: state.config.session_download_max_attempts,
                    delay: state.config.session_download_delay_ms,
                },
            })
            .await?;

        let Some(first) = ctx.await_child(download).await?.into_iter().next() else {
            warn!(transcode_id, download, "Source download produced no file");
            return Ok(None);
        };

        let source: SourceFile = serde_json::from_value(first.output)?;
        let session =
            SessionRepository::create_active(&state.db, transcode_id, &source.home_folder, &source.path).await?;

        info!(transcode_id, session_id = session.id, home = %session.home_folder, "Session created");
        Ok(Some(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::action::repository::{ActionRepository, NewAction};
    use crate::test_support::TestHarness;
    use crate::workers::context::Slot;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn context(harness: &TestHarness, transcode_id: i64) -> ActionContext {
        let action = ActionRepository::create(
            &harness.state.db,
            NewAction {
                transcode_id,
                action: "INSPECT_TRANSCODE",
                payload: None,
                payload_from_action_id: None,
                external_id: None,
                max_attempts: 1,
                delay: 0,
            },
        )
        .await
        .unwrap();
        ActionContext::new(harness.state.clone(), action, Slot::detached())
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/source.mp4"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "video/mp4")
                    .set_body_bytes(b"frames".to_vec()),
            )
            .expect(1)
            .mount(&server)
            .await;

        let harness = TestHarness::new().await;
        let transcode = harness.url_transcode(&format!("{}/source.mp4", server.uri())).await;

        let first = context(&harness, transcode.id).await;
        let second = context(&harness, transcode.id).await;

        let (a, b) = tokio::join!(SessionManager::get_session(&first), SessionManager::get_session(&second));
        let (a, b) = (a.unwrap().unwrap(), b.unwrap().unwrap());

        assert_eq!(a.id, b.id);
        assert!(a.source_file_path.ends_with("source.mp4"));
        assert_eq!(std::fs::read(&a.source_file_path).unwrap(), b"frames");
        assert_eq!(
            SessionRepository::count_for_transcode(&harness.state.db, transcode.id).await.unwrap(),
            1
        );
        assert!(harness.state.session_locks.is_empty());
    }

    #[tokio::test]
    async fn failed_download_yields_no_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let harness = TestHarness::new().await;
        let transcode = harness.url_transcode(&format!("{}/gone.mp4", server.uri())).await;
        let ctx = context(&harness, transcode.id).await;

        assert!(SessionManager::get_session(&ctx).await.unwrap().is_none());
        assert!(SessionRepository::find_active(&harness.state.db, transcode.id).await.unwrap().is_none());
    }
}
