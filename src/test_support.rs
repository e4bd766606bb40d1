use std::time::Duration;

use tempfile::TempDir;

use crate::config::settings::{AppConfig, MirrorConfig};
use crate::infrastructure::db::pool::connect_to_db;
use crate::infrastructure::mirror::client::MirrorClient;
use crate::modules::action::model::TranscodeAction;
use crate::modules::action::repository::ActionRepository;
use crate::modules::transcode::model::{InputFileSource, Transcode};
use crate::modules::transcode::repository::{NewTranscode, TranscodeRepository};
use crate::state::AppState;
use crate::workers::scheduler::{ActionQueue, start_scheduler};

/// A worker with its own on-disk database, scratch dir and running scheduler.
pub struct TestHarness {
    pub state: AppState,
    _data: TempDir,
}

/// What the stub installed by [`TestHarness::with_stub_ffprobe`] prints for any file.
pub const STUB_FFPROBE_OUTPUT: &str = r#"{"format":{"format_name":"stub"},"streams":[]}"#;

pub fn test_config(data: &TempDir, concurrency: usize, mirror: Option<MirrorConfig>) -> AppConfig {
    AppConfig {
        server_port: 0,
        token: "test-token".to_string(),
        database_url: format!("sqlite://{}", data.path().join("worker.db").display()),
        scratch_dir: data.path().join("scratch"),
        queue_concurrency: concurrency,
        mirror,
        ffprobe_path: "/nonexistent/ffprobe".to_string(),
        session_download_max_attempts: 2,
        session_download_delay_ms: 10,
    }
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::build(3, None).await
    }

    pub async fn with_concurrency(concurrency: usize) -> Self {
        Self::build(concurrency, None).await
    }

    /// Runs with an `ffprobe` stand-in that always succeeds with [`STUB_FFPROBE_OUTPUT`].
    pub async fn with_stub_ffprobe(concurrency: usize) -> Self {
        Self::build_with(concurrency, None, true).await
    }

    pub async fn with_mirror(base_url: &str) -> Self {
        let mirror = MirrorConfig {
            base_url: base_url.to_string(),
            api_key: "mirror-key".to_string(),
        };
        Self::build(3, Some(mirror)).await
    }

    async fn build(concurrency: usize, mirror: Option<MirrorConfig>) -> Self {
        Self::build_with(concurrency, mirror, false).await
    }

    async fn build_with(concurrency: usize, mirror: Option<MirrorConfig>, stub_ffprobe: bool) -> Self {
        let data = tempfile::tempdir().unwrap();
        let mut config = test_config(&data, concurrency, mirror);
        std::fs::create_dir_all(&config.scratch_dir).unwrap();
        if stub_ffprobe {
            config.ffprobe_path = install_stub_ffprobe(&data);
        }

        let db = connect_to_db(&config.database_url).await.unwrap();
        let mirror = MirrorClient::new(config.mirror.as_ref()).unwrap();
        let (queue, receiver) = ActionQueue::new();
        let state = AppState::new(config, db, mirror, queue, reqwest::Client::new());
        start_scheduler(state.clone(), receiver);

        Self { state, _data: data }
    }

    pub async fn url_transcode(&self, url: &str) -> Transcode {
        TranscodeRepository::create(
            &self.state.db,
            NewTranscode {
                external_id: "tr-local",
                input_file_source: InputFileSource::Url,
                input_file_url: Some(url),
                input_file_key: None,
                input_storage: None,
            },
        )
        .await
        .unwrap()
    }

    pub async fn transcode_with_external_id(&self, external_id: &str) -> Transcode {
        TranscodeRepository::create(
            &self.state.db,
            NewTranscode {
                external_id,
                input_file_source: InputFileSource::Url,
                input_file_url: Some("https://cdn.test/movie.mp4"),
                input_file_key: None,
                input_storage: None,
            },
        )
        .await
        .unwrap()
    }

    /// Polls until the action reaches COMPLETED or FAILED, panicking after `timeout`.
    pub async fn wait_for_terminal(&self, action_id: i64, timeout: Duration) -> TranscodeAction {
        tokio::time::timeout(timeout, async {
            loop {
                let action = ActionRepository::find_by_id(&self.state.db, action_id)
                    .await
                    .unwrap()
                    .unwrap();
                if action.status.is_terminal() {
                    return action;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("action {action_id} did not finish within {timeout:?}"))
    }
}

fn install_stub_ffprobe(data: &TempDir) -> String {
    use std::os::unix::fs::PermissionsExt;

    let path = data.path().join("ffprobe");
    std::fs::write(&path, format!("#!/bin/sh\ncat <<'EOF'\n{STUB_FFPROBE_OUTPUT}\nEOF\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.display().to_string()
}
