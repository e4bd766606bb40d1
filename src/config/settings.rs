use std::path::PathBuf;

use crate::config::env::{self, EnvKey};

const DEFAULT_PORT: u16 = 9856;
const DEFAULT_CONCURRENCY: usize = 3;

#[derive(Clone, Debug)]
pub struct MirrorConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_port: u16,
    pub token: String,
    pub database_url: String,
    pub scratch_dir: PathBuf,
    pub queue_concurrency: usize,
    /// `None` disables mirroring entirely.
    pub mirror: Option<MirrorConfig>,
    pub ffprobe_path: String,
    pub session_download_max_attempts: i64,
    pub session_download_delay_ms: i64,
}

impl AppConfig {
    pub fn new() -> Result<Self, std::env::VarError> {
        let worker_home = PathBuf::from(env::get_or(EnvKey::WorkerHome, "./.transcode-worker"));
        let database_url = env::get_opt(EnvKey::DatabaseUrl).unwrap_or_else(|| {
            format!("sqlite://{}", worker_home.join("worker.db").display())
        });

        let mirror = match (
            env::get_opt(EnvKey::MirrorBaseUrl),
            env::get_opt(EnvKey::MirrorApiKey),
        ) {
            (Some(base_url), Some(api_key)) => Some(MirrorConfig { base_url, api_key }),
            _ => None,
        };

        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, DEFAULT_PORT),
            token: env::get(EnvKey::Token)?,
            database_url,
            scratch_dir: env::get_opt(EnvKey::ScratchDir)
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            queue_concurrency: env::get_parsed(EnvKey::QueueConcurrency, DEFAULT_CONCURRENCY).max(1),
            mirror,
            ffprobe_path: env::get_or(EnvKey::FfprobePath, "ffprobe"),
            session_download_max_attempts: env::get_parsed(EnvKey::SessionDownloadMaxAttempts, 3)
                .max(1),
            session_download_delay_ms: env::get_parsed(EnvKey::SessionDownloadDelayMs, 1000).max(0),
        })
    }
}
