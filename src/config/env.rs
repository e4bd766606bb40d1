use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    Token,
    DatabaseUrl,
    WorkerHome,
    ScratchDir,
    QueueConcurrency,
    MirrorBaseUrl,
    MirrorApiKey,
    FfprobePath,
    SessionDownloadMaxAttempts,
    SessionDownloadDelayMs,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::Token => "TOKEN",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::WorkerHome => "WORKER_HOME",
            EnvKey::ScratchDir => "SCRATCH_DIR",
            EnvKey::QueueConcurrency => "QUEUE_CONCURRENCY",
            EnvKey::MirrorBaseUrl => "MIRROR_API_BASE_URL",
            EnvKey::MirrorApiKey => "MIRROR_API_KEY",
            EnvKey::FfprobePath => "FFPROBE_PATH",
            EnvKey::SessionDownloadMaxAttempts => "SESSION_DOWNLOAD_MAX_ATTEMPTS",
            EnvKey::SessionDownloadDelayMs => "SESSION_DOWNLOAD_DELAY_MS",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

/// Unset and blank values are both treated as absent.
pub fn get_opt(key: EnvKey) -> Option<String> {
    env::var(key.as_str())
        .ok()
        .filter(|value| !value.trim().is_empty())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
