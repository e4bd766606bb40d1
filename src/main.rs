use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

use transcode_worker::config::settings::AppConfig;
use transcode_worker::infrastructure::db::pool::connect_to_db;
use transcode_worker::infrastructure::mirror::client::MirrorClient;
use transcode_worker::state::AppState;
use transcode_worker::workers::scheduler::{self, ActionQueue};
use transcode_worker::app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting transcode worker...");

    let config = AppConfig::new().map_err(|e| anyhow::anyhow!("TOKEN must be set: {e}"))?;
    tokio::fs::create_dir_all(&config.scratch_dir).await?;

    let db = connect_to_db(&config.database_url).await?;
    let mirror = MirrorClient::new(config.mirror.as_ref())?;
    if !mirror.is_enabled() {
        info!("Mirror disabled (MIRROR_API_BASE_URL / MIRROR_API_KEY not set)");
    }

    let (queue, receiver) = ActionQueue::new();
    let port = config.server_port;
    let state = AppState::new(config, db, mirror, queue, reqwest::Client::new());

    scheduler::recover_unfinished(&state).await?;
    let _scheduler = scheduler::start_scheduler(state.clone(), receiver);

    let app = app::create_app(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Server running on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}
