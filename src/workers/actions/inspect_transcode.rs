use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::process::Command;
use tracing::{info, warn};
use validator::Validate;

use super::FileRef;
use crate::modules::action::catalog::ActionOutcome;
use crate::modules::session::service::SessionManager;
use crate::workers::context::ActionContext;

#[derive(Debug, Deserialize, Validate)]
pub struct InspectTranscodePayload {
    #[validate(length(min = 1, message = "path is required"))]
    pub path: String,
}

#[derive(Debug, Serialize)]
struct Inspection<'a> {
    path: &'a str,
    probe: Value,
}

/// Inspects the payload path and every file the producer emits; the session
/// source stands in when the action names neither.
pub async fn run(ctx: &ActionContext) -> anyhow::Result<ActionOutcome> {
    let action = ctx.action();
    let mut inspected = false;

    if let Some(payload) = action.parsed_payload()? {
        let payload: InspectTranscodePayload = serde_json::from_value(payload)?;
        inspect(ctx, &payload.path).await?;
        inspected = true;
    }

    if let Some(producer_id) = action.payload_from_action_id {
        ctx.follow(producer_id, |output| async move {
            let file: FileRef = serde_json::from_value(output.output)?;
            inspect(ctx, &file.path).await
        })
        .await?;
        inspected = true;
    }

    if inspected {
        return Ok(ActionOutcome::Completed);
    }

    match SessionManager::get_session(ctx).await? {
        Some(session) => {
            inspect(ctx, &session.source_file_path).await?;
            Ok(ActionOutcome::Completed)
        }
        None => {
            warn!(action_id = action.id, transcode_id = action.transcode_id, "No session to inspect");
            Ok(ActionOutcome::Failed { retry: false })
        }
    }
}

async fn inspect(ctx: &ActionContext, path: &str) -> anyhow::Result<()> {
    let probe = probe(&ctx.state().config.ffprobe_path, path).await?;
    ctx.emit(&Inspection { path, probe }).await?;
    info!(action_id = ctx.action().id, path, "🔎 Inspected");
    Ok(())
}

async fn probe(ffprobe: &str, path: &str) -> anyhow::Result<Value> {
    tokio::fs::metadata(path)
        .await
        .with_context(|| format!("cannot inspect {path}"))?;

    let output = Command::new(ffprobe)
        .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(path)
        .output()
        .await
        .with_context(|| format!("failed to launch {ffprobe}"))?;

    if !output.status.success() {
        bail!(
            "ffprobe exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(serde_json::from_slice(&output.stdout)?)
}
