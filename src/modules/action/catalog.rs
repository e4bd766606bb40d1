use serde_json::Value;
use validator::Validate;

use crate::common::error::{AppError, AppResult};
use crate::workers::actions::{download_source_file, inspect_transcode};
use crate::workers::context::ActionContext;

/// What a handler reports back to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed,
    /// A logical failure; `retry: false` ends the action even with attempts left.
    Failed { retry: bool },
}

/// Every action kind the worker knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    DownloadSourceFile,
    InspectTranscode,
}

impl ActionKind {
    pub const ALL: [ActionKind; 2] = [ActionKind::DownloadSourceFile, ActionKind::InspectTranscode];

    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::DownloadSourceFile => "DOWNLOAD_SOURCE_FILE",
            ActionKind::InspectTranscode => "INSPECT_TRANSCODE",
        }
    }

    pub fn lookup(name: &str) -> AppResult<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| AppError::UnknownAction(name.to_string()))
    }

    /// Whether the action consumes a file, either its own payload path or a producer's output.
    pub fn is_input_file(&self) -> bool {
        match self {
            ActionKind::DownloadSourceFile => false,
            ActionKind::InspectTranscode => true,
        }
    }

    /// Whether each output describes a file another action can consume.
    pub fn is_output_file(&self) -> bool {
        match self {
            ActionKind::DownloadSourceFile => true,
            ActionKind::InspectTranscode => false,
        }
    }

    pub fn validate_payload(&self, payload: Option<&Value>) -> AppResult<()> {
        let payload = match payload {
            None | Some(Value::Null) => return Ok(()),
            Some(payload) => payload,
        };

        match self {
            ActionKind::DownloadSourceFile => Ok(()),
            ActionKind::InspectTranscode => {
                let parsed: inspect_transcode::InspectTranscodePayload =
                    serde_json::from_value(payload.clone())
                        .map_err(|e| AppError::InvalidPayload(e.to_string()))?;
                parsed.validate()?;
                Ok(())
            }
        }
    }

    /// Chaining is refused when this kind needs a file and `producer` does not emit one.
    pub fn check_chaining(&self, producer: ActionKind) -> AppResult<()> {
        if self.is_input_file() && !producer.is_output_file() {
            return Err(AppError::IncapableChaining {
                consumer: self.name().to_string(),
                producer: producer.name().to_string(),
            });
        }
        Ok(())
    }

    pub async fn run(self, ctx: &ActionContext) -> anyhow::Result<ActionOutcome> {
        match self {
            ActionKind::DownloadSourceFile => download_source_file::run(ctx).await,
            ActionKind::InspectTranscode => inspect_transcode::run(ctx).await,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
