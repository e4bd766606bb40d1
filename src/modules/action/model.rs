use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "PENDING",
            ActionStatus::Running => "RUNNING",
            ActionStatus::Completed => "COMPLETED",
            ActionStatus::Failed => "FAILED",
        }
    }

    /// COMPLETED and FAILED admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionStatus::Completed | ActionStatus::Failed)
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct TranscodeAction {
    pub id: i64,
    pub transcode_id: i64,
    pub action: String,
    pub payload: Option<String>, // stringified JSON
    pub max_attempts: i64,
    /// Retry delay in milliseconds.
    pub delay: i64,
    pub current_attempt: i64,
    pub payload_from_action_id: Option<i64>,
    pub external_id: Option<String>,
    pub status: ActionStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TranscodeAction {
    pub fn parsed_payload(&self) -> Result<Option<serde_json::Value>, serde_json::Error> {
        self.payload.as_deref().map(serde_json::from_str).transpose()
    }

    pub fn has_attempts_left(&self) -> bool {
        self.current_attempt < self.max_attempts
    }
}

/// Append-only; `id` is the ordering key subscribers use as their cursor.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct TranscodeActionOutput {
    pub id: i64,
    pub external_id: Option<String>,
    pub transcode_action_id: i64,
    pub output: String, // stringified JSON
    pub created_at: i64,
    pub updated_at: i64,
}

/// An output row with its payload decoded.
#[derive(Debug, Serialize, Clone, PartialEq, ToSchema)]
pub struct ActionOutput {
    pub id: i64,
    #[schema(value_type = Object)]
    pub output: serde_json::Value,
}

impl TryFrom<TranscodeActionOutput> for ActionOutput {
    type Error = serde_json::Error;

    fn try_from(row: TranscodeActionOutput) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            output: serde_json::from_str(&row.output)?,
        })
    }
}
