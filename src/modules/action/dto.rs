use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::Validate;

use super::model::{ActionOutput, ActionStatus, TranscodeAction};

#[derive(Debug, Clone, Copy, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    #[validate(range(min = 1, message = "maxAttempts must be at least 1"))]
    pub max_attempts: i64,
    /// Milliseconds to wait before a failed attempt is re-enqueued.
    #[validate(range(min = 0, message = "delay cannot be negative"))]
    pub delay: i64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateActionRequest {
    #[validate(length(min = 1, message = "action is required"))]
    pub action: String,
    #[schema(value_type = Option<Object>)]
    pub payload: Option<Value>,
    pub payload_from_action_id: Option<i64>,
    #[serde(default)]
    #[validate(nested)]
    pub retry: RetryPolicy,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActionDetailResponse {
    pub id: i64,
    pub action: String,
    pub status: ActionStatus,
    #[schema(value_type = Option<Object>)]
    pub payload: Option<Value>,
    pub outputs: Vec<ActionOutput>,
    pub payload_from_action_id: Option<i64>,
    pub external_id: Option<String>,
    /// Unix milliseconds.
    pub created_at: i64,
    /// Unix milliseconds.
    pub updated_at: i64,
}

impl ActionDetailResponse {
    pub fn new(action: TranscodeAction, outputs: Vec<ActionOutput>) -> Result<Self, serde_json::Error> {
        Ok(Self {
            payload: action.parsed_payload()?,
            id: action.id,
            action: action.action,
            status: action.status,
            outputs,
            payload_from_action_id: action.payload_from_action_id,
            external_id: action.external_id,
            created_at: action.created_at,
            updated_at: action.updated_at,
        })
    }
}
