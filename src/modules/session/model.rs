use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Active,
    // Nothing expires sessions yet; the state exists so the schema can carry it.
    Expired,
}

/// A transcode's source file materialized on local disk.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct TranscodeSession {
    pub id: i64,
    pub transcode_id: i64,
    pub status: SessionStatus,
    pub home_folder: String,
    pub source_file_path: String,
    pub created_at: i64,
    pub updated_at: i64,
}
