use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputFileSource {
    Url,
    Storage,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Transcode {
    pub id: i64,
    pub external_id: Option<String>,
    pub input_file_source: InputFileSource,
    pub input_file_url: Option<String>,
    pub input_file_key: Option<String>,
    pub input_storage: Option<String>, // stringified JSON with the storage details
    pub created_at: i64,
    pub updated_at: i64,
}

/// Provider configuration for `STORAGE` inputs, as supplied at creation time.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "provider", content = "config", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageDescriptor {
    AwsS3(AwsS3Config),
    Gcs(serde_json::Value),
    AzureBlob(serde_json::Value),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AwsS3Config {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub bucket: String,
    pub endpoint: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
}

impl Transcode {
    pub fn storage(&self) -> Result<Option<StorageDescriptor>, serde_json::Error> {
        self.input_storage
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
    }
}
