use tracing::info;
use validator::Validate;

use super::dto::CreateTranscodeRequest;
use super::model::{InputFileSource, StorageDescriptor, Transcode};
use super::repository::{NewTranscode, TranscodeRepository};
use crate::common::error::{AppError, AppResult};
use crate::state::AppState;

pub struct TranscodeService;

impl TranscodeService {
    pub async fn create(state: &AppState, req: CreateTranscodeRequest) -> AppResult<Transcode> {
        req.validate()?;

        let input_storage = match req.input_file_source {
            InputFileSource::Url => {
                let url = req
                    .input_file_url
                    .as_deref()
                    .ok_or_else(|| AppError::InvalidPayload("inputFileUrl is required for URL inputs".into()))?;
                url::Url::parse(url).map_err(|e| AppError::InvalidPayload(format!("inputFileUrl: {e}")))?;
                None
            }
            InputFileSource::Storage => {
                if req.input_file_key.as_deref().is_none_or(str::is_empty) {
                    return Err(AppError::InvalidPayload("inputFileKey is required for STORAGE inputs".into()));
                }
                let storage = req
                    .storage
                    .ok_or_else(|| AppError::InvalidPayload("storage is required for STORAGE inputs".into()))?;
                let descriptor: StorageDescriptor = serde_json::from_value(storage)
                    .map_err(|e| AppError::InvalidPayload(format!("storage: {e}")))?;
                Some(serde_json::to_string(&descriptor)?)
            }
        };

        let transcode = TranscodeRepository::create(
            &state.db,
            NewTranscode {
                external_id: &req.id,
                input_file_source: req.input_file_source,
                input_file_url: req.input_file_url.as_deref(),
                input_file_key: req.input_file_key.as_deref(),
                input_storage,
            },
        )
        .await?;

        info!(transcode_id = transcode.id, external_id = %req.id, source = ?transcode.input_file_source, "Transcode created");
        Ok(transcode)
    }
}
