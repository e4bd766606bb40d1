use super::dto::CreateTranscodeRequest;
use super::service::TranscodeService;
use crate::common::response::{ApiError, IdResponse};
use crate::common::response::ApiSuccess;
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};

/// Register a transcode
#[utoipa::path(
    post,
    path = "/transcode",
    request_body = CreateTranscodeRequest,
    responses(
        (status = 200, description = "Transcode created", body = IdResponse),
        (status = 400, description = "Bad Request"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Transcode",
    security(("bearer_auth" = []))
)]
pub async fn create_transcode(
    State(state): State<AppState>,
    Json(payload): Json<CreateTranscodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let transcode = TranscodeService::create(&state, payload).await?;
    Ok(ApiSuccess(IdResponse { id: transcode.id }, StatusCode::OK))
}
