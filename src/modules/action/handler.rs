use super::dto::{ActionDetailResponse, CreateActionRequest};
use super::service::ActionService;
use crate::common::response::{ApiError, ApiSuccess, IdResponse};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

/// Create and enqueue an action
#[utoipa::path(
    post,
    path = "/transcode/{id}/actions",
    params(
        ("id" = i64, Path, description = "Transcode ID")
    ),
    request_body = CreateActionRequest,
    responses(
        (status = 200, description = "Action enqueued", body = IdResponse),
        (status = 400, description = "Unknown action, invalid payload or incapable chaining"),
        (status = 404, description = "Transcode or producer action not found"),
        (status = 502, description = "Mirror call failed")
    ),
    tag = "Actions",
    security(("bearer_auth" = []))
)]
pub async fn create_action(
    State(state): State<AppState>,
    Path(transcode_id): Path<i64>,
    Json(payload): Json<CreateActionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = ActionService::submit(&state, transcode_id, payload).await?;
    Ok(ApiSuccess(IdResponse { id }, StatusCode::OK))
}

/// List ids of actions that have not finished
#[utoipa::path(
    get,
    path = "/transcode/{id}/actions/pending",
    params(
        ("id" = i64, Path, description = "Transcode ID")
    ),
    responses(
        (status = 200, description = "Ids of PENDING and RUNNING actions", body = Vec<i64>)
    ),
    tag = "Actions",
    security(("bearer_auth" = []))
)]
pub async fn list_pending(
    State(state): State<AppState>,
    Path(transcode_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let ids = ActionService::list_pending(&state, transcode_id).await?;
    Ok(ApiSuccess(ids, StatusCode::OK))
}

/// Get an action with its outputs
#[utoipa::path(
    get,
    path = "/transcode/{id}/actions/{action_id}",
    params(
        ("id" = i64, Path, description = "Transcode ID"),
        ("action_id" = i64, Path, description = "Action ID")
    ),
    responses(
        (status = 200, description = "Action details", body = ActionDetailResponse),
        (status = 404, description = "Action not found")
    ),
    tag = "Actions",
    security(("bearer_auth" = []))
)]
pub async fn get_action(
    State(state): State<AppState>,
    Path((transcode_id, action_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = ActionService::get_detail(&state, transcode_id, action_id).await?;
    Ok(ApiSuccess(detail, StatusCode::OK))
}
