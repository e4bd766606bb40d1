use crate::common::response::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};

/// Rejects requests whose bearer token is not the configured `TOKEN`.
pub async fn auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|auth_header| auth_header.to_str().ok())
        .and_then(|auth_value| auth_value.strip_prefix("Bearer "));

    match token {
        Some(token) if token == state.config.token => Ok(next.run(req).await),
        Some(_) => Err(ApiError("Unauthorized: Invalid token".to_string(), StatusCode::UNAUTHORIZED)),
        None => Err(ApiError(
            "Unauthorized: Missing or invalid token".to_string(),
            StatusCode::UNAUTHORIZED,
        )),
    }
}
