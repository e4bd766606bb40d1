use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use crate::common::response::{ApiSuccess, MessageResponse};
use crate::docs::ApiDoc;
use axum::{http::StatusCode, middleware, response::IntoResponse, routing::get, Router};
use crate::state::AppState;

use tower_http::cors::{Any, CorsLayer};

pub fn configure_routes(state: AppState) -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_routes(state.clone()))
        .merge(crate::modules::transcode::router(state.clone()))
        .merge(crate::modules::action::router(state))
        .layer(cors)
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth::auth_middleware,
        ))
}

/// Liveness check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Worker is up", body = MessageResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Transcode",
    security(("bearer_auth" = []))
)]
pub async fn health() -> impl IntoResponse {
    ApiSuccess(MessageResponse { message: "OK".to_string() }, StatusCode::OK)
}
