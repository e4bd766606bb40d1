use axum::Router;
use axum::routing::{get, post};
use crate::state::AppState;
use axum::middleware;

pub mod catalog;
pub mod dto;
pub mod handler;
pub mod model;
pub mod repository;
pub mod service;
pub mod stream;

pub fn router(state: AppState) -> axum::Router<AppState> {
    Router::new()
        .route("/transcode/{id}/actions", post(handler::create_action))
        .route("/transcode/{id}/actions/pending", get(handler::list_pending))
        .route("/transcode/{id}/actions/{action_id}", get(handler::get_action))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth::auth_middleware,
        ))
}
