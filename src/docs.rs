use utoipa::OpenApi;
use crate::common::response::{IdResponse, MessageResponse};
use crate::modules::action::dto::*;
use crate::modules::action::model::{ActionOutput, ActionStatus};
use crate::modules::transcode::dto::CreateTranscodeRequest;
use crate::modules::transcode::model::InputFileSource;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        crate::modules::transcode::handler::create_transcode,
        crate::modules::action::handler::create_action,
        crate::modules::action::handler::list_pending,
        crate::modules::action::handler::get_action,
    ),
    components(
        schemas(
            IdResponse, MessageResponse,
            CreateTranscodeRequest, InputFileSource,
            CreateActionRequest, RetryPolicy, ActionDetailResponse, ActionOutput, ActionStatus,
        )
    ),
    tags(
        (name = "Transcode", description = "Source files registered for processing"),
        (name = "Actions", description = "Units of work queued against a transcode")
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

use utoipa::Modify;
use utoipa::openapi::security::{SecurityScheme, HttpAuthScheme, HttpBuilder};

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .build(),
                ),
            );
        }
    }
}
