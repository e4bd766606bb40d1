use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;
use validator::Validate;

use super::model::InputFileSource;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTranscodeRequest {
    /// Identifier of the transcode in the mirror; echoed on every mirrored call.
    #[validate(length(min = 1, message = "id is required"))]
    pub id: String,
    pub input_file_source: InputFileSource,
    pub input_file_url: Option<String>,
    pub input_file_key: Option<String>,
    /// `{provider, config}`, required for `STORAGE` inputs.
    #[schema(value_type = Option<Object>)]
    pub storage: Option<Value>,
}
