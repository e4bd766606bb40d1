use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::common::error::{AppError, AppResult};
use crate::config::settings::MirrorConfig;
use crate::modules::action::model::ActionStatus;

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: Option<String>,
}

struct Remote {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// Client for the remote system of record that mirrors actions and outputs.
///
/// Every call is a no-op when mirroring is unconfigured or when the rows
/// involved were never assigned external ids.
#[derive(Clone)]
pub struct MirrorClient {
    remote: Option<Arc<Remote>>,
}

impl MirrorClient {
    pub fn new(config: Option<&MirrorConfig>) -> AppResult<Self> {
        let Some(config) = config else {
            return Ok(Self::disabled());
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::RemoteSyncFailure(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            remote: Some(Arc::new(Remote {
                http,
                base_url: config.base_url.trim_end_matches('/').to_string(),
                api_key: config.api_key.clone(),
            })),
        })
    }

    pub fn disabled() -> Self {
        Self { remote: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.remote.is_some()
    }

    pub async fn create_action(
        &self,
        producer_external_id: Option<&str>,
        transcode_external_id: Option<&str>,
        action: &str,
        payload: Option<&Value>,
    ) -> AppResult<Option<String>> {
        let (Some(remote), Some(transcode)) = (&self.remote, transcode_external_id) else {
            return Ok(None);
        };

        let body = json!({
            "action": action,
            "payload": payload,
            "payloadFromActionId": producer_external_id,
        });

        let response = remote
            .http
            .post(format!("{}/v1/transcodes/{}/actions", remote.base_url, transcode))
            .bearer_auth(&remote.api_key)
            .json(&body)
            .send()
            .await;

        let created: CreatedResponse = read_json(response).await?;
        debug!(action, external_id = ?created.id, "Mirrored action creation");
        Ok(created.id)
    }

    pub async fn update_action_status(
        &self,
        transcode_external_id: Option<&str>,
        action_external_id: Option<&str>,
        status: ActionStatus,
    ) -> AppResult<()> {
        let (Some(remote), Some(transcode), Some(action)) =
            (&self.remote, transcode_external_id, action_external_id)
        else {
            return Ok(());
        };

        let response = remote
            .http
            .put(format!("{}/v1/transcodes/{}/actions", remote.base_url, transcode))
            .bearer_auth(&remote.api_key)
            .json(&json!({ "id": action, "status": status }))
            .send()
            .await;

        check_status(response).await?;
        Ok(())
    }

    pub async fn create_action_output(
        &self,
        transcode_external_id: Option<&str>,
        action_external_id: Option<&str>,
        output: &Value,
    ) -> AppResult<Option<String>> {
        let (Some(remote), Some(transcode), Some(action)) =
            (&self.remote, transcode_external_id, action_external_id)
        else {
            return Ok(None);
        };

        let response = remote
            .http
            .post(format!("{}/v1/transcodes/{}/actions/outputs", remote.base_url, transcode))
            .bearer_auth(&remote.api_key)
            .json(&json!({ "actionId": action, "output": output }))
            .send()
            .await;

        let created: CreatedResponse = read_json(response).await?;
        Ok(created.id)
    }
}

async fn check_status(
    response: Result<reqwest::Response, reqwest::Error>,
) -> AppResult<reqwest::Response> {
    let response = response.map_err(|e| AppError::RemoteSyncFailure(e.to_string()))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(AppError::RemoteSyncFailure(format!("mirror returned {status}: {body}")))
}

async fn read_json<T: for<'de> Deserialize<'de>>(
    response: Result<reqwest::Response, reqwest::Error>,
) -> AppResult<T> {
    check_status(response)
        .await?
        .json::<T>()
        .await
        .map_err(|e| AppError::RemoteSyncFailure(format!("unreadable mirror response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> MirrorClient {
        MirrorClient::new(Some(&MirrorConfig {
            base_url: server.uri(),
            api_key: "mirror-key".into(),
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn disabled_client_skips_remote_calls() {
        let client = MirrorClient::disabled();

        let id = client
            .create_action(None, Some("tr_1"), "DOWNLOAD_SOURCE_FILE", None)
            .await
            .unwrap();
        assert_eq!(id, None);

        client
            .update_action_status(Some("tr_1"), Some("ac_1"), ActionStatus::Completed)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn create_action_returns_external_id() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/transcodes/tr_1/actions"))
            .and(header("authorization", "Bearer mirror-key"))
            .and(body_partial_json(json!({ "action": "INSPECT_TRANSCODE", "payloadFromActionId": "ac_0" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "ac_1" })))
            .expect(1)
            .mount(&server)
            .await;

        let id = client_for(&server)
            .create_action(Some("ac_0"), Some("tr_1"), "INSPECT_TRANSCODE", None)
            .await
            .unwrap();

        assert_eq!(id.as_deref(), Some("ac_1"));
    }

    #[tokio::test]
    async fn missing_external_ids_skip_the_remote() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        client_for(&server)
            .update_action_status(Some("tr_1"), None, ActionStatus::Running)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn remote_errors_surface_as_sync_failures() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/v1/transcodes/tr_1/actions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .update_action_status(Some("tr_1"), Some("ac_1"), ActionStatus::Failed)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::RemoteSyncFailure(msg) if msg.contains("503")));
    }
}
