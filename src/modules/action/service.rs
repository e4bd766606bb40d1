use serde_json::Value;
use tracing::{debug, info};
use validator::Validate;

use super::catalog::ActionKind;
use super::dto::{ActionDetailResponse, CreateActionRequest};
use super::model::{ActionOutput, ActionStatus, TranscodeAction};
use super::repository::{ActionRepository, NewAction};
use crate::common::error::{AppError, AppResult};
use crate::modules::transcode::model::Transcode;
use crate::modules::transcode::repository::TranscodeRepository;
use crate::state::AppState;

pub struct ActionService;

impl ActionService {
    /// Validates and persists a PENDING action without enqueueing it.
    ///
    /// Nothing is written when validation, the producer check, or the mirror call fails.
    pub async fn create(
        state: &AppState,
        transcode_id: i64,
        req: CreateActionRequest,
    ) -> AppResult<TranscodeAction> {
        req.validate()?;

        let transcode = Self::transcode(state, transcode_id).await?;
        let kind = ActionKind::lookup(&req.action)?;
        kind.validate_payload(req.payload.as_ref())?;

        let producer = match req.payload_from_action_id {
            Some(producer_id) => {
                let producer = ActionRepository::find_for_transcode(&state.db, transcode.id, producer_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("producer action {producer_id}")))?;
                kind.check_chaining(ActionKind::lookup(&producer.action)?)?;
                Some(producer)
            }
            None => None,
        };

        let payload = req.payload.filter(|payload| !payload.is_null());

        let external_id = state
            .mirror
            .create_action(
                producer.as_ref().and_then(|p| p.external_id.as_deref()),
                transcode.external_id.as_deref(),
                kind.name(),
                payload.as_ref(),
            )
            .await?;

        let action = ActionRepository::create(
            &state.db,
            NewAction {
                transcode_id: transcode.id,
                action: kind.name(),
                payload: payload.as_ref().map(Value::to_string),
                payload_from_action_id: producer.map(|p| p.id),
                external_id,
                max_attempts: req.retry.max_attempts,
                delay: req.retry.delay,
            },
        )
        .await?;

        info!(
            action_id = action.id,
            transcode_id = transcode.id,
            action = %kind,
            "Action created"
        );

        Ok(action)
    }

    /// Creates the action and hands it to the scheduler.
    pub async fn submit(state: &AppState, transcode_id: i64, req: CreateActionRequest) -> AppResult<i64> {
        let action = Self::create(state, transcode_id, req).await?;
        state.queue.push(action.id).await?;
        Ok(action.id)
    }

    /// Mirrors the transition, then commits it locally and wakes output readers.
    pub async fn update_status(state: &AppState, action_id: i64, status: ActionStatus) -> AppResult<()> {
        let action = Self::action(state, action_id).await?;
        let transcode = Self::transcode(state, action.transcode_id).await?;

        state
            .mirror
            .update_action_status(
                transcode.external_id.as_deref(),
                action.external_id.as_deref(),
                status,
            )
            .await?;

        ActionRepository::set_status(&state.db, action.id, status).await?;
        state.outputs.publish();

        debug!(action_id, %status, "Action status updated");
        Ok(())
    }

    pub async fn create_output(state: &AppState, action_id: i64, output: Value) -> AppResult<ActionOutput> {
        let action = Self::action(state, action_id).await?;
        let transcode = Self::transcode(state, action.transcode_id).await?;

        let external_id = state
            .mirror
            .create_action_output(
                transcode.external_id.as_deref(),
                action.external_id.as_deref(),
                &output,
            )
            .await?;

        let row = ActionRepository::append_output(&state.db, action.id, &output.to_string(), external_id).await?;
        state.outputs.publish();

        debug!(action_id, output_id = row.id, "Action output appended");
        Ok(ActionOutput { id: row.id, output })
    }

    pub async fn list_pending(state: &AppState, transcode_id: i64) -> AppResult<Vec<i64>> {
        Ok(ActionRepository::list_unfinished_ids(&state.db, transcode_id).await?)
    }

    pub async fn get_detail(
        state: &AppState,
        transcode_id: i64,
        action_id: i64,
    ) -> AppResult<ActionDetailResponse> {
        let action = ActionRepository::find_for_transcode(&state.db, transcode_id, action_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("action {action_id}")))?;

        let outputs = ActionRepository::outputs(&state.db, action.id)
            .await?
            .into_iter()
            .map(ActionOutput::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ActionDetailResponse::new(action, outputs)?)
    }

    async fn action(state: &AppState, action_id: i64) -> AppResult<TranscodeAction> {
        ActionRepository::find_by_id(&state.db, action_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("action {action_id}")))
    }

    async fn transcode(state: &AppState, transcode_id: i64) -> AppResult<Transcode> {
        TranscodeRepository::find_by_id(&state.db, transcode_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("transcode {transcode_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::action::dto::RetryPolicy;
    use crate::test_support::TestHarness;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(action: &str, payload: Option<Value>, from: Option<i64>) -> CreateActionRequest {
        CreateActionRequest {
            action: action.to_string(),
            payload,
            payload_from_action_id: from,
            retry: RetryPolicy::default(),
        }
    }

    async fn action_count(harness: &TestHarness) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM transcode_actions")
            .fetch_one(&harness.state.db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_persists_a_pending_action() {
        let harness = TestHarness::new().await;
        let transcode = harness.url_transcode("http://localhost/a.mp4").await;

        let action = ActionService::create(
            &harness.state,
            transcode.id,
            request("INSPECT_TRANSCODE", Some(json!({ "path": "/tmp/a.mp4" })), None),
        )
        .await
        .unwrap();

        assert_eq!(action.status, ActionStatus::Pending);
        assert_eq!(action.current_attempt, 0);
        assert_eq!(action.max_attempts, 3);
        assert_eq!(action.delay, 1000);
        assert_eq!(action.parsed_payload().unwrap(), Some(json!({ "path": "/tmp/a.mp4" })));
    }

    #[tokio::test]
    async fn chaining_to_a_non_file_producer_is_rejected_without_a_row() {
        let harness = TestHarness::new().await;
        let transcode = harness.url_transcode("http://localhost/a.mp4").await;

        let producer = ActionService::create(
            &harness.state,
            transcode.id,
            request("INSPECT_TRANSCODE", Some(json!({ "path": "/tmp/a.mp4" })), None),
        )
        .await
        .unwrap();
        let before = action_count(&harness).await;

        let err = ActionService::create(
            &harness.state,
            transcode.id,
            request("INSPECT_TRANSCODE", None, Some(producer.id)),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::IncapableChaining { .. }));
        assert_eq!(action_count(&harness).await, before);
    }

    #[tokio::test]
    async fn chaining_to_a_file_producer_is_accepted() {
        let harness = TestHarness::new().await;
        let transcode = harness.url_transcode("http://localhost/a.mp4").await;

        let producer = ActionService::create(&harness.state, transcode.id, request("DOWNLOAD_SOURCE_FILE", None, None))
            .await
            .unwrap();
        let consumer = ActionService::create(
            &harness.state,
            transcode.id,
            request("INSPECT_TRANSCODE", None, Some(producer.id)),
        )
        .await
        .unwrap();

        assert_eq!(consumer.payload_from_action_id, Some(producer.id));
    }

    #[tokio::test]
    async fn creation_errors_surface_synchronously() {
        let harness = TestHarness::new().await;
        let transcode = harness.url_transcode("http://localhost/a.mp4").await;

        let unknown = ActionService::create(&harness.state, transcode.id, request("NOPE", None, None))
            .await
            .unwrap_err();
        assert!(matches!(unknown, AppError::UnknownAction(_)));

        let invalid = ActionService::create(
            &harness.state,
            transcode.id,
            request("INSPECT_TRANSCODE", Some(json!({ "path": 1 })), None),
        )
        .await
        .unwrap_err();
        assert!(matches!(invalid, AppError::InvalidPayload(_)));

        let missing_transcode = ActionService::create(&harness.state, 404, request("DOWNLOAD_SOURCE_FILE", None, None))
            .await
            .unwrap_err();
        assert!(matches!(missing_transcode, AppError::NotFound(_)));

        let missing_producer = ActionService::create(
            &harness.state,
            transcode.id,
            request("INSPECT_TRANSCODE", None, Some(12345)),
        )
        .await
        .unwrap_err();
        assert!(matches!(missing_producer, AppError::NotFound(_)));

        let mut zero_attempts = request("DOWNLOAD_SOURCE_FILE", None, None);
        zero_attempts.retry.max_attempts = 0;
        let invalid_retry = ActionService::create(&harness.state, transcode.id, zero_attempts)
            .await
            .unwrap_err();
        assert!(matches!(invalid_retry, AppError::InvalidPayload(_)));

        assert_eq!(action_count(&harness).await, 0);
    }

    #[tokio::test]
    async fn producers_from_another_transcode_are_not_found() {
        let harness = TestHarness::new().await;
        let first = harness.url_transcode("http://localhost/a.mp4").await;
        let second = harness.url_transcode("http://localhost/b.mp4").await;

        let producer = ActionService::create(&harness.state, first.id, request("DOWNLOAD_SOURCE_FILE", None, None))
            .await
            .unwrap();

        let err = ActionService::create(
            &harness.state,
            second.id,
            request("INSPECT_TRANSCODE", None, Some(producer.id)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn mirror_ids_are_stored_and_outputs_mirrored() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/transcodes/ext-tr/actions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "ext-ac" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/transcodes/ext-tr/actions/outputs"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "ext-out" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/v1/transcodes/ext-tr/actions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "ext-ac" })))
            .expect(1)
            .mount(&server)
            .await;

        let harness = TestHarness::with_mirror(&server.uri()).await;
        let transcode = harness.transcode_with_external_id("ext-tr").await;

        let action = ActionService::create(&harness.state, transcode.id, request("DOWNLOAD_SOURCE_FILE", None, None))
            .await
            .unwrap();
        assert_eq!(action.external_id.as_deref(), Some("ext-ac"));

        ActionService::create_output(&harness.state, action.id, json!({ "path": "/tmp/x" }))
            .await
            .unwrap();
        let row = ActionRepository::outputs(&harness.state.db, action.id).await.unwrap();
        assert_eq!(row[0].external_id.as_deref(), Some("ext-out"));

        ActionService::update_status(&harness.state, action.id, ActionStatus::Completed)
            .await
            .unwrap();
        assert_eq!(
            ActionRepository::status(&harness.state.db, action.id).await.unwrap(),
            Some(ActionStatus::Completed)
        );
    }

    #[tokio::test]
    async fn failed_mirror_call_leaves_local_status_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/transcodes/ext-tr/actions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "ext-ac" })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let harness = TestHarness::with_mirror(&server.uri()).await;
        let transcode = harness.transcode_with_external_id("ext-tr").await;
        let action = ActionService::create(&harness.state, transcode.id, request("DOWNLOAD_SOURCE_FILE", None, None))
            .await
            .unwrap();

        let err = ActionService::update_status(&harness.state, action.id, ActionStatus::Completed)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::RemoteSyncFailure(_)));
        assert_eq!(
            ActionRepository::status(&harness.state.db, action.id).await.unwrap(),
            Some(ActionStatus::Pending)
        );
    }

    #[tokio::test]
    async fn detail_parses_payloads_and_outputs() {
        let harness = TestHarness::new().await;
        let transcode = harness.url_transcode("http://localhost/a.mp4").await;
        let action = ActionService::create(
            &harness.state,
            transcode.id,
            request("INSPECT_TRANSCODE", Some(json!({ "path": "/tmp/a.mp4" })), None),
        )
        .await
        .unwrap();

        ActionService::create_output(&harness.state, action.id, json!({ "n": 1 })).await.unwrap();
        ActionService::create_output(&harness.state, action.id, json!({ "n": 2 })).await.unwrap();

        let detail = ActionService::get_detail(&harness.state, transcode.id, action.id).await.unwrap();
        assert_eq!(detail.payload, Some(json!({ "path": "/tmp/a.mp4" })));
        assert_eq!(detail.outputs.len(), 2);
        assert_eq!(detail.outputs[0].output, json!({ "n": 1 }));
        assert_eq!(detail.outputs[1].output, json!({ "n": 2 }));
        assert!(detail.outputs[0].id < detail.outputs[1].id);

        let elsewhere = ActionService::get_detail(&harness.state, transcode.id + 1, action.id)
            .await
            .unwrap_err();
        assert!(matches!(elsewhere, AppError::NotFound(_)));
    }
}
