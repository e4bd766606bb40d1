use super::model::{ActionStatus, TranscodeAction, TranscodeActionOutput};
use crate::common::clock::now_millis;
use crate::infrastructure::db::pool::DbPool;

pub struct ActionRepository;

pub struct NewAction<'a> {
    pub transcode_id: i64,
    pub action: &'a str,
    pub payload: Option<String>,
    pub payload_from_action_id: Option<i64>,
    pub external_id: Option<String>,
    pub max_attempts: i64,
    pub delay: i64,
}

impl ActionRepository {
    /// Inserts the row in PENDING with no attempts consumed.
    pub async fn create(pool: &DbPool, new: NewAction<'_>) -> Result<TranscodeAction, sqlx::Error> {
        let now = now_millis();

        sqlx::query_as::<_, TranscodeAction>(
            r#"
            INSERT INTO transcode_actions
                (transcode_id, action, payload, payload_from_action_id, external_id, max_attempts, delay, current_attempt, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, $9, $9)
            RETURNING *
            "#,
        )
        .bind(new.transcode_id)
        .bind(new.action)
        .bind(new.payload)
        .bind(new.payload_from_action_id)
        .bind(new.external_id)
        .bind(new.max_attempts)
        .bind(new.delay)
        .bind(ActionStatus::Pending)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &DbPool, id: i64) -> Result<Option<TranscodeAction>, sqlx::Error> {
        sqlx::query_as::<_, TranscodeAction>("SELECT * FROM transcode_actions WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_for_transcode(
        pool: &DbPool,
        transcode_id: i64,
        id: i64,
    ) -> Result<Option<TranscodeAction>, sqlx::Error> {
        sqlx::query_as::<_, TranscodeAction>(
            "SELECT * FROM transcode_actions WHERE id = $1 AND transcode_id = $2",
        )
        .bind(id)
        .bind(transcode_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn status(pool: &DbPool, id: i64) -> Result<Option<ActionStatus>, sqlx::Error> {
        sqlx::query_scalar::<_, ActionStatus>("SELECT status FROM transcode_actions WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Ids of actions in the transcode that have not reached a terminal state.
    pub async fn list_unfinished_ids(pool: &DbPool, transcode_id: i64) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM transcode_actions
            WHERE transcode_id = $1 AND status NOT IN ('COMPLETED', 'FAILED')
            ORDER BY id ASC
            "#,
        )
        .bind(transcode_id)
        .fetch_all(pool)
        .await
    }

    pub async fn list_by_status(
        pool: &DbPool,
        status: ActionStatus,
    ) -> Result<Vec<TranscodeAction>, sqlx::Error> {
        sqlx::query_as::<_, TranscodeAction>(
            "SELECT * FROM transcode_actions WHERE status = $1 ORDER BY id ASC",
        )
        .bind(status)
        .fetch_all(pool)
        .await
    }

    /// Enters RUNNING and consumes one attempt.
    ///
    /// Only a PENDING row can be claimed, so a duplicate push of an id that is
    /// already running is a no-op. Returns `None` when the row is missing, not
    /// PENDING, or has no attempts left; `current_attempt` never passes
    /// `max_attempts`.
    pub async fn begin_attempt(pool: &DbPool, id: i64) -> Result<Option<TranscodeAction>, sqlx::Error> {
        sqlx::query_as::<_, TranscodeAction>(
            r#"
            UPDATE transcode_actions
            SET status = $1, current_attempt = current_attempt + 1, updated_at = $2
            WHERE id = $3
              AND status = 'PENDING'
              AND current_attempt < max_attempts
            RETURNING *
            "#,
        )
        .bind(ActionStatus::Running)
        .bind(now_millis())
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn set_status(pool: &DbPool, id: i64, status: ActionStatus) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE transcode_actions SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(status)
            .bind(now_millis())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn append_output(
        pool: &DbPool,
        action_id: i64,
        output: &str,
        external_id: Option<String>,
    ) -> Result<TranscodeActionOutput, sqlx::Error> {
        let now = now_millis();

        sqlx::query_as::<_, TranscodeActionOutput>(
            r#"
            INSERT INTO transcode_action_outputs (external_id, transcode_action_id, output, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING *
            "#,
        )
        .bind(external_id)
        .bind(action_id)
        .bind(output)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    /// Outputs with an id strictly greater than `after`, in id order.
    pub async fn outputs_after(
        pool: &DbPool,
        action_id: i64,
        after: i64,
    ) -> Result<Vec<TranscodeActionOutput>, sqlx::Error> {
        sqlx::query_as::<_, TranscodeActionOutput>(
            r#"
            SELECT * FROM transcode_action_outputs
            WHERE transcode_action_id = $1 AND id > $2
            ORDER BY id ASC
            "#,
        )
        .bind(action_id)
        .bind(after)
        .fetch_all(pool)
        .await
    }

    pub async fn outputs(pool: &DbPool, action_id: i64) -> Result<Vec<TranscodeActionOutput>, sqlx::Error> {
        Self::outputs_after(pool, action_id, 0).await
    }
}
