use super::model::{SessionStatus, TranscodeSession};
use crate::common::clock::now_millis;
use crate::infrastructure::db::pool::DbPool;

pub struct SessionRepository;

impl SessionRepository {
    pub async fn find_active(
        pool: &DbPool,
        transcode_id: i64,
    ) -> Result<Option<TranscodeSession>, sqlx::Error> {
        sqlx::query_as::<_, TranscodeSession>(
            "SELECT * FROM transcode_sessions WHERE transcode_id = $1 AND status = $2 LIMIT 1",
        )
        .bind(transcode_id)
        .bind(SessionStatus::Active)
        .fetch_optional(pool)
        .await
    }

    pub async fn create_active(
        pool: &DbPool,
        transcode_id: i64,
        home_folder: &str,
        source_file_path: &str,
    ) -> Result<TranscodeSession, sqlx::Error> {
        let now = now_millis();

        sqlx::query_as::<_, TranscodeSession>(
            r#"
            INSERT INTO transcode_sessions (transcode_id, status, home_folder, source_file_path, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *
            "#,
        )
        .bind(transcode_id)
        .bind(SessionStatus::Active)
        .bind(home_folder)
        .bind(source_file_path)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    #[cfg(test)]
    pub async fn count_for_transcode(pool: &DbPool, transcode_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM transcode_sessions WHERE transcode_id = $1")
            .bind(transcode_id)
            .fetch_one(pool)
            .await
    }
}
