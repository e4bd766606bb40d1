use super::model::{InputFileSource, Transcode};
use crate::common::clock::now_millis;
use crate::infrastructure::db::pool::DbPool;

pub struct TranscodeRepository;

pub struct NewTranscode<'a> {
    pub external_id: &'a str,
    pub input_file_source: InputFileSource,
    pub input_file_url: Option<&'a str>,
    pub input_file_key: Option<&'a str>,
    pub input_storage: Option<String>,
}

impl TranscodeRepository {
    pub async fn create(pool: &DbPool, new: NewTranscode<'_>) -> Result<Transcode, sqlx::Error> {
        let now = now_millis();

        sqlx::query_as::<_, Transcode>(
            r#"
            INSERT INTO transcodes (external_id, input_file_source, input_file_url, input_file_key, input_storage, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING *
            "#,
        )
        .bind(new.external_id)
        .bind(new.input_file_source)
        .bind(new.input_file_url)
        .bind(new.input_file_key)
        .bind(new.input_storage)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &DbPool, id: i64) -> Result<Option<Transcode>, sqlx::Error> {
        sqlx::query_as::<_, Transcode>("SELECT * FROM transcodes WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
