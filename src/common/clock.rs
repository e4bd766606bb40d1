use time::OffsetDateTime;

/// Unix milliseconds, the unit every `created_at`/`updated_at` column is stored in.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
