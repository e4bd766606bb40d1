use std::path::Path;

use aws_sdk_s3::config::Builder;
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::info;

use crate::modules::transcode::model::AwsS3Config;

/// Read access to the bucket a transcode's source file lives in.
#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
    pub bucket: String,
}

impl StorageService {
    pub fn new(config: &AwsS3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "transcode",
        );

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(config.force_path_style);

        // Custom endpoints cover MinIO and other S3-compatible stores.
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        }
    }

    /// Streams `key` into `destination` and returns the object's content type, if any.
    pub async fn download_to(&self, key: &str, destination: &Path) -> anyhow::Result<Option<String>> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;

        let content_type = object.content_type().map(str::to_string);

        let mut reader = object.body.into_async_read();
        let mut writer = BufWriter::new(File::create(destination).await?);
        let written = tokio::io::copy(&mut reader, &mut writer).await?;
        writer.flush().await?;

        info!(bucket = %self.bucket, key, bytes = written, "📦 Object downloaded");
        Ok(content_type)
    }
}
