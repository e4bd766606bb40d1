use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio_util::io::StreamReader;
use tracing::{info, warn};
use uuid::Uuid;

use crate::infrastructure::storage::s3::StorageService;
use crate::modules::action::catalog::ActionOutcome;
use crate::modules::transcode::model::{InputFileSource, StorageDescriptor, Transcode};
use crate::modules::transcode::repository::TranscodeRepository;
use crate::workers::context::ActionContext;

const PARTIAL_NAME: &str = "source.download";
const SNIFF_LEN: usize = 8192;

/// Output of a successful download; also what a session is built from.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    pub path: String,
    pub home_folder: String,
}

pub async fn run(ctx: &ActionContext) -> anyhow::Result<ActionOutcome> {
    let state = ctx.state();
    let transcode = TranscodeRepository::find_by_id(&state.db, ctx.action().transcode_id)
        .await?
        .context("transcode disappeared")?;

    let home = state
        .config
        .scratch_dir
        .join(format!("transcode-{}-{}", transcode.id, Uuid::new_v4()));
    tokio::fs::create_dir_all(&home)
        .await
        .with_context(|| format!("failed to create {}", home.display()))?;

    match fetch(ctx, &transcode, &home).await {
        Ok(Some(path)) => {
            info!(transcode_id = transcode.id, path = %path.display(), "⬇️ Source file downloaded");
            ctx.emit(&SourceFile {
                path: path.display().to_string(),
                home_folder: home.display().to_string(),
            })
            .await?;
            Ok(ActionOutcome::Completed)
        }
        Ok(None) => {
            let _ = tokio::fs::remove_dir_all(&home).await;
            Ok(ActionOutcome::Failed { retry: false })
        }
        Err(e) => {
            let _ = tokio::fs::remove_dir_all(&home).await;
            Err(e)
        }
    }
}

/// Downloads into `home` and returns the final path, or `None` when the input can never be fetched.
async fn fetch(ctx: &ActionContext, transcode: &Transcode, home: &Path) -> anyhow::Result<Option<PathBuf>> {
    let partial = home.join(PARTIAL_NAME);

    let (content_type, origin) = match transcode.input_file_source {
        InputFileSource::Url => {
            let url = transcode.input_file_url.as_deref().context("transcode has no input URL")?;
            (download_url(&ctx.state().http, url, &partial).await?, url)
        }
        InputFileSource::Storage => {
            let key = transcode.input_file_key.as_deref().context("transcode has no input key")?;
            match transcode.storage()? {
                Some(StorageDescriptor::AwsS3(config)) => {
                    (StorageService::new(&config).download_to(key, &partial).await?, key)
                }
                Some(StorageDescriptor::Gcs(_)) | Some(StorageDescriptor::AzureBlob(_)) => {
                    warn!(transcode_id = transcode.id, "Storage provider is not supported");
                    return Ok(None);
                }
                None => bail!("transcode has no storage descriptor"),
            }
        }
    };

    let sniffed = infer::get(&read_head(&partial).await?);
    let Some(extension) = pick_extension(sniffed, content_type.as_deref(), origin) else {
        warn!(transcode_id = transcode.id, origin, "Cannot tell what kind of file the source is");
        return Ok(None);
    };
    let path = home.join(format!("source.{extension}"));
    tokio::fs::rename(&partial, &path).await?;

    Ok(Some(path))
}

async fn download_url(http: &reqwest::Client, url: &str, destination: &Path) -> anyhow::Result<Option<String>> {
    let response = http.get(url).send().await?.error_for_status()?;

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let body = response.bytes_stream().map(|chunk| chunk.map_err(std::io::Error::other));
    let mut reader = StreamReader::new(body);
    let mut writer = BufWriter::new(File::create(destination).await?);
    tokio::io::copy(&mut reader, &mut writer).await?;
    writer.flush().await?;

    Ok(content_type)
}

async fn read_head(path: &Path) -> anyhow::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    File::open(path).await?.take(SNIFF_LEN as u64).read_to_end(&mut head).await?;
    Ok(head)
}

/// The file's own bytes decide first, then the declared content type, then the origin name.
/// The origin's extension is kept whenever it agrees with the detected type.
fn pick_extension(sniffed: Option<infer::Type>, content_type: Option<&str>, origin: &str) -> Option<String> {
    let origin_ext = origin_extension(origin);
    let agrees = |mime: &str| {
        origin_ext.as_ref().filter(|ext| {
            mime_guess::get_mime_extensions_str(mime).is_some_and(|known| known.iter().any(|k| k.eq_ignore_ascii_case(ext)))
        })
    };

    if let Some(kind) = sniffed {
        let ext = agrees(kind.mime_type()).cloned().unwrap_or_else(|| kind.extension().to_string());
        return Some(ext);
    }

    let declared = content_type
        .and_then(|value| value.parse::<mime::Mime>().ok())
        .map(|mime| mime.essence_str().to_string());

    if let Some(declared) = declared {
        if let Some(ext) = agrees(&declared) {
            return Some(ext.clone());
        }
        if let Some(first) = mime_guess::get_mime_extensions_str(&declared).and_then(|known| known.first()) {
            return Some(first.to_string());
        }
    }

    origin_ext
}

fn origin_extension(origin: &str) -> Option<String> {
    let path = url::Url::parse(origin)
        .map(|url| url.path().to_string())
        .unwrap_or_else(|_| origin.to_string());

    Path::new(&path)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(str::to_ascii_lowercase)
}
