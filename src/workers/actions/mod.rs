pub mod download_source_file;
pub mod inspect_transcode;

use serde::Deserialize;

/// The part of a file-producing output that consumers rely on.
#[derive(Debug, Deserialize)]
pub struct FileRef {
    pub path: String,
}
