//! services/client/src/adapters/appwrite/storage.rs
//!
//! `StorageService` implementation: multipart uploads into the bucket and the
//! view/preview URLs handed to the UI.

use super::{AppwriteAdapter, UNIQUE_ID, UPLOAD_ID_HEADER};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{
    header,
    multipart::{Form, Part},
    Method,
};
use serde::Deserialize;
use sora_core::domain::{MediaFile, PreviewOptions, SessionToken, StoredFile};
use sora_core::ports::{PortError, PortResult, StorageService};
use tracing::debug;

/// Files above this size are sent in several requests of at most this many bytes.
pub const CHUNK_SIZE: usize = 5 * 1024 * 1024;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileRecord {
    #[serde(rename = "$id")]
    id: String,
    name: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    size_original: u64,
}
impl FileRecord {
    fn to_domain(self) -> StoredFile {
        StoredFile {
            id: self.id,
            name: self.name,
            mime_type: self.mime_type,
            size: self.size_original,
        }
    }
}

fn file_form(file: &MediaFile, data: Bytes) -> PortResult<Form> {
    let part = Part::bytes(data.to_vec())
        .file_name(file.name.clone())
        .mime_str(&file.mime_type)
        .map_err(|e| {
            PortError::Unexpected(format!("Invalid mime type '{}': {}", file.mime_type, e))
        })?;
    Ok(Form::new().text("fileId", UNIQUE_ID).part("file", part))
}

//=========================================================================================
// `StorageService` Trait Implementation
//=========================================================================================

#[async_trait]
impl StorageService for AppwriteAdapter {
    async fn upload_file(&self, token: &SessionToken, file: MediaFile) -> PortResult<StoredFile> {
        let url = self.url(&["storage", "buckets", self.config.storage_id.as_str(), "files"])?;
        let total = file.size();

        if total <= CHUNK_SIZE {
            let form = file_form(&file, file.data.clone())?;
            let record: FileRecord = self
                .send(self.request(Method::POST, url, Some(token)).multipart(form))
                .await?;
            return Ok(record.to_domain());
        }

        // Chunked upload: every request names its byte range, and all but the
        // first one point at the file id the first response assigned.
        let mut upload_id: Option<String> = None;
        let mut last: Option<FileRecord> = None;
        let mut start = 0;
        while start < total {
            let end = (start + CHUNK_SIZE).min(total);
            let form = file_form(&file, file.data.slice(start..end))?;

            let mut request = self
                .request(Method::POST, url.clone(), Some(token))
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", start, end - 1, total),
                )
                .multipart(form);
            if let Some(id) = &upload_id {
                request = request.header(UPLOAD_ID_HEADER, id.as_str());
            }

            let record: FileRecord = self.send(request).await?;
            debug!("Uploaded bytes {}-{} of {} for file {}", start, end - 1, total, record.id);
            if upload_id.is_none() {
                upload_id = Some(record.id.clone());
            }
            last = Some(record);
            start = end;
        }

        last.map(FileRecord::to_domain)
            .ok_or_else(|| PortError::Unexpected("Upload produced no file record".to_string()))
    }

    fn file_view_url(&self, file_id: &str) -> PortResult<String> {
        self.public_url(
            &["storage", "buckets", self.config.storage_id.as_str(), "files", file_id, "view"],
            &[],
        )
    }

    fn file_preview_url(&self, file_id: &str, options: &PreviewOptions) -> PortResult<String> {
        self.public_url(
            &["storage", "buckets", self.config.storage_id.as_str(), "files", file_id, "preview"],
            &[
                ("width", options.width.to_string()),
                ("height", options.height.to_string()),
                ("gravity", options.gravity.as_str().to_string()),
                ("quality", options.quality.to_string()),
            ],
        )
    }
}
