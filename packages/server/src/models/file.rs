use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entity::{bin, content, file};
use crate::utils::fmt::{bytes_readable, relative_time};

/// Response DTO for a single file, hydrated from its row and content row.
#[derive(Serialize, utoipa::ToSchema)]
pub struct FileResponse {
    #[schema(example = "report.pdf")]
    pub filename: String,
    /// SHA-256 of the file content, lowercase hex.
    #[schema(example = "0069ffe8a2494e3e37b0b4e08b8fcdcbae0168b76d0d5b6947c4b3a0f0ab4d45")]
    pub sha256: String,
    /// MD5 of the file content, lowercase hex.
    pub md5: String,
    #[schema(example = "application/pdf")]
    pub mime: String,
    #[schema(example = 142857)]
    pub bytes: i64,
    #[schema(example = "142.9 kB")]
    pub bytes_readable: String,
    pub downloads: i64,
    pub updates: i64,
    pub created_at: DateTime<Utc>,
    pub created_at_relative: String,
    pub updated_at: DateTime<Utc>,
    pub updated_at_relative: String,
    /// Live file in a live bin whose object is present in storage.
    pub available: bool,
}

/// Pure hydration of a file row. `now` is passed in so the derived fields are
/// a function of the inputs alone.
pub fn hydrate_file(
    file: &file::Model,
    content: &content::Model,
    bin: &bin::Model,
    now: DateTime<Utc>,
) -> FileResponse {
    let available = file.deleted_at.is_none()
        && bin.deleted_at.is_none()
        && bin.expired_at > now
        && content.in_storage;

    FileResponse {
        filename: file.filename.clone(),
        sha256: file.sha256.clone(),
        md5: content.md5.clone(),
        mime: content.mime.clone(),
        bytes: content.bytes,
        bytes_readable: bytes_readable(content.bytes.max(0) as u64),
        downloads: file.downloads,
        updates: file.updates,
        created_at: file.created_at,
        created_at_relative: relative_time(file.created_at, now),
        updated_at: file.updated_at,
        updated_at_relative: relative_time(file.updated_at, now),
        available,
    }
}
