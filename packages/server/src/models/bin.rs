use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entity::{bin, content, file};
use crate::utils::fmt::{bytes_readable, relative_time};

use super::file::FileResponse;

/// Response DTO for a bin with its aggregates.
#[derive(Serialize, utoipa::ToSchema)]
pub struct BinResponse {
    #[schema(example = "mytestbin")]
    pub id: String,
    pub readonly: bool,
    /// Only meaningful when manual approval is enabled.
    pub approved: bool,
    pub downloads: i64,
    pub updates: i64,
    /// Live file count.
    pub files: u64,
    /// Sum of live file sizes.
    pub bytes: i64,
    pub bytes_readable: String,
    pub created_at: DateTime<Utc>,
    pub created_at_relative: String,
    pub updated_at: DateTime<Utc>,
    pub updated_at_relative: String,
    pub expired_at: DateTime<Utc>,
    pub expired_at_relative: String,
}

/// Bin listing: the bin and its live files.
#[derive(Serialize, utoipa::ToSchema)]
pub struct BinDetailResponse {
    pub bin: BinResponse,
    pub files: Vec<FileResponse>,
}

/// Body of a 201 upload response.
#[derive(Serialize, utoipa::ToSchema)]
pub struct UploadedResponse {
    pub file: FileResponse,
    pub bin: BinResponse,
}

/// Pure hydration of a bin row plus the live files backing its aggregates.
pub fn hydrate_bin(
    bin: &bin::Model,
    live_files: &[(file::Model, Option<content::Model>)],
    now: DateTime<Utc>,
) -> BinResponse {
    let bytes: i64 = live_files
        .iter()
        .filter_map(|(_, content)| content.as_ref())
        .map(|c| c.bytes)
        .sum();

    BinResponse {
        id: bin.id.clone(),
        readonly: bin.readonly,
        approved: bin.approved_at.is_some(),
        downloads: bin.downloads,
        updates: bin.updates,
        files: live_files.len() as u64,
        bytes,
        bytes_readable: bytes_readable(bytes.max(0) as u64),
        created_at: bin.created_at,
        created_at_relative: relative_time(bin.created_at, now),
        updated_at: bin.updated_at,
        updated_at_relative: relative_time(bin.updated_at, now),
        expired_at: bin.expired_at,
        expired_at_relative: relative_time(bin.expired_at, now),
    }
}

/// Skeleton for a bin that is addressable but has no row yet: visiting an
/// unused bin id must not write anything.
pub fn empty_bin(id: &str, expiration_secs: u64, now: DateTime<Utc>) -> BinResponse {
    let expired_at = now + chrono::Duration::seconds(expiration_secs as i64);
    BinResponse {
        id: id.to_owned(),
        readonly: false,
        approved: false,
        downloads: 0,
        updates: 0,
        files: 0,
        bytes: 0,
        bytes_readable: bytes_readable(0),
        created_at: now,
        created_at_relative: relative_time(now, now),
        updated_at: now,
        updated_at_relative: relative_time(now, now),
        expired_at,
        expired_at_relative: relative_time(expired_at, now),
    }
}
