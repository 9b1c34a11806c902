use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Json, body::Body};
use axum_extra::extract::CookieJar;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use common::storage::{ByteRange, ContentHash, content_disposition};
use tokio_util::io::ReaderStream;
use tracing::instrument;

use crate::config::AccessConfig;
use crate::entity::bin;
use crate::error::{AppError, ErrorBody};
use crate::state::AppState;
use crate::store::{bins, files};

/// Name of the one-click verification cookie.
const VERIFICATION_COOKIE: &str = "verified";

/// Gates shared by file downloads and archive downloads.
pub(super) fn access_gates(
    bin: &bin::Model,
    headers: &HeaderMap,
    jar: &CookieJar,
    access: &AccessConfig,
) -> Result<(), AppError> {
    if access.manual_approval && bin.approved_at.is_none() {
        return Err(AppError::NotApproved);
    }

    if access.require_verification_cookie {
        // CLI downloaders cannot click through the verification page.
        let ua_allowed = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|ua| {
                access
                    .cookie_user_agent_allowlist
                    .iter()
                    .any(|prefix| ua.starts_with(prefix.as_str()))
            })
            .unwrap_or(false);

        let cookie_ok = jar
            .get(VERIFICATION_COOKIE)
            .map(|c| c.value() == access.expected_cookie_value)
            .unwrap_or(false);

        if !ua_allowed && !cookie_ok {
            return Err(AppError::VerificationRequired);
        }
    }

    Ok(())
}

/// A bin that serves reads: exists, not tombstoned, not expired.
pub(super) async fn find_live_bin(state: &AppState, bin_id: &str) -> Result<bin::Model, AppError> {
    let bin = bins::find(&state.db, bin_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Bin not found".into()))?;
    if bin.deleted_at.is_some() || bin.expired_at <= Utc::now() {
        return Err(AppError::NotFound("Bin not found".into()));
    }
    Ok(bin)
}

#[utoipa::path(
    get,
    path = "/{bin}/{filename}",
    tag = "Download",
    operation_id = "downloadFile",
    summary = "Download a file",
    description = "Redirects to a presigned object store URL when the backend supports it, \
        otherwise streams the object. A single `Range` request is honoured when streaming.",
    params(
        ("bin" = String, Path, description = "Bin id"),
        ("filename" = String, Path, description = "Filename within the bin"),
    ),
    responses(
        (status = 200, description = "File content"),
        (status = 206, description = "Partial file content"),
        (status = 302, description = "Redirect to a presigned URL"),
        (status = 304, description = "Cached copy is current (If-None-Match)"),
        (status = 403, description = "Download limit, approval, or verification gate", body = ErrorBody),
        (status = 404, description = "No such bin or file", body = ErrorBody),
    ),
)]
#[instrument(skip_all)]
pub async fn download_file(
    State(state): State<AppState>,
    Path((bin_id, filename)): Path<(String, String)>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let bin = find_live_bin(&state, &bin_id).await?;
    access_gates(&bin, &headers, &jar, &state.config.access)?;

    let (file, content) = files::find_live(&state.db, &bin_id, &filename)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;
    let content =
        content.ok_or_else(|| AppError::Internal("content row missing for live file".into()))?;
    if !content.in_storage {
        return Err(AppError::NotFound("File not found".into()));
    }

    let limit = state.config.limit.file_downloads;
    if limit > 0 && file.downloads >= limit as i64 {
        return Err(AppError::DownloadLimitReached);
    }

    // Content is immutable under its hash, so the hash is a perfect ETag. A
    // revalidation is not a download.
    let etag = format!("\"{}\"", content.sha256);
    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH)
        && let Ok(value) = if_none_match.to_str()
        && (value == etag || value == "*")
    {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }

    files::bump_downloads(&state.db, file.id).await?;
    bins::bump_downloads(&state.db, &bin.id).await?;

    let hash = ContentHash::from_hex(&content.sha256)
        .map_err(|e| AppError::Internal(format!("stored hash invalid: {e}")))?;

    // A presigned redirect offloads the transfer to the object store.
    if let Some(url) = state
        .store
        .presign_get(&hash, &file.filename, &content.mime)
        .await?
    {
        return Ok(Redirect::temporary(&url).into_response());
    }

    let total = content.bytes.max(0) as u64;
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_range(v, total));

    let (status, reader, length) = match range {
        Some((start, end)) => {
            let reader = state
                .store
                .get(&hash, Some(ByteRange { start, end: Some(end) }))
                .await?;
            (StatusCode::PARTIAL_CONTENT, reader, end - start + 1)
        }
        None => (StatusCode::OK, state.store.get(&hash, None).await?, total),
    };

    let md5_b64 = BASE64.encode(hex::decode(&content.md5).unwrap_or_default());
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, &content.mime)
        .header(header::CONTENT_LENGTH, length.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&content.mime, &file.filename),
        )
        .header(header::ETAG, etag)
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .header("Content-SHA256", &content.sha256)
        .header("Content-MD5", md5_b64)
        .header(header::ACCEPT_RANGES, "bytes");
    if let Some((start, end)) = range {
        builder = builder.header(
            header::CONTENT_RANGE,
            format!("bytes {start}-{end}/{total}"),
        );
    }

    builder
        .body(Body::from_stream(ReaderStream::new(reader)))
        .map_err(|e| AppError::Internal(format!("failed to build response: {e}")))
}

#[utoipa::path(
    delete,
    path = "/{bin}/{filename}",
    tag = "Download",
    operation_id = "deleteFile",
    summary = "Delete a file",
    description = "Tombstones the file. Its content is reclaimed by the background reaper once \
        no live file references it.",
    params(
        ("bin" = String, Path, description = "Bin id"),
        ("filename" = String, Path, description = "Filename within the bin"),
    ),
    responses(
        (status = 200, description = "File deleted"),
        (status = 404, description = "No such bin or file", body = ErrorBody),
        (status = 405, description = "Bin is locked", body = ErrorBody),
    ),
)]
#[instrument(skip_all)]
pub async fn delete_file(
    State(state): State<AppState>,
    Path((bin_id, filename)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let bin = find_live_bin(&state, &bin_id).await?;
    if bin.readonly {
        return Err(AppError::BinNotWritable);
    }

    let (file, _) = files::find_live(&state.db, &bin_id, &filename)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;
    files::soft_delete(&state.db, file.id).await?;

    Ok(Json(serde_json::json!({ "message": "File deleted" })))
}

/// Parse a single `bytes=` range against the total size. Multi-range and
/// unsatisfiable requests fall back to a full response.
fn parse_range(value: &str, total: u64) -> Option<(u64, u64)> {
    if total == 0 {
        return None;
    }
    let ranges = value.strip_prefix("bytes=")?;
    if ranges.contains(',') {
        return None;
    }

    let (start, end) = ranges.split_once('-')?;
    let start = start.trim();
    let end = end.trim();

    if start.is_empty() {
        // Suffix range: last N bytes.
        let suffix: u64 = end.parse().ok()?;
        if suffix == 0 {
            return None;
        }
        let len = suffix.min(total);
        return Some((total - len, total - 1));
    }

    let start: u64 = start.parse().ok()?;
    if start >= total {
        return None;
    }
    let end: u64 = if end.is_empty() {
        total - 1
    } else {
        end.parse().ok()?
    };
    if end < start {
        return None;
    }
    Some((start, end.min(total - 1)))
}
