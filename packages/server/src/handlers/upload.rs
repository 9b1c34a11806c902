use std::sync::atomic::Ordering;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Path, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::{Json, body::Body};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use common::storage::BoxReader;
use common::workspace::StagedUpload;
use futures::StreamExt;
use sea_orm::SqlErr;
use tracing::{info, instrument};

use crate::error::{AppError, ErrorBody};
use crate::extractors::source::SourceIp;
use crate::middleware::dump_headers;
use crate::models::bin::{UploadedResponse, hydrate_bin};
use crate::models::file::hydrate_file;
use crate::state::AppState;
use crate::store::files::NewFile;
use crate::store::{bins, contents, files};
use crate::utils::bin_id::{generate_bin_id, validate_bin_id};
use crate::utils::filename::{extension_rejected, sanitize_filename};

/// Uploads are bounded by scratch capacity and the storage ceiling, not by a
/// fixed body cap.
pub fn upload_body_limit() -> DefaultBodyLimit {
    DefaultBodyLimit::disable()
}

/// Attempts at finding an unused synthesised bin id.
const GENERATE_ATTEMPTS: usize = 10;

#[utoipa::path(
    post,
    path = "/",
    tag = "Upload",
    operation_id = "uploadToHeaderBin",
    summary = "Upload a file, addressing by headers",
    description = "Uploads the raw request body. The target bin comes from the `bin` request \
        header; when absent, an unused bin id is synthesised. The filename comes from the \
        `filename` header. Optional `Content-SHA256` (hex) and `Content-MD5` (base64) headers \
        are verified against the received bytes.",
    request_body(content_type = "application/octet-stream", description = "Raw file bytes"),
    responses(
        (status = 201, description = "File stored and referenced", body = UploadedResponse),
        (status = 400, description = "Invalid bin, filename, checksum, or body", body = ErrorBody),
        (status = 403, description = "Banned client, blocked content, or rejected extension", body = ErrorBody),
        (status = 405, description = "Bin not writable", body = ErrorBody),
        (status = 507, description = "No scratch capacity or storage limit reached", body = ErrorBody),
    ),
)]
#[instrument(skip_all)]
pub async fn upload_root(
    State(state): State<AppState>,
    source: SourceIp,
    request: Request,
) -> Result<impl IntoResponse, AppError> {
    let (parts, body) = request.into_parts();

    let bin_id = match header_value(&parts.headers, "bin") {
        Some(explicit) => explicit,
        None => synthesize_bin_id(&state).await?,
    };
    let filename = header_value(&parts.headers, "filename").ok_or_else(|| {
        AppError::InvalidFilename("The filename request header is required".into())
    })?;

    handle_upload(state, source.0, bin_id, filename, parts.headers, body).await
}

#[utoipa::path(
    post,
    path = "/{bin}/{filename}",
    tag = "Upload",
    operation_id = "uploadToBin",
    summary = "Upload a file into a bin",
    description = "Uploads the raw request body as `{filename}` inside `{bin}`, creating the bin \
        on first use. Re-uploading an existing filename overwrites it. Content is deduplicated \
        across bins by its SHA-256; a body already in storage is not transferred again. \
        Also served for PUT.",
    params(
        ("bin" = String, Path, description = "Bin id"),
        ("filename" = String, Path, description = "Filename within the bin"),
    ),
    request_body(content_type = "application/octet-stream", description = "Raw file bytes"),
    responses(
        (status = 201, description = "File stored and referenced", body = UploadedResponse),
        (status = 400, description = "Invalid bin, filename, checksum, or body", body = ErrorBody),
        (status = 403, description = "Banned client, blocked content, or rejected extension", body = ErrorBody),
        (status = 405, description = "Bin not writable", body = ErrorBody),
        (status = 409, description = "Concurrent overwrite conflict", body = ErrorBody),
        (status = 507, description = "No scratch capacity or storage limit reached", body = ErrorBody),
    ),
)]
#[instrument(skip_all)]
pub async fn upload_file(
    State(state): State<AppState>,
    source: SourceIp,
    path: Path<(String, String)>,
    request: Request,
) -> Result<impl IntoResponse, AppError> {
    let Path((bin_id, filename)) = path;
    let (parts, body) = request.into_parts();
    handle_upload(state, source.0, bin_id, filename, parts.headers, body).await
}

/// The ingress pipeline: validate, stage and hash the body, deduplicate
/// against the content table, push to the object store when needed, then
/// commit the metadata.
async fn handle_upload(
    state: AppState,
    ip: String,
    bin_id: String,
    filename: String,
    headers: HeaderMap,
    body: Body,
) -> Result<(StatusCode, Json<UploadedResponse>), AppError> {
    let started = Instant::now();

    validate_bin_id(&bin_id).map_err(|e| AppError::InvalidBin(e.message().into()))?;
    let filename =
        sanitize_filename(&filename).map_err(|e| AppError::InvalidFilename(e.message().into()))?;
    if let Some(ext) = extension_rejected(&filename, &state.config.limit.reject_extensions) {
        return Err(AppError::ExtensionRejected(ext));
    }

    let now = Utc::now();
    if let Some(bin) = bins::find(&state.db, &bin_id).await?
        && (bin.readonly || bin.deleted_at.is_some() || bin.expired_at <= now)
    {
        return Err(AppError::BinNotWritable);
    }

    let storage_limit = state.config.limit.storage_bytes;
    if storage_limit > 0 && state.stored_bytes.load(Ordering::Relaxed) > storage_limit {
        return Err(AppError::StorageLimitExceeded);
    }

    // Stage the body on scratch disk, hashing as it streams. The scratch
    // guard unlinks on every early return below.
    let expected_bytes = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let mut scratch = state.workspace.acquire(expected_bytes).await?;

    let mut stream = body.into_data_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| AppError::Validation(format!("Upload read error: {e}")))?;
        scratch.write(&chunk).await?;
    }
    let staged = scratch.finish().await?;

    verify_checksums(&headers, &staged)?;
    if staged.bytes == 0 {
        return Err(AppError::EmptyBody);
    }

    let mime = mime_guess::from_path(&filename)
        .first_raw()
        .unwrap_or("application/octet-stream");

    // The content row is the coordination point between concurrent uploads of
    // the same bytes: whoever sees in_storage=false pushes; identical bytes
    // under an identical key make the duplicate push harmless.
    let sha256_hex = staged.sha256.to_hex();
    let content = contents::insert_or_touch(
        &state.db,
        &sha256_hex,
        &staged.md5,
        mime,
        staged.bytes as i64,
    )
    .await?;

    if content.blocked {
        return Err(AppError::ContentBlocked);
    }

    if !content.in_storage {
        let reader: BoxReader = Box::new(staged.open().await?);
        state
            .store
            .put(&staged.sha256, reader, staged.bytes, &content.mime)
            .await?;
        contents::set_in_storage(&state.db, &content.sha256, true).await?;
    }

    let expired_at =
        now + chrono::Duration::seconds(state.config.lifecycle.expiration_secs as i64);
    bins::upsert(&state.db, &bin_id, expired_at).await?;
    bins::touch(&state.db, &bin_id, expired_at).await?;

    // Overwrite semantics: tombstone the live predecessor, keep its update
    // counter running in the fresh row.
    let updates = match files::find_live(&state.db, &bin_id, &filename).await? {
        Some((prior, _)) => {
            files::soft_delete(&state.db, prior.id).await?;
            prior.updates + 1
        }
        None => 0,
    };

    let insert = files::insert(
        &state.db,
        NewFile {
            bin_id: &bin_id,
            filename: &filename,
            sha256: &content.sha256,
            ip: &ip,
            headers: dump_headers(&headers),
            updates,
            upload_duration_ms: started.elapsed().as_millis() as i64,
        },
    )
    .await;
    if let Err(e) = insert {
        if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
            return Err(AppError::Conflict(
                "Another upload to this filename won the race".into(),
            ));
        }
        return Err(e.into());
    }

    let elapsed = started.elapsed().as_secs_f64().max(1e-6);
    let mib_per_sec = (staged.bytes as f64 / (1024.0 * 1024.0)) / elapsed;
    info!(
        bin = %bin_id,
        filename = %filename,
        sha256 = %content.sha256,
        bytes = staged.bytes,
        mib_per_sec = format!("{mib_per_sec:.1}"),
        "File uploaded"
    );
    staged.release();

    let bin = bins::find(&state.db, &bin_id)
        .await?
        .ok_or_else(|| AppError::Internal("bin missing after upsert".into()))?;
    let (file_row, content_row) = files::find_live(&state.db, &bin_id, &filename)
        .await?
        .ok_or_else(|| AppError::Internal("file missing after insert".into()))?;
    let content_row =
        content_row.ok_or_else(|| AppError::Internal("content missing after insert".into()))?;
    let live = files::live_in_bin(&state.db, &bin_id).await?;

    let now = Utc::now();
    let response = UploadedResponse {
        file: hydrate_file(&file_row, &content_row, &bin, now),
        bin: hydrate_bin(&bin, &live, now),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Find an unused synthesised bin id, with a bounded number of attempts.
async fn synthesize_bin_id(state: &AppState) -> Result<String, AppError> {
    for _ in 0..GENERATE_ATTEMPTS {
        let candidate = generate_bin_id();
        if bins::find(&state.db, &candidate).await?.is_none() {
            return Ok(candidate);
        }
    }
    Err(AppError::Internal(
        "could not allocate an unused bin id".into(),
    ))
}

/// Compare client-advertised digests against the digests computed while
/// staging. Runs before any metadata is touched.
fn verify_checksums(headers: &HeaderMap, staged: &StagedUpload) -> Result<(), AppError> {
    if let Some(expected) = headers.get("content-sha256").and_then(|v| v.to_str().ok()) {
        let expected = expected.trim().to_ascii_lowercase();
        if expected != staged.sha256.to_hex() {
            return Err(AppError::ChecksumMismatch(
                "Content-SHA256 does not match the received body".into(),
            ));
        }
    }

    if let Some(expected) = headers.get("content-md5").and_then(|v| v.to_str().ok()) {
        let decoded = BASE64.decode(expected.trim()).map_err(|_| {
            AppError::ChecksumMismatch("Content-MD5 is not valid base64".into())
        })?;
        if hex::encode(decoded) != staged.md5 {
            return Err(AppError::ChecksumMismatch(
                "Content-MD5 does not match the received body".into(),
            ));
        }
    }

    Ok(())
}
