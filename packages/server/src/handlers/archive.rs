use axum::extract::{Path, State};
use axum::http::{HeaderMap, header};
use axum::response::Response;
use axum_extra::extract::CookieJar;
use common::storage::ContentHash;
use tracing::instrument;

use crate::archive::{ArchiveEntry, ArchiveFormat};
use crate::error::{AppError, ErrorBody};
use crate::state::AppState;
use crate::store::{bins, files};

use super::download::{access_gates, find_live_bin};

#[utoipa::path(
    get,
    path = "/archive/{bin}/{format}",
    tag = "Download",
    operation_id = "downloadArchive",
    summary = "Download a bin as an archive",
    description = "Streams all live files of the bin as a tar or zip archive. File contents are \
        piped straight from the object store into the archive writer; nothing is buffered on \
        disk. No HTTP-level compression is applied on this path.",
    params(
        ("bin" = String, Path, description = "Bin id"),
        ("format" = String, Path, description = "Archive format: tar or zip"),
    ),
    responses(
        (status = 200, description = "Archive stream"),
        (status = 400, description = "Unknown archive format", body = ErrorBody),
        (status = 404, description = "No such bin, or no downloadable files", body = ErrorBody),
    ),
)]
#[instrument(skip_all)]
pub async fn download_archive(
    State(state): State<AppState>,
    Path((bin_id, format)): Path<(String, String)>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let format = ArchiveFormat::from_str(&format)
        .ok_or_else(|| AppError::Validation("Archive format must be tar or zip".into()))?;

    let bin = find_live_bin(&state, &bin_id).await?;
    access_gates(&bin, &headers, &jar, &state.config.access)?;

    let live = files::live_in_bin(&state.db, &bin.id).await?;
    let mut entries = Vec::new();
    for (file, content) in &live {
        let Some(content) = content else { continue };
        if !content.in_storage {
            continue;
        }
        let hash = ContentHash::from_hex(&content.sha256)
            .map_err(|e| AppError::Internal(format!("stored hash invalid: {e}")))?;
        entries.push(ArchiveEntry {
            name: file.filename.clone(),
            size: content.bytes.max(0) as u64,
            modified: file.updated_at,
            hash,
        });
    }

    if entries.is_empty() {
        return Err(AppError::NotFound("This bin has no downloadable files".into()));
    }

    for (file, _) in &live {
        files::bump_downloads(&state.db, file.id).await?;
    }
    bins::bump_downloads(&state.db, &bin.id).await?;

    let body = crate::archive::stream(format, state.store.clone(), entries);

    Response::builder()
        .header(header::CONTENT_TYPE, format.content_type())
        .header(
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"{}.{}\"",
                bin.id,
                format.extension()
            ),
        )
        .body(body)
        .map_err(|e| AppError::Internal(format!("failed to build response: {e}")))
}
