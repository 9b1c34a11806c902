use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use tracing::{info, instrument};

use crate::error::{AppError, ErrorBody};
use crate::extractors::admin::verify_basic;
use crate::models::bin::{BinDetailResponse, empty_bin, hydrate_bin};
use crate::models::file::hydrate_file;
use crate::state::AppState;
use crate::store::{bins, clients, files};
use crate::utils::bin_id::validate_bin_id;

use super::download::find_live_bin;

#[utoipa::path(
    get,
    path = "/{bin}",
    tag = "Bins",
    operation_id = "getBin",
    summary = "List a bin",
    description = "Returns the bin and its live files. A `.txt` suffix returns a plain-text \
        list of file URLs instead. Visiting an unused bin id returns an empty skeleton \
        without creating anything.",
    params(("bin" = String, Path, description = "Bin id, optionally with a .txt suffix")),
    responses(
        (status = 200, description = "Bin listing", body = BinDetailResponse),
        (status = 400, description = "Invalid bin id", body = ErrorBody),
        (status = 404, description = "Bin deleted or expired", body = ErrorBody),
    ),
)]
#[instrument(skip_all)]
pub async fn get_bin(
    State(state): State<AppState>,
    Path(bin_param): Path<String>,
) -> Result<Response, AppError> {
    let (bin_id, as_text) = match bin_param.strip_suffix(".txt") {
        Some(stripped) => (stripped.to_string(), true),
        None => (bin_param, false),
    };
    validate_bin_id(&bin_id).map_err(|e| AppError::InvalidBin(e.message().into()))?;

    let now = Utc::now();
    let Some(bin) = bins::find(&state.db, &bin_id).await? else {
        // Addressable but not materialised; only an upload creates the row.
        if as_text {
            return Ok(plain_text(String::new()));
        }
        let response = BinDetailResponse {
            bin: empty_bin(&bin_id, state.config.lifecycle.expiration_secs, now),
            files: vec![],
        };
        return Ok(Json(response).into_response());
    };

    if bin.deleted_at.is_some() || bin.expired_at <= now {
        return Err(AppError::NotFound("Bin not found".into()));
    }

    let live = files::live_in_bin(&state.db, &bin.id).await?;

    if as_text {
        let base = state.config.server.base_url.trim_end_matches('/').to_owned();
        let listing: String = live
            .iter()
            .map(|(file, _)| format!("{base}/{}/{}\n", bin.id, file.filename))
            .collect();
        return Ok(plain_text(listing));
    }

    let file_dtos = live
        .iter()
        .filter_map(|(file, content)| {
            content
                .as_ref()
                .map(|content| hydrate_file(file, content, &bin, now))
        })
        .collect();

    let response = BinDetailResponse {
        bin: hydrate_bin(&bin, &live, now),
        files: file_dtos,
    };
    Ok(Json(response).into_response())
}

fn plain_text(body: String) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}

#[utoipa::path(
    put,
    path = "/{bin}",
    tag = "Bins",
    operation_id = "lockBin",
    summary = "Lock a bin",
    description = "Makes the bin read-only. Locking is idempotent and cannot be undone by \
        clients.",
    params(("bin" = String, Path, description = "Bin id")),
    responses(
        (status = 200, description = "Bin locked"),
        (status = 404, description = "No such bin", body = ErrorBody),
    ),
)]
#[instrument(skip_all)]
pub async fn lock_bin(
    State(state): State<AppState>,
    Path(bin_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let bin = find_live_bin(&state, &bin_id).await?;
    bins::set_readonly(&state.db, &bin.id).await?;
    info!(bin = %bin.id, "Bin locked");
    Ok(Json(serde_json::json!({ "message": "Bin locked" })))
}

#[utoipa::path(
    delete,
    path = "/{bin}",
    tag = "Bins",
    operation_id = "deleteBin",
    summary = "Delete a bin",
    description = "Tombstones the bin. Its files stop being served immediately and their \
        contents are reclaimed by the background reaper.",
    params(("bin" = String, Path, description = "Bin id")),
    responses(
        (status = 200, description = "Bin deleted"),
        (status = 404, description = "No such bin", body = ErrorBody),
    ),
)]
#[instrument(skip_all)]
pub async fn delete_bin(
    State(state): State<AppState>,
    Path(bin_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let bin = find_live_bin(&state, &bin_id).await?;
    bins::set_deleted(&state.db, &bin.id).await?;
    info!(bin = %bin.id, "Bin deleted");
    Ok(Json(serde_json::json!({ "message": "Bin deleted" })))
}

/// Fallback for the non-standard `BAN` verb on `/{bin}`: ban every address
/// that uploaded into the bin, then delete it. Requires admin credentials.
#[instrument(skip_all)]
pub async fn ban_bin(
    State(state): State<AppState>,
    method: Method,
    Path(bin_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if method.as_str() != "BAN" {
        return Ok(StatusCode::METHOD_NOT_ALLOWED.into_response());
    }

    let admin = verify_basic(&headers, &state.config.admin).await?;

    validate_bin_id(&bin_id).map_err(|e| AppError::InvalidBin(e.message().into()))?;
    let bin = bins::find(&state.db, &bin_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Bin not found".into()))?;

    let ips = files::uploader_ips(&state.db, &bin.id).await?;
    let banned = clients::ban(&state.db, &ips, &admin).await?;
    bins::set_deleted(&state.db, &bin.id).await?;

    info!(bin = %bin.id, clients_banned = banned, "Bin banned");
    Ok(Json(serde_json::json!({
        "message": "Bin banned",
        "clients_banned": banned,
    }))
    .into_response())
}
