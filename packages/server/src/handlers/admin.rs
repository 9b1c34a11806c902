use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::Json;
use common::storage::ContentHash;
use tracing::{info, instrument};

use crate::error::{AppError, ErrorBody};
use crate::extractors::admin::AdminUser;
use crate::state::AppState;
use crate::store::{bins, clients, contents, files};

#[utoipa::path(
    post,
    path = "/admin/file/{sha256}/block",
    tag = "Admin",
    operation_id = "blockContent",
    summary = "Block content by hash",
    description = "Flags the content as disallowed and tombstones every file referencing it. \
        Future uploads of the same bytes are rejected; the stored object is reclaimed by the \
        reaper.",
    params(("sha256" = String, Path, description = "Content hash, lowercase hex")),
    responses(
        (status = 303, description = "Content blocked; redirect back to the admin page"),
        (status = 401, description = "Missing or invalid admin credentials", body = ErrorBody),
        (status = 404, description = "No such content", body = ErrorBody),
    ),
    security(("basic" = [])),
)]
#[instrument(skip_all)]
pub async fn block_content(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(sha256): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let hash = ContentHash::from_hex(sha256.trim())
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let blocked = contents::set_blocked(&state.db, &hash.to_hex()).await?;
    if !blocked {
        return Err(AppError::NotFound("Content not found".into()));
    }
    let tombstoned = files::soft_delete_by_sha256(&state.db, &hash.to_hex()).await?;

    info!(
        admin = %admin.username,
        sha256 = %hash,
        files_tombstoned = tombstoned,
        "Content blocked"
    );
    Ok((StatusCode::SEE_OTHER, [(header::LOCATION, "/admin")]))
}

#[utoipa::path(
    post,
    path = "/admin/bins/{bin}/approve",
    tag = "Admin",
    operation_id = "approveBin",
    summary = "Approve a bin",
    description = "Marks the bin as approved. Only meaningful when manual approval gates \
        downloads.",
    params(("bin" = String, Path, description = "Bin id")),
    responses(
        (status = 200, description = "Bin approved"),
        (status = 401, description = "Missing or invalid admin credentials", body = ErrorBody),
        (status = 404, description = "No such bin", body = ErrorBody),
    ),
    security(("basic" = [])),
)]
#[instrument(skip_all)]
pub async fn approve_bin(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(bin_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    bins::find(&state.db, &bin_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Bin not found".into()))?;
    bins::approve(&state.db, &bin_id).await?;

    info!(admin = %admin.username, bin = %bin_id, "Bin approved");
    Ok(Json(serde_json::json!({ "message": "Bin approved" })))
}

#[utoipa::path(
    post,
    path = "/admin/clients/{ip}/ban",
    tag = "Admin",
    operation_id = "banClient",
    summary = "Ban a client address",
    description = "Bans a single source address. Banned clients are rejected before routing.",
    params(("ip" = String, Path, description = "Client IP address")),
    responses(
        (status = 200, description = "Client banned"),
        (status = 401, description = "Missing or invalid admin credentials", body = ErrorBody),
        (status = 404, description = "Address never seen", body = ErrorBody),
    ),
    security(("basic" = [])),
)]
#[instrument(skip_all)]
pub async fn ban_client(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(ip): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let banned = clients::ban(&state.db, &[ip.clone()], &admin.username).await?;
    if banned == 0 {
        return Err(AppError::NotFound("Client not found".into()));
    }

    info!(admin = %admin.username, ip = %ip, "Client banned");
    Ok(Json(serde_json::json!({ "message": "Client banned" })))
}
