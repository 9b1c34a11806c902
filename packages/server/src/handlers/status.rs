use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use common::storage::ContentHash;
use tracing::instrument;

use crate::error::AppError;
use crate::state::AppState;
use crate::utils::fmt::bytes_readable;

#[utoipa::path(
    get,
    path = "/filebin-status",
    tag = "Status",
    operation_id = "filebinStatus",
    summary = "Liveness probe",
    description = "Confirms the database and the object store are reachable.",
    responses(
        (status = 200, description = "Both backends reachable"),
        (status = 503, description = "A backend is unreachable"),
    ),
)]
#[instrument(skip_all)]
pub async fn filebin_status(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let database_ok = state.db.ping().await.is_ok();

    // Probing an arbitrary key exercises connectivity; absence is fine.
    let probe = ContentHash::compute(b"filebin-status-probe");
    let storage_ok = state.store.head(&probe).await.is_ok();

    let status = if database_ok && storage_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    Ok((
        status,
        Json(serde_json::json!({
            "database": if database_ok { "ok" } else { "unreachable" },
            "storage": if storage_ok { "ok" } else { "unreachable" },
        })),
    ))
}

#[utoipa::path(
    get,
    path = "/storage-status",
    tag = "Status",
    operation_id = "storageStatus",
    summary = "Storage ceiling probe",
    description = "Reports current stored bytes; answers 507 once the configured global \
        ceiling is exceeded.",
    responses(
        (status = 200, description = "Below the ceiling, or no ceiling configured"),
        (status = 507, description = "Ceiling exceeded"),
    ),
)]
#[instrument(skip_all)]
pub async fn storage_status(State(state): State<AppState>) -> impl IntoResponse {
    let stored = state.stored_bytes.load(Ordering::Relaxed);
    let limit = state.config.limit.storage_bytes;

    let status = if limit > 0 && stored > limit {
        StatusCode::INSUFFICIENT_STORAGE
    } else {
        StatusCode::OK
    };

    (
        status,
        Json(serde_json::json!({
            "stored_bytes": stored,
            "stored_readable": bytes_readable(stored),
            "limit_bytes": limit,
        })),
    )
}
