use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use tracing::warn;

use crate::error::AppError;
use crate::extractors::source::source_ip;
use crate::state::AppState;
use crate::store::{clients, transactions};

/// Upsert the client row for every request and reject banned addresses
/// before any routing logic runs.
pub async fn client_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);

    let Some(ip) = source_ip(request.headers(), peer) else {
        return AppError::Internal("source address unavailable".into()).into_response();
    };

    match clients::upsert(&state.db, &ip).await {
        Ok(client) if client.banned_at.is_some() => AppError::Banned.into_response(),
        Ok(_) => next.run(request).await,
        Err(e) => AppError::from(e).into_response(),
    }
}

/// Record one request-log row per request; the reaper trims them by age.
pub async fn transaction_log(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let started_at = Utc::now();
    let started = Instant::now();

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let ip = source_ip(request.headers(), peer).unwrap_or_default();
    let headers = dump_headers(request.headers());

    let response = next.run(request).await;

    let record = transactions::RequestRecord {
        method,
        path,
        ip,
        status: response.status().as_u16() as i32,
        headers,
        started_at,
        duration_ms: started.elapsed().as_millis() as i64,
    };
    if let Err(e) = transactions::record(&state.db, record).await {
        warn!(error = %e, "Failed to record request log row");
    }

    response
}

/// Render request headers one per line, skipping credentials.
pub fn dump_headers(headers: &HeaderMap) -> String {
    let mut out = String::new();
    for (name, value) in headers {
        if name == "authorization" || name == "cookie" {
            continue;
        }
        out.push_str(name.as_str());
        out.push_str(": ");
        out.push_str(value.to_str().unwrap_or("<binary>"));
        out.push('\n');
    }
    out
}
