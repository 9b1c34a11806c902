use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;

use crate::error::AppError;

/// Source address of the request.
///
/// Prefers the first `X-Forwarded-For` hop (the service runs behind a
/// reverse proxy in production) and falls back to the socket peer.
pub struct SourceIp(pub String);

/// Resolve the source address from headers and the connection peer.
pub fn source_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
    {
        let first = value.split(',').next().unwrap_or("").trim();
        if !first.is_empty() {
            return Some(first.to_string());
        }
    }

    peer.map(|addr| addr.ip().to_string())
}

impl<S> FromRequestParts<S> for SourceIp
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);

        source_ip(&parts.headers, peer)
            .map(SourceIp)
            .ok_or_else(|| AppError::Internal("source address unavailable".into()))
    }
}
