use std::time::Duration;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::config::AdminConfig;
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated administrator, from `Authorization: Basic` credentials.
///
/// Add this as a handler parameter to require admin access. Failed attempts
/// sleep three seconds before rejecting, which caps brute-force throughput.
pub struct AdminUser {
    pub username: String,
}

/// Verify Basic credentials against the configured admin account. Empty
/// configured credentials disable the admin surface entirely.
pub async fn verify_basic(headers: &HeaderMap, cfg: &AdminConfig) -> Result<String, AppError> {
    let presented = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .and_then(|v| BASE64.decode(v).ok())
        .and_then(|v| String::from_utf8(v).ok());

    let ok = match &presented {
        Some(decoded) => match decoded.split_once(':') {
            Some((user, pass)) => {
                !cfg.username.is_empty()
                    & constant_time_eq(user.as_bytes(), cfg.username.as_bytes())
                    & constant_time_eq(pass.as_bytes(), cfg.password.as_bytes())
            }
            None => false,
        },
        None => false,
    };

    if !ok {
        tokio::time::sleep(Duration::from_secs(3)).await;
        return Err(AppError::Unauthorized);
    }

    Ok(cfg.username.clone())
}

/// Compare secrets without an early exit on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let mut diff = a.len() ^ b.len();
    for i in 0..a.len().min(b.len()) {
        diff |= (a[i] ^ b[i]) as usize;
    }
    diff == 0
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let username = verify_basic(&parts.headers, &state.config.admin).await?;
        Ok(AdminUser { username })
    }
}
