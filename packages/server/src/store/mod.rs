//! Typed metadata operations. This layer owns every query; handlers and the
//! reaper never compose their own.

pub mod bins;
pub mod clients;
pub mod contents;
pub mod files;
pub mod transactions;

use std::time::Instant;

use tracing::debug;

/// Run one statement-level operation and log its wall time.
pub(crate) async fn observe<T, F>(op: &'static str, fut: F) -> T
where
    F: Future<Output = T>,
{
    let started = Instant::now();
    let out = fut.await;
    debug!(op, elapsed_ms = started.elapsed().as_millis() as u64, "query");
    out
}
