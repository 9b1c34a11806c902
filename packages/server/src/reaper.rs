//! The background loop that closes the gap between metadata lifecycle and
//! object store state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use common::storage::{ContentHash, ObjectStore};
use common::workspace::WorkspaceManager;
use sea_orm::DatabaseConnection;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::LifecycleConfig;
use crate::store::{bins, contents, files, transactions};

pub struct Reaper {
    db: DatabaseConnection,
    store: Arc<dyn ObjectStore>,
    workspace: Arc<WorkspaceManager>,
    interval: Duration,
    throttle: Duration,
    log_retention_days: u64,
    stale_age: Duration,
}

impl Reaper {
    pub fn new(
        db: DatabaseConnection,
        store: Arc<dyn ObjectStore>,
        workspace: Arc<WorkspaceManager>,
        lifecycle: &LifecycleConfig,
        stale_age_hours: u64,
    ) -> Self {
        Self {
            db,
            store,
            workspace,
            interval: Duration::from_secs(lifecycle.lurker_interval_secs),
            throttle: Duration::from_millis(lifecycle.lurker_throttle_ms),
            log_retention_days: lifecycle.log_retention_days,
            stale_age: Duration::from_secs(stale_age_hours * 3600),
        }
    }

    /// Run until the shutdown signal fires. One tick runs the four passes in
    /// order; a failing or panicking pass is logged and the loop continues.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(interval_secs = self.interval.as_secs(), "Reaper started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Reaper stopping");
                    return;
                }
                _ = ticker.tick() => {}
            }
            self.tick().await;
        }
    }

    /// One full tick: tombstone expired bins, reclaim unreferenced objects,
    /// trim the request log, clean stale scratch files. Each pass runs in its
    /// own task so a panic in one cannot take the loop down.
    pub async fn tick(&self) {
        let db = self.db.clone();
        run_pass("bins", tokio::spawn(async move { reap_bins(db).await })).await;

        let db = self.db.clone();
        let store = self.store.clone();
        let throttle = self.throttle;
        run_pass(
            "contents",
            tokio::spawn(async move { reap_contents(db, store, throttle).await }),
        )
        .await;

        let db = self.db.clone();
        let retention = self.log_retention_days;
        run_pass(
            "transactions",
            tokio::spawn(async move { trim_transactions(db, retention).await }),
        )
        .await;

        let workspace = self.workspace.clone();
        let stale_age = self.stale_age;
        run_pass(
            "workspace",
            tokio::spawn(async move { clean_workspace(workspace, stale_age).await }),
        )
        .await;
    }
}

async fn run_pass(name: &'static str, handle: JoinHandle<anyhow::Result<()>>) {
    match handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(pass = name, error = %e, "Reaper pass failed"),
        Err(e) => error!(pass = name, error = %e, "Reaper pass panicked"),
    }
}

async fn reap_bins(db: DatabaseConnection) -> anyhow::Result<()> {
    let pending = bins::pending_delete(&db).await?;
    for bin in pending {
        bins::set_deleted(&db, &bin.id).await?;
        info!(bin = %bin.id, "Tombstoned expired bin");
    }
    Ok(())
}

async fn reap_contents(
    db: DatabaseConnection,
    store: Arc<dyn ObjectStore>,
    throttle: Duration,
) -> anyhow::Result<()> {
    let pending = contents::pending_delete(&db).await?;
    for content in pending {
        // Re-check against the current state: an upload may have referenced
        // this hash since the candidate scan.
        let live = files::count_live_by_sha256(&db, &content.sha256).await?;
        if live > 0 {
            continue;
        }

        let hash = match ContentHash::from_hex(&content.sha256) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(sha256 = %content.sha256, error = %e, "Skipping malformed content row");
                continue;
            }
        };

        if let Err(e) = store.delete(&hash).await {
            warn!(sha256 = %content.sha256, error = %e, "Object delete failed, will retry next tick");
            continue;
        }
        contents::set_in_storage(&db, &content.sha256, false).await?;
        info!(sha256 = %content.sha256, bytes = content.bytes, "Reclaimed unreferenced object");

        tokio::time::sleep(throttle).await;
    }
    Ok(())
}

async fn trim_transactions(db: DatabaseConnection, retention_days: u64) -> anyhow::Result<()> {
    let removed = transactions::trim(&db, retention_days).await?;
    if removed > 0 {
        info!(removed, "Trimmed request log");
    }
    Ok(())
}

async fn clean_workspace(
    workspace: Arc<WorkspaceManager>,
    stale_age: Duration,
) -> anyhow::Result<()> {
    workspace.clean_stale(stale_age).await?;
    Ok(())
}

/// Refresh the stored-bytes gauge once a minute. Uploads read it on the
/// storage-ceiling check instead of re-aggregating per request.
pub async fn run_storage_gauge(
    db: DatabaseConnection,
    gauge: Arc<AtomicU64>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(60));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = ticker.tick() => {}
        }
        match contents::total_stored_bytes(&db).await {
            Ok(total) => gauge.store(total, Ordering::Relaxed),
            Err(e) => warn!(error = %e, "Storage gauge refresh failed"),
        }
    }
}
