use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Duration;

use common::config::StorageBackend;
use common::storage::ObjectStore;
use common::storage::filesystem::FilesystemObjectStore;
use common::storage::s3::S3ObjectStore;
use common::workspace::WorkspaceManager;
use tokio::sync::watch;
use tracing::{Level, info, warn};

use server::config::AppConfig;
use server::reaper::{Reaper, run_storage_gauge};
use server::state::AppState;
use server::store::contents;
use server::{build_router, database};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = AppConfig::load()?;

    let db = database::init_db(&config.database.url).await?;

    let store: Arc<dyn ObjectStore> = match config.storage.backend {
        StorageBackend::S3 => Arc::new(S3ObjectStore::connect(&config.storage.s3).await?),
        StorageBackend::Filesystem => Arc::new(
            FilesystemObjectStore::new(config.storage.filesystem.root.clone()).await?,
        ),
    };

    let workspace = Arc::new(WorkspaceManager::new(&config.workspace).await?);
    let stale_age = Duration::from_secs(config.workspace.stale_age_hours * 3600);
    if let Err(e) = workspace.clean_stale(stale_age).await {
        warn!(error = %e, "Startup scratch cleanup failed");
    }

    let stored_bytes = Arc::new(AtomicU64::new(
        contents::total_stored_bytes(&db).await.unwrap_or(0),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reaper = Arc::new(Reaper::new(
        db.clone(),
        store.clone(),
        workspace.clone(),
        &config.lifecycle,
        config.workspace.stale_age_hours,
    ));
    tokio::spawn(reaper.run(shutdown_rx.clone()));
    tokio::spawn(run_storage_gauge(
        db.clone(),
        stored_bytes.clone(),
        shutdown_rx,
    ));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let state = AppState {
        db,
        store,
        workspace,
        config: Arc::new(config),
        stored_bytes,
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(true);
    })
    .await?;

    Ok(())
}
