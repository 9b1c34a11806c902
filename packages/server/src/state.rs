use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use common::storage::ObjectStore;
use common::workspace::WorkspaceManager;
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub store: Arc<dyn ObjectStore>,
    pub workspace: Arc<WorkspaceManager>,
    pub config: Arc<AppConfig>,
    /// Stored-bytes gauge, refreshed by a background ticker and read on every
    /// upload that must honour the global storage ceiling.
    pub stored_bytes: Arc<AtomicU64>,
}
