use std::time::Duration;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use tracing::info;

pub async fn init_db(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(db_url.to_owned());

    // Pool sized for concurrent uploads.
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .max_lifetime(Duration::from_secs(8))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;
    db.get_schema_registry("server::entity::*")
        .sync(&db)
        .await?;

    ensure_indexes(&db).await?;

    Ok(db)
}

/// Create the indexes schema-sync cannot express.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Filename uniqueness holds among live files only; tombstoned rows of the
    // same (bin, filename) slot accumulate below.
    db.execute_unprepared(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_file_bin_filename_live \
         ON \"file\" (bin_id, filename) WHERE deleted_at IS NULL",
    )
    .await?;
    info!("Ensured index idx_file_bin_filename_live exists");

    // Reference counting scans files by content hash.
    let result = db
        .execute_unprepared("CREATE INDEX IF NOT EXISTS idx_file_sha256 ON \"file\" (sha256)")
        .await;
    if let Err(e) = result {
        tracing::warn!("Failed to create index idx_file_sha256: {e}");
    }

    // The bin reaper scans for expired, not-yet-tombstoned bins.
    let result = db
        .execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_bin_expired_live \
             ON bin (expired_at) WHERE deleted_at IS NULL",
        )
        .await;
    if let Err(e) = result {
        tracing::warn!("Failed to create index idx_bin_expired_live: {e}");
    }

    // The request-log trim deletes by age.
    let result = db
        .execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_transaction_started \
             ON \"transaction\" (started_at)",
        )
        .await;
    if let Err(e) = result {
        tracing::warn!("Failed to create index idx_transaction_started: {e}");
    }

    Ok(())
}
