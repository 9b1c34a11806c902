use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set};

use crate::entity::transaction;

use super::observe;

pub struct RequestRecord {
    pub method: String,
    pub path: String,
    pub ip: String,
    pub status: i32,
    pub headers: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
}

/// Append one request-log row.
pub async fn record<C: ConnectionTrait>(db: &C, rec: RequestRecord) -> Result<(), DbErr> {
    let model = transaction::ActiveModel {
        method: Set(rec.method),
        path: Set(rec.path),
        ip: Set(rec.ip),
        status: Set(rec.status),
        headers: Set(rec.headers),
        started_at: Set(rec.started_at),
        duration_ms: Set(rec.duration_ms),
        ..Default::default()
    };

    observe(
        "transaction.record",
        transaction::Entity::insert(model).exec_without_returning(db),
    )
    .await?;
    Ok(())
}

/// Drop request-log rows older than the retention window. Returns the number
/// of rows removed.
pub async fn trim<C: ConnectionTrait>(db: &C, retention_days: u64) -> Result<u64, DbErr> {
    let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);

    let result = observe("transaction.trim", async {
        transaction::Entity::delete_many()
            .filter(transaction::Column::StartedAt.lt(cutoff))
            .exec(db)
            .await
    })
    .await?;
    Ok(result.rows_affected)
}
