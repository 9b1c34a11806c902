use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Request log row, written for every request and trimmed by the reaper.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub method: String,
    pub path: String,
    pub ip: String,
    pub status: i32,

    /// Request header dump.
    pub headers: String,

    pub started_at: DateTimeUtc,
    pub duration_ms: i64,
}

impl ActiveModelBehavior for ActiveModel {}
