use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "file")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub bin_id: String,

    #[sea_orm(belongs_to, from = "bin_id", to = "id")]
    pub bin: BelongsTo<super::bin::Entity>,

    /// Sanitised name, unique among live files of the bin.
    pub filename: String,

    pub sha256: String,

    #[sea_orm(belongs_to, from = "sha256", to = "sha256")]
    pub content: BelongsTo<super::content::Entity>,

    pub downloads: i64,

    /// How many times this `(bin, filename)` slot has been overwritten;
    /// carried over from the soft-deleted predecessor.
    pub updates: i64,

    /// Uploader address, kept for the ban cascade.
    pub ip: String,

    /// Dump of the upload request headers, kept for forensics.
    pub headers: String,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,

    /// Tombstone; live means `deleted_at IS NULL` and the bin is live too.
    pub deleted_at: Option<DateTimeUtc>,

    pub upload_duration_ms: i64,
}

impl ActiveModelBehavior for ActiveModel {}
