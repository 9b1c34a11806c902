use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "file_content")]
pub struct Model {
    /// Lowercase hex SHA-256; the deduplication key and the object store key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub sha256: String,

    /// Lowercase hex MD5, computed alongside the SHA-256 during staging.
    pub md5: String,

    pub mime: String,

    pub bytes: i64,

    /// Whether the object is (believed to be) present in the object store.
    /// Drives the upload decision in the ingress pipeline; flipped off by the
    /// content reaper after blob deletion.
    pub in_storage: bool,

    /// Administratively disallowed content. The row outlives its blob so the
    /// flag keeps matching re-uploads.
    pub blocked: bool,

    pub created_at: DateTimeUtc,

    /// Bumped on every dedup hit. An observation hint, not a truth source;
    /// the authoritative reference count is the live file count.
    pub last_referenced_at: DateTimeUtc,

    #[sea_orm(has_many)]
    pub files: HasMany<super::file::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
