use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bin")]
pub struct Model {
    /// User-chosen identifier; the public namespace of its files.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Locked bins accept no further uploads or file deletes.
    pub readonly: bool,

    pub downloads: i64,
    pub updates: i64,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,

    /// The bin stops serving and becomes reapable past this instant. Extended
    /// on every accepted upload.
    pub expired_at: DateTimeUtc,

    /// Set once an admin approves the bin (only used with manual approval).
    pub approved_at: Option<DateTimeUtc>,

    /// Tombstone; set by user delete, admin action, or the bin reaper.
    pub deleted_at: Option<DateTimeUtc>,

    #[sea_orm(has_many)]
    pub files: HasMany<super::file::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
