use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "client")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub ip: String,

    // Filled by an external enrichment step when available; requests are
    // accepted either way.
    pub asn: Option<i64>,
    pub asn_organization: Option<String>,
    pub network: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub continent: Option<String>,
    pub proxy: bool,

    pub requests: i64,
    pub first_active_at: DateTimeUtc,
    pub last_active_at: DateTimeUtc,

    /// A banned client is rejected before routing.
    pub banned_at: Option<DateTimeUtc>,
    pub banned_by: Option<String>,
}

impl ActiveModelBehavior for ActiveModel {}
