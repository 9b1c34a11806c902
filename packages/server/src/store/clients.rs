use chrono::Utc;
use sea_orm::sea_query::{Expr, ExprTrait, OnConflict};
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set};

use crate::entity::client;

use super::observe;

/// Upsert the client row for a request: first sighting inserts it, every
/// later one bumps the request counter and activity timestamp. Returns the
/// row so the caller can check the ban state.
pub async fn upsert<C: ConnectionTrait>(db: &C, ip: &str) -> Result<client::Model, DbErr> {
    let now = Utc::now();
    let model = client::ActiveModel {
        ip: Set(ip.to_owned()),
        asn: Set(None),
        asn_organization: Set(None),
        network: Set(None),
        country: Set(None),
        city: Set(None),
        continent: Set(None),
        proxy: Set(false),
        requests: Set(1),
        first_active_at: Set(now),
        last_active_at: Set(now),
        banned_at: Set(None),
        banned_by: Set(None),
    };

    let result = observe("client.upsert", async {
        client::Entity::insert(model)
            .on_conflict(
                OnConflict::column(client::Column::Ip)
                    .value(
                        client::Column::Requests,
                        Expr::col((client::Entity, client::Column::Requests)).add(1),
                    )
                    .value(client::Column::LastActiveAt, Expr::value(now))
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await
    })
    .await;

    match result {
        Ok(_) | Err(DbErr::RecordNotInserted) => {}
        Err(e) => return Err(e),
    }

    find(db, ip)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("client {ip} missing after upsert")))
}

pub async fn find<C: ConnectionTrait>(db: &C, ip: &str) -> Result<Option<client::Model>, DbErr> {
    observe("client.find", client::Entity::find_by_id(ip).one(db)).await
}

/// Ban a set of addresses. Returns how many rows were marked.
pub async fn ban<C: ConnectionTrait>(
    db: &C,
    ips: &[String],
    banned_by: &str,
) -> Result<u64, DbErr> {
    if ips.is_empty() {
        return Ok(0);
    }

    let result = observe("client.ban", async {
        client::Entity::update_many()
            .col_expr(client::Column::BannedAt, Expr::value(Some(Utc::now())))
            .col_expr(
                client::Column::BannedBy,
                Expr::value(Some(banned_by.to_owned())),
            )
            .filter(client::Column::Ip.is_in(ips.iter().cloned()))
            .exec(db)
            .await
    })
    .await?;
    Ok(result.rows_affected)
}
