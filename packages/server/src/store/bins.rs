use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, ExprTrait, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entity::bin;

use super::observe;

/// Lazily materialise a bin on first upload: insert with `ON CONFLICT DO
/// NOTHING`. Returns whether a new row was created.
pub async fn upsert<C: ConnectionTrait>(
    db: &C,
    id: &str,
    expired_at: DateTime<Utc>,
) -> Result<bool, DbErr> {
    let now = Utc::now();
    let model = bin::ActiveModel {
        id: Set(id.to_owned()),
        readonly: Set(false),
        downloads: Set(0),
        updates: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        expired_at: Set(expired_at),
        approved_at: Set(None),
        deleted_at: Set(None),
    };

    let result = observe("bin.upsert", async {
        bin::Entity::insert(model)
            .on_conflict(OnConflict::column(bin::Column::Id).do_nothing().to_owned())
            .exec_without_returning(db)
            .await
    })
    .await;

    match result {
        Ok(rows) => Ok(rows > 0),
        Err(DbErr::RecordNotInserted) => Ok(false),
        Err(e) => Err(e),
    }
}

pub async fn find<C: ConnectionTrait>(db: &C, id: &str) -> Result<Option<bin::Model>, DbErr> {
    observe("bin.find", bin::Entity::find_by_id(id).one(db)).await
}

/// Register an accepted upload: extend the expiry, bump `updated_at` and the
/// update counter.
pub async fn touch<C: ConnectionTrait>(
    db: &C,
    id: &str,
    expired_at: DateTime<Utc>,
) -> Result<(), DbErr> {
    observe("bin.touch", async {
        bin::Entity::update_many()
            .col_expr(bin::Column::UpdatedAt, Expr::value(Utc::now()))
            .col_expr(bin::Column::ExpiredAt, Expr::value(expired_at))
            .col_expr(
                bin::Column::Updates,
                Expr::col((bin::Entity, bin::Column::Updates)).add(1),
            )
            .filter(bin::Column::Id.eq(id))
            .exec(db)
            .await
    })
    .await?;
    Ok(())
}

pub async fn bump_downloads<C: ConnectionTrait>(db: &C, id: &str) -> Result<(), DbErr> {
    observe("bin.bump_downloads", async {
        bin::Entity::update_many()
            .col_expr(
                bin::Column::Downloads,
                Expr::col((bin::Entity, bin::Column::Downloads)).add(1),
            )
            .filter(bin::Column::Id.eq(id))
            .exec(db)
            .await
    })
    .await?;
    Ok(())
}

pub async fn set_readonly<C: ConnectionTrait>(db: &C, id: &str) -> Result<(), DbErr> {
    observe("bin.set_readonly", async {
        bin::Entity::update_many()
            .col_expr(bin::Column::Readonly, Expr::value(true))
            .col_expr(bin::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(bin::Column::Id.eq(id))
            .exec(db)
            .await
    })
    .await?;
    Ok(())
}

/// Tombstone the bin. Its files fall out of the live set transitively.
pub async fn set_deleted<C: ConnectionTrait>(db: &C, id: &str) -> Result<(), DbErr> {
    observe("bin.set_deleted", async {
        bin::Entity::update_many()
            .col_expr(bin::Column::DeletedAt, Expr::value(Some(Utc::now())))
            .filter(bin::Column::Id.eq(id))
            .exec(db)
            .await
    })
    .await?;
    Ok(())
}

pub async fn approve<C: ConnectionTrait>(db: &C, id: &str) -> Result<(), DbErr> {
    observe("bin.approve", async {
        bin::Entity::update_many()
            .col_expr(bin::Column::ApprovedAt, Expr::value(Some(Utc::now())))
            .filter(bin::Column::Id.eq(id))
            .filter(bin::Column::ApprovedAt.is_null())
            .exec(db)
            .await
    })
    .await?;
    Ok(())
}

/// Bins past their expiry that have not been tombstoned yet.
pub async fn pending_delete<C: ConnectionTrait>(db: &C) -> Result<Vec<bin::Model>, DbErr> {
    observe(
        "bin.pending_delete",
        bin::Entity::find()
            .filter(bin::Column::ExpiredAt.lt(Utc::now()))
            .filter(bin::Column::DeletedAt.is_null())
            .order_by_asc(bin::Column::ExpiredAt)
            .all(db),
    )
    .await
}
