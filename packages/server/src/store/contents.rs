use chrono::Utc;
use sea_orm::sea_query::{Expr, ExprTrait, OnConflict, Query};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect, Set,
};

use crate::entity::{bin, content, file};

use super::observe;

/// The dedup primitive: atomically insert a fresh content row (with
/// `in_storage = false`) or bump `last_referenced_at` on the existing one,
/// then read the row back. The stored `in_storage` value survives a dedup
/// hit; it is what tells the caller whether the object must be pushed.
pub async fn insert_or_touch<C: ConnectionTrait>(
    db: &C,
    sha256: &str,
    md5: &str,
    mime: &str,
    bytes: i64,
) -> Result<content::Model, DbErr> {
    let now = Utc::now();
    let model = content::ActiveModel {
        sha256: Set(sha256.to_owned()),
        md5: Set(md5.to_owned()),
        mime: Set(mime.to_owned()),
        bytes: Set(bytes),
        in_storage: Set(false),
        blocked: Set(false),
        created_at: Set(now),
        last_referenced_at: Set(now),
    };

    let result = observe("content.insert_or_touch", async {
        content::Entity::insert(model)
            .on_conflict(
                OnConflict::column(content::Column::Sha256)
                    .update_column(content::Column::LastReferencedAt)
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

    find(db, sha256)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("file_content {sha256} missing after upsert")))
}

pub async fn find<C: ConnectionTrait>(
    db: &C,
    sha256: &str,
) -> Result<Option<content::Model>, DbErr> {
    observe("content.find", content::Entity::find_by_id(sha256).one(db)).await
}

pub async fn set_in_storage<C: ConnectionTrait>(
    db: &C,
    sha256: &str,
    in_storage: bool,
) -> Result<(), DbErr> {
    observe("content.set_in_storage", async {
        content::Entity::update_many()
            .col_expr(content::Column::InStorage, Expr::value(in_storage))
            .filter(content::Column::Sha256.eq(sha256))
            .exec(db)
            .await
    })
    .await?;
    Ok(())
}

/// Flag content as administratively disallowed. The row keeps the flag even
/// after its object is reclaimed, so matching re-uploads stay rejected.
pub async fn set_blocked<C: ConnectionTrait>(db: &C, sha256: &str) -> Result<bool, DbErr> {
    let result = observe("content.set_blocked", async {
        content::Entity::update_many()
            .col_expr(content::Column::Blocked, Expr::value(true))
            .filter(content::Column::Sha256.eq(sha256))
            .exec(db)
            .await
    })
    .await?;
    Ok(result.rows_affected > 0)
}

/// Contents whose object is still in storage but which no live file
/// references any more. Live means: file not deleted and its bin not deleted.
pub async fn pending_delete<C: ConnectionTrait>(db: &C) -> Result<Vec<content::Model>, DbErr> {
    let live_refs = Query::select()
        .column((file::Entity, file::Column::Sha256))
        .from(file::Entity)
        .inner_join(
            bin::Entity,
            Expr::col((bin::Entity, bin::Column::Id)).equals((file::Entity, file::Column::BinId)),
        )
        .and_where(Expr::col((file::Entity, file::Column::DeletedAt)).is_null())
        .and_where(Expr::col((bin::Entity, bin::Column::DeletedAt)).is_null())
        .to_owned();

    observe(
        "content.pending_delete",
        content::Entity::find()
            .filter(content::Column::InStorage.eq(true))
            .filter(content::Column::Sha256.not_in_subquery(live_refs))
            .all(db),
    )
    .await
}

/// Total bytes currently held in the object store, per the metadata view.
/// Feeds the storage-ceiling gauge.
pub async fn total_stored_bytes<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
    let total: Option<i64> = observe(
        "content.total_stored_bytes",
        content::Entity::find()
            .select_only()
            .column_as(Expr::cust("COALESCE(SUM(bytes), 0)::BIGINT"), "total")
            .filter(content::Column::InStorage.eq(true))
            .into_tuple()
            .one(db),
    )
    .await?;

    Ok(Ord::max(total.unwrap_or(0), 0) as u64)
}
