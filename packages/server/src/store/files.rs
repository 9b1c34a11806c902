use chrono::Utc;
use sea_orm::sea_query::{Expr, ExprTrait, Query};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use crate::entity::{bin, content, file};

use super::observe;

/// Everything the ingress pipeline knows about a file at commit time.
pub struct NewFile<'a> {
    pub bin_id: &'a str,
    pub filename: &'a str,
    pub sha256: &'a str,
    pub ip: &'a str,
    pub headers: String,
    pub updates: i64,
    pub upload_duration_ms: i64,
}

/// Insert a file row. A uniqueness violation on the live `(bin_id, filename)`
/// index surfaces as `DbErr`; the caller maps it to a conflict.
pub async fn insert<C: ConnectionTrait>(db: &C, new: NewFile<'_>) -> Result<i64, DbErr> {
    let now = Utc::now();
    let model = file::ActiveModel {
        bin_id: Set(new.bin_id.to_owned()),
        filename: Set(new.filename.to_owned()),
        sha256: Set(new.sha256.to_owned()),
        downloads: Set(0),
        updates: Set(new.updates),
        ip: Set(new.ip.to_owned()),
        headers: Set(new.headers),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
        upload_duration_ms: Set(new.upload_duration_ms),
        ..Default::default()
    };

    let result = observe("file.insert", file::Entity::insert(model).exec(db)).await?;
    Ok(result.last_insert_id)
}

/// The live file under `(bin, filename)`, with its content row.
pub async fn find_live<C: ConnectionTrait>(
    db: &C,
    bin_id: &str,
    filename: &str,
) -> Result<Option<(file::Model, Option<content::Model>)>, DbErr> {
    observe(
        "file.find_live",
        file::Entity::find()
            .filter(file::Column::BinId.eq(bin_id))
            .filter(file::Column::Filename.eq(filename))
            .filter(file::Column::DeletedAt.is_null())
            .find_also_related(content::Entity)
            .one(db),
    )
    .await
}

/// All live files of a bin with their content rows, ordered by filename.
pub async fn live_in_bin<C: ConnectionTrait>(
    db: &C,
    bin_id: &str,
) -> Result<Vec<(file::Model, Option<content::Model>)>, DbErr> {
    observe(
        "file.live_in_bin",
        file::Entity::find()
            .filter(file::Column::BinId.eq(bin_id))
            .filter(file::Column::DeletedAt.is_null())
            .order_by_asc(file::Column::Filename)
            .find_also_related(content::Entity)
            .all(db),
    )
    .await
}

pub async fn soft_delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<(), DbErr> {
    observe("file.soft_delete", async {
        file::Entity::update_many()
            .col_expr(file::Column::DeletedAt, Expr::value(Some(Utc::now())))
            .filter(file::Column::Id.eq(id))
            .exec(db)
            .await
    })
    .await?;
    Ok(())
}

/// Soft-delete every live file referencing a content hash (admin block).
/// Returns the number of tombstoned rows.
pub async fn soft_delete_by_sha256<C: ConnectionTrait>(db: &C, sha256: &str) -> Result<u64, DbErr> {
    let result = observe("file.soft_delete_by_sha256", async {
        file::Entity::update_many()
            .col_expr(file::Column::DeletedAt, Expr::value(Some(Utc::now())))
            .filter(file::Column::Sha256.eq(sha256))
            .filter(file::Column::DeletedAt.is_null())
            .exec(db)
            .await
    })
    .await?;
    Ok(result.rows_affected)
}

/// Live references to a content hash in non-deleted, non-expired bins. The
/// reaper re-checks this count before deleting the object.
pub async fn count_live_by_sha256<C: ConnectionTrait>(db: &C, sha256: &str) -> Result<u64, DbErr> {
    let live_bins = Query::select()
        .column(bin::Column::Id)
        .from(bin::Entity)
        .and_where(Expr::col(bin::Column::DeletedAt).is_null())
        .and_where(Expr::col(bin::Column::ExpiredAt).gt(Utc::now()))
        .to_owned();

    observe(
        "file.count_by_sha256",
        file::Entity::find()
            .filter(file::Column::Sha256.eq(sha256))
            .filter(file::Column::DeletedAt.is_null())
            .filter(file::Column::BinId.in_subquery(live_bins))
            .count(db),
    )
    .await
}

pub async fn bump_downloads<C: ConnectionTrait>(db: &C, id: i64) -> Result<(), DbErr> {
    observe("file.bump_downloads", async {
        file::Entity::update_many()
            .col_expr(
                file::Column::Downloads,
                Expr::col((file::Entity, file::Column::Downloads)).add(1),
            )
            .filter(file::Column::Id.eq(id))
            .exec(db)
            .await
    })
    .await?;
    Ok(())
}

/// Distinct uploader addresses of a bin, for the ban cascade.
pub async fn uploader_ips<C: ConnectionTrait>(db: &C, bin_id: &str) -> Result<Vec<String>, DbErr> {
    observe(
        "file.uploader_ips",
        file::Entity::find()
            .select_only()
            .column(file::Column::Ip)
            .filter(file::Column::BinId.eq(bin_id))
            .distinct()
            .into_tuple()
            .all(db),
    )
    .await
}
