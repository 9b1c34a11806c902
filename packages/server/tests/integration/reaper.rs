use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use server::entity::{bin, content};
use server::store::contents;

use crate::common::TestApp;

/// Force a bin's expiry into the past, as if its TTL ran out.
async fn expire_bin(app: &TestApp, id: &str) {
    bin::Entity::update_many()
        .col_expr(
            bin::Column::ExpiredAt,
            Expr::value(Utc::now() - chrono::Duration::seconds(5)),
        )
        .filter(bin::Column::Id.eq(id))
        .exec(&app.db)
        .await
        .unwrap();
}

async fn in_storage(app: &TestApp, sha256: &str) -> bool {
    contents::find(&app.db, sha256)
        .await
        .unwrap()
        .expect("content row should exist")
        .in_storage
}

mod reference_counting {
    use super::*;

    #[tokio::test]
    async fn object_survives_while_any_live_reference_remains() {
        let app = TestApp::spawn().await;
        let reaper = app.reaper();

        let sha = app.must_upload("refcount-bin1", "x", b"hello").await;
        app.must_upload("refcount-bin2", "y", b"hello").await;

        assert_eq!(app.delete("/refcount-bin1/x").await.status, 200);
        reaper.tick().await;

        assert!(app.object_present(&sha).await);
        assert!(in_storage(&app, &sha).await);

        assert_eq!(app.delete("/refcount-bin2/y").await.status, 200);
        reaper.tick().await;

        assert!(!app.object_present(&sha).await);
        assert!(!in_storage(&app, &sha).await);
    }

    #[tokio::test]
    async fn reupload_after_reclaim_repushes_the_object() {
        let app = TestApp::spawn().await;
        let reaper = app.reaper();

        let sha = app.must_upload("revive-bin", "f", b"phoenix").await;
        app.delete("/revive-bin/f").await;
        reaper.tick().await;
        assert!(!app.object_present(&sha).await);
        assert!(!in_storage(&app, &sha).await);

        let sha_again = app.must_upload("revive-bin", "f", b"phoenix").await;
        assert_eq!(sha, sha_again);
        assert!(app.object_present(&sha).await);
        assert!(in_storage(&app, &sha).await);
    }

    #[tokio::test]
    async fn overwrite_orphans_the_old_content_for_the_reaper() {
        let app = TestApp::spawn().await;
        let reaper = app.reaper();

        let old_sha = app.must_upload("orphan-bin", "f.txt", b"old bytes").await;
        let new_sha = app.must_upload("orphan-bin", "f.txt", b"new bytes").await;

        reaper.tick().await;

        assert!(!app.object_present(&old_sha).await);
        assert!(app.object_present(&new_sha).await);
        assert!(!in_storage(&app, &old_sha).await);
        assert!(in_storage(&app, &new_sha).await);
    }

    #[tokio::test]
    async fn content_row_outlives_its_object() {
        let app = TestApp::spawn().await;
        let reaper = app.reaper();

        let sha = app.must_upload("rowkeeper-bin", "f", b"keep my row").await;
        app.delete("/rowkeeper-bin/f").await;
        reaper.tick().await;

        // The row stays for the blocked flag and dedup history.
        let row = content::Entity::find_by_id(sha.as_str())
            .one(&app.db)
            .await
            .unwrap();
        assert!(row.is_some());
    }
}

mod expiry {
    use super::*;

    #[tokio::test]
    async fn expired_bins_are_tombstoned_and_their_objects_reclaimed() {
        let app = TestApp::spawn().await;
        let reaper = app.reaper();

        let sha = app.must_upload("expiring-bin", "f.txt", b"short lived").await;
        expire_bin(&app, "expiring-bin").await;

        reaper.tick().await;

        let row = bin::Entity::find_by_id("expiring-bin")
            .one(&app.db)
            .await
            .unwrap()
            .unwrap();
        assert!(row.deleted_at.is_some());

        assert!(!app.object_present(&sha).await);
        assert_eq!(app.get("/expiring-bin").await.status, 404);
    }

    #[tokio::test]
    async fn expired_bin_stops_serving_before_the_reaper_runs() {
        let app = TestApp::spawn().await;

        app.must_upload("latent-bin", "f.txt", b"x").await;
        expire_bin(&app, "latent-bin").await;

        assert_eq!(app.get("/latent-bin/f.txt").await.status, 404);
        assert_eq!(app.upload("latent-bin", "g.txt", b"y").await.status, 405);
    }
}

mod upkeep {
    use super::*;

    #[tokio::test]
    async fn ticks_are_idempotent() {
        let app = TestApp::spawn().await;
        let reaper = app.reaper();

        let sha = app.must_upload("steady-bin", "f", b"steady").await;
        reaper.tick().await;
        reaper.tick().await;

        assert!(app.object_present(&sha).await);
        assert!(in_storage(&app, &sha).await);
        assert_eq!(app.get("/steady-bin/f").await.status, 200);
    }

    #[tokio::test]
    async fn request_log_rows_are_written_and_trimmed_by_age() {
        use server::entity::transaction;

        let app = TestApp::spawn().await;
        let reaper = app.reaper();

        app.get("/filebin-status").await;
        // The log middleware records after responding; give it a beat.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        use sea_orm::PaginatorTrait;
        let before = transaction::Entity::find().count(&app.db).await.unwrap();
        assert!(before >= 1);

        // Age every row past the retention window, then tick.
        transaction::Entity::update_many()
            .col_expr(
                transaction::Column::StartedAt,
                Expr::value(Utc::now() - chrono::Duration::days(30)),
            )
            .exec(&app.db)
            .await
            .unwrap();

        reaper.tick().await;

        let after = transaction::Entity::find().count(&app.db).await.unwrap();
        assert_eq!(after, 0);
    }
}
