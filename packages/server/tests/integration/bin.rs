use crate::common::TestApp;

mod listing {
    use super::*;

    #[tokio::test]
    async fn lists_live_files_with_aggregates() {
        let app = TestApp::spawn().await;
        app.must_upload("listing-bin", "b.txt", b"bbbb").await;
        app.must_upload("listing-bin", "a.txt", b"aa").await;

        let res = app.get("/listing-bin").await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["bin"]["files"].as_u64().unwrap(), 2);
        assert_eq!(res.body["bin"]["bytes"].as_i64().unwrap(), 6);

        let files = res.body["files"].as_array().unwrap();
        assert_eq!(files.len(), 2);
        // Ordered by filename.
        assert_eq!(files[0]["filename"].as_str().unwrap(), "a.txt");
        assert_eq!(files[1]["filename"].as_str().unwrap(), "b.txt");
    }

    #[tokio::test]
    async fn unused_bin_id_returns_an_empty_skeleton_without_a_row() {
        let app = TestApp::spawn().await;

        let res = app.get("/never-used-bin").await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["bin"]["id"].as_str().unwrap(), "never-used-bin");
        assert_eq!(res.body["files"].as_array().unwrap().len(), 0);

        use sea_orm::{EntityTrait, PaginatorTrait};
        let bins = server::entity::bin::Entity::find()
            .count(&app.db)
            .await
            .unwrap();
        assert_eq!(bins, 0);
    }

    #[tokio::test]
    async fn invalid_bin_id_is_a_bad_request() {
        let app = TestApp::spawn().await;
        let res = app.get("/bad!bin!id").await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn txt_listing_returns_absolute_urls() {
        let app = TestApp::spawn().await;
        app.must_upload("text-listing", "one.txt", b"1").await;
        app.must_upload("text-listing", "two.txt", b"2").await;

        let res = app.get("/text-listing.txt").await;
        assert_eq!(res.status, 200);
        assert!(
            res.headers
                .get("content-type")
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );
        let lines: Vec<&str> = res.text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("/text-listing/one.txt"));
        assert!(lines[1].ends_with("/text-listing/two.txt"));
    }

    #[tokio::test]
    async fn deleted_files_disappear_from_the_listing() {
        let app = TestApp::spawn().await;
        app.must_upload("shrinking-bin", "keep.txt", b"keep").await;
        app.must_upload("shrinking-bin", "drop.txt", b"drop").await;

        let res = app.delete("/shrinking-bin/drop.txt").await;
        assert_eq!(res.status, 200);

        let res = app.get("/shrinking-bin").await;
        let files = res.body["files"].as_array().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0]["filename"].as_str().unwrap(), "keep.txt");
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn locking_makes_the_bin_read_only() {
        let app = TestApp::spawn().await;
        app.must_upload("locking-bin", "before.txt", b"ok").await;

        let res = app.put("/locking-bin").await;
        assert_eq!(res.status, 200);

        let res = app.upload("locking-bin", "after.txt", b"nope").await;
        assert_eq!(res.status, 405);
        assert_eq!(res.body["errno"].as_u64().unwrap(), 120);

        // Deletes are writes too.
        let res = app.delete("/locking-bin/before.txt").await;
        assert_eq!(res.status, 405);

        // Reads still work.
        let res = app.get("/locking-bin/before.txt").await;
        assert_eq!(res.status, 200);
    }

    #[tokio::test]
    async fn deleting_a_bin_hides_it_and_blocks_writes() {
        let app = TestApp::spawn().await;
        app.must_upload("doomed-bin1", "f.txt", b"x").await;

        let res = app.delete("/doomed-bin1").await;
        assert_eq!(res.status, 200);

        assert_eq!(app.get("/doomed-bin1").await.status, 404);
        assert_eq!(app.get("/doomed-bin1/f.txt").await.status, 404);
        assert_eq!(app.upload("doomed-bin1", "g.txt", b"y").await.status, 405);
    }

    #[tokio::test]
    async fn deleting_a_missing_bin_is_not_found() {
        let app = TestApp::spawn().await;
        assert_eq!(app.delete("/never-created").await.status, 404);
    }

    #[tokio::test]
    async fn unknown_methods_on_a_bin_are_rejected() {
        let app = TestApp::spawn().await;
        let method = reqwest::Method::from_bytes(b"PURGE").unwrap();
        let res = app
            .client
            .request(method, app.url("/whatever-bin"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 405);
    }
}
