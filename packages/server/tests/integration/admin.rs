use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

use server::entity::{client, file};

use crate::common::{ADMIN_PASSWORD, ADMIN_USER, TestApp};

mod auth {
    use super::*;

    #[tokio::test]
    async fn admin_endpoints_require_credentials() {
        let app = TestApp::spawn().await;
        app.must_upload("auth-bin1", "f.txt", b"x").await;

        let res = app
            .client
            .post(app.url("/admin/bins/auth-bin1/approve"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 401);
        assert!(res.headers().get("www-authenticate").is_some());
    }

    #[tokio::test]
    async fn wrong_credentials_are_rejected() {
        let app = TestApp::spawn().await;
        app.must_upload("auth-bin2", "f.txt", b"x").await;

        let res = app
            .client
            .post(app.url("/admin/bins/auth-bin2/approve"))
            .basic_auth(ADMIN_USER, Some("not-the-password"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 401);
    }

    #[tokio::test]
    async fn correct_credentials_are_accepted() {
        let app = TestApp::spawn().await;
        app.must_upload("auth-bin3", "f.txt", b"x").await;

        let res = app
            .client
            .post(app.url("/admin/bins/auth-bin3/approve"))
            .basic_auth(ADMIN_USER, Some(ADMIN_PASSWORD))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
    }
}

mod blocking {
    use super::*;

    #[tokio::test]
    async fn blocked_content_rejects_reuploads_anywhere() {
        let app = TestApp::spawn().await;
        let sha = app.must_upload("evil-bin1", "evil.txt", b"evil").await;

        let res = app.admin_post(&format!("/admin/file/{sha}/block")).await;
        assert_eq!(res.status, 303);

        // Existing references are tombstoned.
        assert_eq!(app.get("/evil-bin1/evil.txt").await.status, 404);
        let live = file::Entity::find()
            .filter(file::Column::Sha256.eq(sha.as_str()))
            .filter(file::Column::DeletedAt.is_null())
            .count(&app.db)
            .await
            .unwrap();
        assert_eq!(live, 0);

        // The same bytes are refused everywhere from now on.
        let res = app.upload("other-bin-x", "innocent-name.txt", b"evil").await;
        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"].as_str().unwrap(), "CONTENT_BLOCKED");

        // Different bytes are unaffected.
        assert_eq!(app.upload("other-bin-x", "fine.txt", b"fine").await.status, 201);
    }

    #[tokio::test]
    async fn blocking_unknown_content_is_not_found() {
        let app = TestApp::spawn().await;
        let res = app
            .admin_post(&format!("/admin/file/{}/block", "00".repeat(32)))
            .await;
        assert_eq!(res.status, 404);
    }
}

mod bans {
    use super::*;

    #[tokio::test]
    async fn banning_a_bin_bans_every_uploader() {
        let app = TestApp::spawn().await;

        // Two uploaders into the same bin, a bystander elsewhere.
        let res = app
            .upload_with("banned-bin1", "a.txt", b"a", &[("X-Forwarded-For", "203.0.113.7")])
            .await;
        assert_eq!(res.status, 201);
        let res = app
            .upload_with("banned-bin1", "b.txt", b"b", &[("X-Forwarded-For", "203.0.113.8")])
            .await;
        assert_eq!(res.status, 201);
        let res = app
            .upload_with("clean-bin1", "c.txt", b"c", &[("X-Forwarded-For", "203.0.113.9")])
            .await;
        assert_eq!(res.status, 201);

        let res = app.ban("banned-bin1").await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["clients_banned"].as_u64().unwrap(), 2);

        // The bin itself is gone.
        assert_eq!(app.get("/banned-bin1").await.status, 404);

        // Uploaders are rejected before routing, on any path.
        let res = app
            .get_with("/clean-bin1/c.txt", &[("X-Forwarded-For", "203.0.113.7")])
            .await;
        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"].as_str().unwrap(), "CLIENT_BANNED");

        let res = app
            .upload_with("brand-new-bin", "d.txt", b"d", &[("X-Forwarded-For", "203.0.113.8")])
            .await;
        assert_eq!(res.status, 403);

        // The bystander is untouched.
        let res = app
            .get_with("/clean-bin1/c.txt", &[("X-Forwarded-For", "203.0.113.9")])
            .await;
        assert_eq!(res.status, 200);
    }

    #[tokio::test]
    async fn ban_requires_admin_credentials() {
        let app = TestApp::spawn().await;
        app.must_upload("banned-bin2", "f.txt", b"x").await;

        let method = reqwest::Method::from_bytes(b"BAN").unwrap();
        let res = app
            .client
            .request(method, app.url("/banned-bin2"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 401);

        // Nothing was banned or deleted.
        assert_eq!(app.get("/banned-bin2").await.status, 200);
    }

    #[tokio::test]
    async fn banning_a_single_client_marks_the_row() {
        let app = TestApp::spawn().await;
        let res = app
            .upload_with("single-ban", "f.txt", b"x", &[("X-Forwarded-For", "198.51.100.4")])
            .await;
        assert_eq!(res.status, 201);

        let res = app.admin_post("/admin/clients/198.51.100.4/ban").await;
        assert_eq!(res.status, 200, "{}", res.text);

        let row = client::Entity::find_by_id("198.51.100.4")
            .one(&app.db)
            .await
            .unwrap()
            .unwrap();
        assert!(row.banned_at.is_some());
        assert_eq!(row.banned_by.as_deref(), Some(ADMIN_USER));

        let res = app
            .get_with("/single-ban", &[("X-Forwarded-For", "198.51.100.4")])
            .await;
        assert_eq!(res.status, 403);
    }

    #[tokio::test]
    async fn banning_an_unknown_client_is_not_found() {
        let app = TestApp::spawn().await;
        let res = app.admin_post("/admin/clients/192.0.2.200/ban").await;
        assert_eq!(res.status, 404);
    }
}
