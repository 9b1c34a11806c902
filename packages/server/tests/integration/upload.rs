use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use md5::Md5;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use sha2::{Digest, Sha256};

use server::entity::{content, file};

use crate::common::TestApp;

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

mod basic {
    use super::*;

    #[tokio::test]
    async fn upload_then_download_round_trips() {
        let app = TestApp::spawn().await;

        let res = app.upload("mytestbin", "a", b"content a").await;
        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(
            res.body["file"]["sha256"].as_str().unwrap(),
            sha256_hex(b"content a")
        );
        assert_eq!(res.body["file"]["filename"].as_str().unwrap(), "a");
        assert_eq!(res.body["file"]["bytes"].as_i64().unwrap(), 9);
        assert!(res.body["file"]["available"].as_bool().unwrap());
        assert_eq!(res.body["bin"]["id"].as_str().unwrap(), "mytestbin");

        let res = app.get("/mytestbin/a").await;
        assert_eq!(res.status, 200);
        assert_eq!(res.text, "content a");
        assert_eq!(
            res.headers.get("Content-SHA256").unwrap().to_str().unwrap(),
            sha256_hex(b"content a")
        );
        let md5_b64 = BASE64.encode(Md5::digest(b"content a"));
        assert_eq!(
            res.headers.get("Content-MD5").unwrap().to_str().unwrap(),
            md5_b64
        );
    }

    #[tokio::test]
    async fn response_sha256_matches_server_computation() {
        let app = TestApp::spawn().await;
        let body = b"some arbitrary payload \x00\x01\x02";
        let sha = app.must_upload("checksum-bin", "payload.bin", body).await;
        assert_eq!(sha, sha256_hex(body));
    }

    #[tokio::test]
    async fn upload_via_put_works() {
        let app = TestApp::spawn().await;
        let res = app
            .client
            .put(app.url("/putupload/file.txt"))
            .body(b"via put".to_vec())
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 201);
    }

    #[tokio::test]
    async fn root_upload_synthesises_a_bin() {
        let app = TestApp::spawn().await;
        let res = app
            .client
            .post(app.url("/"))
            .header("filename", "auto.txt")
            .body(b"auto bin".to_vec())
            .send()
            .await
            .unwrap();
        let res = crate::common::TestResponse::from_response(res).await;
        assert_eq!(res.status, 201, "{}", res.text);

        let bin_id = res.body["bin"]["id"].as_str().unwrap();
        assert_eq!(bin_id.len(), 16);
        assert!(bin_id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));

        let res = app.get(&format!("/{bin_id}/auto.txt")).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.text, "auto bin");
    }

    #[tokio::test]
    async fn root_upload_without_filename_header_fails() {
        let app = TestApp::spawn().await;
        let res = app
            .client
            .post(app.url("/"))
            .body(b"data".to_vec())
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 400);
    }
}

mod validation {
    use super::*;

    #[tokio::test]
    async fn bin_id_length_boundaries() {
        let app = TestApp::spawn().await;

        let res = app.upload(&"a".repeat(7), "f", b"x").await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["errno"].as_u64().unwrap(), 101);

        let res = app.upload(&"a".repeat(8), "f", b"x").await;
        assert_eq!(res.status, 201);

        let res = app.upload(&"b".repeat(60), "f", b"x").await;
        assert_eq!(res.status, 201);

        let res = app.upload(&"b".repeat(61), "f", b"x").await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn leading_dot_filename_is_repaired() {
        let app = TestApp::spawn().await;
        let res = app.upload("dotfiles-bin", ".gitignore", b"target/").await;
        assert_eq!(res.status, 201);
        assert_eq!(res.body["file"]["filename"].as_str().unwrap(), "_gitignore");
    }

    #[tokio::test]
    async fn zero_byte_body_is_rejected() {
        let app = TestApp::spawn().await;
        let res = app.upload("empty-upload", "void.txt", b"").await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"].as_str().unwrap(), "EMPTY_BODY");

        // No content row was created.
        let contents = content::Entity::find().count(&app.db).await.unwrap();
        assert_eq!(contents, 0);
    }

    #[tokio::test]
    async fn checksum_mismatch_leaves_no_side_effects() {
        let app = TestApp::spawn().await;
        let res = app
            .upload_with(
                "checkbin1",
                "a",
                b"x",
                &[("Content-SHA256", "wrong checksum")],
            )
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"].as_str().unwrap(), "CHECKSUM_MISMATCH");

        assert_eq!(file::Entity::find().count(&app.db).await.unwrap(), 0);
        assert_eq!(content::Entity::find().count(&app.db).await.unwrap(), 0);
        assert_eq!(app.object_count(), 0);
    }

    #[tokio::test]
    async fn matching_checksums_are_accepted() {
        let app = TestApp::spawn().await;
        let body = b"verified payload";
        let sha = sha256_hex(body);
        let md5 = BASE64.encode(Md5::digest(body));

        let res = app
            .upload_with(
                "checkbin2",
                "ok.bin",
                body,
                &[("Content-SHA256", sha.as_str()), ("Content-MD5", md5.as_str())],
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
    }

    #[tokio::test]
    async fn wrong_md5_is_rejected() {
        let app = TestApp::spawn().await;
        let md5_of_other = BASE64.encode(Md5::digest(b"other body"));
        let res = app
            .upload_with(
                "checkbin3",
                "bad.bin",
                b"actual body",
                &[("Content-MD5", md5_of_other.as_str())],
            )
            .await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn rejected_extension_is_refused() {
        let app = TestApp::spawn_with(|cfg| {
            cfg.limit.reject_extensions = vec!["exe".into()];
        })
        .await;

        let res = app.upload("binaries-bin", "setup.EXE", b"MZ").await;
        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"].as_str().unwrap(), "EXTENSION_REJECTED");

        let res = app.upload("binaries-bin", "setup.txt", b"ok").await;
        assert_eq!(res.status, 201);
    }

    #[tokio::test]
    async fn reserved_bin_ids_are_rejected() {
        let app = TestApp::spawn().await;
        let res = app.upload("storage-status", "f.txt", b"x").await;
        assert_eq!(res.status, 400);
    }
}

mod dedup {
    use super::*;

    #[tokio::test]
    async fn same_bytes_across_bins_share_one_object() {
        let app = TestApp::spawn().await;

        let sha1 = app.must_upload("dedup-bin1", "x", b"hello").await;
        let sha2 = app.must_upload("dedup-bin2", "y", b"hello").await;
        assert_eq!(sha1, sha2);
        assert_eq!(sha1, sha256_hex(b"hello"));

        assert_eq!(file::Entity::find().count(&app.db).await.unwrap(), 2);
        assert_eq!(content::Entity::find().count(&app.db).await.unwrap(), 1);

        let row = content::Entity::find_by_id(sha1.as_str())
            .one(&app.db)
            .await
            .unwrap()
            .unwrap();
        assert!(row.in_storage);

        assert_eq!(app.object_count(), 1);
        assert!(app.object_present(&sha1).await);
    }

    #[tokio::test]
    async fn same_bytes_same_slot_twice_keeps_one_of_everything_live() {
        let app = TestApp::spawn().await;

        app.must_upload("idempotent-bin", "f.txt", b"same bytes").await;
        let res = app.upload("idempotent-bin", "f.txt", b"same bytes").await;
        assert_eq!(res.status, 201);
        assert_eq!(res.body["file"]["updates"].as_i64().unwrap(), 1);

        let live = file::Entity::find()
            .filter(file::Column::DeletedAt.is_null())
            .count(&app.db)
            .await
            .unwrap();
        assert_eq!(live, 1);
        assert_eq!(content::Entity::find().count(&app.db).await.unwrap(), 1);
        assert_eq!(app.object_count(), 1);
    }

    #[tokio::test]
    async fn overwrite_with_different_content_replaces_the_reference() {
        let app = TestApp::spawn().await;

        let old_sha = app.must_upload("overwrite-bin", "f.txt", b"version 1").await;
        let new_sha = app.must_upload("overwrite-bin", "f.txt", b"version 2").await;
        assert_ne!(old_sha, new_sha);

        let res = app.get("/overwrite-bin/f.txt").await;
        assert_eq!(res.status, 200);
        assert_eq!(res.text, "version 2");

        // The old row is tombstoned, not gone.
        let total = file::Entity::find().count(&app.db).await.unwrap();
        let live = file::Entity::find()
            .filter(file::Column::DeletedAt.is_null())
            .count(&app.db)
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(live, 1);
    }
}

mod bin_state {
    use super::*;

    #[tokio::test]
    async fn upload_extends_bin_expiry_and_counts_updates() {
        let app = TestApp::spawn().await;

        let res = app.upload("counting-bin", "one.txt", b"1").await;
        assert_eq!(res.status, 201);
        let first_expiry = res.body["bin"]["expired_at"].as_str().unwrap().to_string();
        assert_eq!(res.body["bin"]["updates"].as_i64().unwrap(), 1);

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        let res = app.upload("counting-bin", "two.txt", b"2").await;
        assert_eq!(res.status, 201);
        assert_eq!(res.body["bin"]["updates"].as_i64().unwrap(), 2);
        let second_expiry = res.body["bin"]["expired_at"].as_str().unwrap();
        assert!(second_expiry > first_expiry.as_str());
    }

    #[tokio::test]
    async fn bin_updated_at_never_exceeds_expired_at() {
        let app = TestApp::spawn().await;
        let res = app.upload("invariant-bin", "f", b"x").await;
        assert_eq!(res.status, 201);
        let updated = res.body["bin"]["updated_at"].as_str().unwrap();
        let expired = res.body["bin"]["expired_at"].as_str().unwrap();
        assert!(updated <= expired);
    }
}
