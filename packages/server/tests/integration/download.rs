use std::io::Read;

use crate::common::TestApp;

mod limits {
    use super::*;

    #[tokio::test]
    async fn per_file_download_ceiling_is_enforced() {
        let app = TestApp::spawn_with(|cfg| {
            cfg.limit.file_downloads = 2;
        })
        .await;
        app.must_upload("limited-bin", "twice.txt", b"only twice").await;

        assert_eq!(app.get("/limited-bin/twice.txt").await.status, 200);
        assert_eq!(app.get("/limited-bin/twice.txt").await.status, 200);

        let res = app.get("/limited-bin/twice.txt").await;
        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"].as_str().unwrap(), "DOWNLOAD_LIMIT");
    }

    #[tokio::test]
    async fn storage_ceiling_rejects_uploads_with_507() {
        let app = TestApp::spawn_with(|cfg| {
            cfg.limit.storage_bytes = 10;
        })
        .await;

        // The gauge is refreshed by a background ticker in production; poke
        // it directly to simulate a full store.
        app.stored_bytes
            .store(11, std::sync::atomic::Ordering::Relaxed);

        let res = app.upload("full-storage", "f.txt", b"x").await;
        assert_eq!(res.status, 507);
        assert_eq!(res.body["code"].as_str().unwrap(), "STORAGE_LIMIT");

        let res = app.get("/storage-status").await;
        assert_eq!(res.status, 507);
    }
}

mod headers {
    use super::*;

    #[tokio::test]
    async fn html_downloads_are_forced_to_attachments() {
        let app = TestApp::spawn().await;
        app.must_upload("html-bin1", "page.html", b"<h1>hi</h1>").await;

        let res = app.get("/html-bin1/page.html").await;
        assert_eq!(res.status, 200);
        let disposition = res
            .headers
            .get("content-disposition")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(disposition.starts_with("attachment"));
    }

    #[tokio::test]
    async fn plain_files_are_served_inline_with_their_mime() {
        let app = TestApp::spawn().await;
        app.must_upload("plain-bin1", "notes.txt", b"notes").await;

        let res = app.get("/plain-bin1/notes.txt").await;
        assert_eq!(res.status, 200);
        assert!(
            res.headers
                .get("content-type")
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );
        assert!(
            res.headers
                .get("content-disposition")
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("inline")
        );
    }

    #[tokio::test]
    async fn range_requests_return_partial_content() {
        let app = TestApp::spawn().await;
        app.must_upload("range-bin1", "digits.txt", b"0123456789").await;

        let res = app
            .get_with("/range-bin1/digits.txt", &[("Range", "bytes=2-5")])
            .await;
        assert_eq!(res.status, 206);
        assert_eq!(res.text, "2345");
        assert_eq!(
            res.headers.get("content-range").unwrap().to_str().unwrap(),
            "bytes 2-5/10"
        );
    }

    #[tokio::test]
    async fn etag_revalidation_returns_304_without_counting() {
        let app = TestApp::spawn().await;
        let sha = app.must_upload("etag-bin1", "f.txt", b"cacheable").await;

        let res = app.get("/etag-bin1/f.txt").await;
        assert_eq!(res.status, 200);
        let etag = res.headers.get("etag").unwrap().to_str().unwrap().to_owned();
        assert_eq!(etag, format!("\"{sha}\""));

        let res = app
            .get_with("/etag-bin1/f.txt", &[("If-None-Match", etag.as_str())])
            .await;
        assert_eq!(res.status, 304);

        // Only the real download counted.
        let res = app.get("/etag-bin1").await;
        assert_eq!(res.body["files"][0]["downloads"].as_i64().unwrap(), 1);
    }

    #[tokio::test]
    async fn download_counters_increment() {
        let app = TestApp::spawn().await;
        app.must_upload("counted-bin", "f.txt", b"x").await;

        app.get("/counted-bin/f.txt").await;
        app.get("/counted-bin/f.txt").await;

        let res = app.get("/counted-bin").await;
        assert_eq!(res.body["bin"]["downloads"].as_i64().unwrap(), 2);
        assert_eq!(res.body["files"][0]["downloads"].as_i64().unwrap(), 2);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let app = TestApp::spawn().await;
        app.must_upload("exists-bin", "here.txt", b"x").await;
        assert_eq!(app.get("/exists-bin/missing.txt").await.status, 404);
    }
}

mod gates {
    use super::*;

    #[tokio::test]
    async fn verification_cookie_gates_browsers_but_not_cli() {
        let app = TestApp::spawn_with(|cfg| {
            cfg.access.require_verification_cookie = true;
            cfg.access.expected_cookie_value = "2024-05".into();
        })
        .await;
        app.must_upload("cookie-bin", "f.txt", b"gated").await;

        // Browser-like client without the cookie.
        let res = app
            .get_with("/cookie-bin/f.txt", &[("User-Agent", "Mozilla/5.0")])
            .await;
        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"].as_str().unwrap(), "VERIFICATION_REQUIRED");

        // Same client with the cookie.
        let res = app
            .get_with(
                "/cookie-bin/f.txt",
                &[
                    ("User-Agent", "Mozilla/5.0"),
                    ("Cookie", "verified=2024-05"),
                ],
            )
            .await;
        assert_eq!(res.status, 200);

        // CLI downloaders bypass the cookie.
        let res = app
            .get_with("/cookie-bin/f.txt", &[("User-Agent", "curl/8.5.0")])
            .await;
        assert_eq!(res.status, 200);
    }

    #[tokio::test]
    async fn manual_approval_gates_downloads_until_an_admin_approves() {
        let app = TestApp::spawn_with(|cfg| {
            cfg.access.manual_approval = true;
        })
        .await;
        app.must_upload("pending-bin", "f.txt", b"waiting").await;

        let res = app.get("/pending-bin/f.txt").await;
        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"].as_str().unwrap(), "BIN_NOT_APPROVED");

        let res = app.admin_post("/admin/bins/pending-bin/approve").await;
        assert_eq!(res.status, 200, "{}", res.text);

        assert_eq!(app.get("/pending-bin/f.txt").await.status, 200);
    }
}

mod archives {
    use super::*;

    #[tokio::test]
    async fn tar_archive_contains_all_live_files() {
        let app = TestApp::spawn().await;
        app.must_upload("tar-bin-it", "a.txt", b"alpha").await;
        app.must_upload("tar-bin-it", "b.txt", b"beta").await;

        let res = app
            .client
            .get(app.url("/archive/tar-bin-it/tar"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
        assert_eq!(
            res.headers().get("content-type").unwrap().to_str().unwrap(),
            "application/x-tar"
        );
        let bytes = res.bytes().await.unwrap();

        let mut archive = tar::Archive::new(std::io::Cursor::new(bytes.to_vec()));
        let mut names = Vec::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let name = entry.path().unwrap().to_string_lossy().into_owned();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            names.push((name, data));
        }
        assert_eq!(names.len(), 2);
        assert_eq!(names[0], ("a.txt".into(), b"alpha".to_vec()));
        assert_eq!(names[1], ("b.txt".into(), b"beta".to_vec()));
    }

    #[tokio::test]
    async fn zip_archive_contains_all_live_files() {
        let app = TestApp::spawn().await;
        app.must_upload("zip-bin-it", "x.txt", b"xx").await;
        app.must_upload("zip-bin-it", "y.txt", b"yy").await;

        let res = app
            .client
            .get(app.url("/archive/zip-bin-it/zip"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
        assert_eq!(
            res.headers().get("content-type").unwrap().to_str().unwrap(),
            "application/zip"
        );
        let bytes = res.bytes().await.unwrap();

        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.to_vec())).unwrap();
        assert_eq!(archive.len(), 2);
        let mut data = Vec::new();
        archive.by_name("x.txt").unwrap().read_to_end(&mut data).unwrap();
        assert_eq!(data, b"xx");
    }

    #[tokio::test]
    async fn unknown_archive_format_is_rejected() {
        let app = TestApp::spawn().await;
        app.must_upload("format-bin", "f.txt", b"x").await;
        assert_eq!(app.get("/archive/format-bin/rar").await.status, 400);
    }

    #[tokio::test]
    async fn archive_of_an_empty_bin_is_not_found() {
        let app = TestApp::spawn().await;
        assert_eq!(app.get("/archive/missing-bin1/tar").await.status, 404);
    }
}

mod status {
    use super::*;

    #[tokio::test]
    async fn liveness_reports_both_backends() {
        let app = TestApp::spawn().await;
        let res = app.get("/filebin-status").await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["database"].as_str().unwrap(), "ok");
        assert_eq!(res.body["storage"].as_str().unwrap(), "ok");
    }

    #[tokio::test]
    async fn storage_status_is_ok_without_a_ceiling() {
        let app = TestApp::spawn().await;
        let res = app.get("/storage-status").await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["limit_bytes"].as_u64().unwrap(), 0);
    }
}
