use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(handlers::upload::upload_root).layer(handlers::upload::upload_body_limit()),
        )
        .route("/filebin-status", get(handlers::status::filebin_status))
        .route("/storage-status", get(handlers::status::storage_status))
        .route(
            "/archive/{bin}/{format}",
            get(handlers::archive::download_archive),
        )
        .nest("/admin", admin_routes())
        .route(
            "/{bin}",
            get(handlers::bin::get_bin)
                .put(handlers::bin::lock_bin)
                .delete(handlers::bin::delete_bin)
                // Non-standard verbs land here; BAN is handled, the rest 405.
                .fallback(handlers::bin::ban_bin),
        )
        .route(
            "/{bin}/{filename}",
            post(handlers::upload::upload_file)
                .put(handlers::upload::upload_file)
                .get(handlers::download::download_file)
                .delete(handlers::download::delete_file)
                .layer(handlers::upload::upload_body_limit()),
        )
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/file/{sha256}/block", post(handlers::admin::block_content))
        .route("/bins/{bin}/approve", post(handlers::admin::approve_bin))
        .route("/clients/{ip}/ban", post(handlers::admin::ban_client))
}
