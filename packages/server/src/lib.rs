pub mod archive;
pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod reaper;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;

use std::time::Duration;

use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_scalar::{Scalar, Servable as ScalarServable};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::CorsConfig;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Filebin API",
        version = "1.0.0",
        description = "Ephemeral, anonymous file sharing with content deduplication"
    ),
    paths(
        handlers::upload::upload_root,
        handlers::upload::upload_file,
        handlers::bin::get_bin,
        handlers::bin::lock_bin,
        handlers::bin::delete_bin,
        handlers::download::download_file,
        handlers::download::delete_file,
        handlers::archive::download_archive,
        handlers::admin::block_content,
        handlers::admin::approve_bin,
        handlers::admin::ban_client,
        handlers::status::filebin_status,
        handlers::status::storage_status,
    ),
    components(schemas(
        error::ErrorBody,
        models::bin::BinResponse,
        models::bin::BinDetailResponse,
        models::bin::UploadedResponse,
        models::file::FileResponse,
    )),
    tags(
        (name = "Upload", description = "The ingress pipeline"),
        (name = "Bins", description = "Bin listing and lifecycle"),
        (name = "Download", description = "File and archive downloads"),
        (name = "Admin", description = "Moderation actions"),
        (name = "Status", description = "Operational probes"),
    ),
    modifiers(&SecurityAddon),
)]
struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();
        components.add_security_scheme(
            "basic",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Basic).build()),
        );
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> axum::Router {
    let cors = cors_layer(&state.config.server.cors);

    axum::Router::new()
        .merge(routes::routes())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::client_gate,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::transaction_log,
        ))
        .layer(cors)
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(Scalar::with_url("/scalar", ApiDoc::openapi()))
}

fn cors_layer(cfg: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(cfg.max_age));

    if cfg.allow_origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = cfg
            .allow_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        layer.allow_origin(origins)
    }
}
