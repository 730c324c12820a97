use axum::{
    extract::{DefaultBodyLimit, Request},
    routing::{get, post},
    Router, ServiceExt,
};
use sqlx::postgres::PgPoolOptions;
use tower::Layer;
use tower_http::{
    cors::CorsLayer,
    normalize_path::{NormalizePath, NormalizePathLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};

mod clients;
mod config;
mod db;
mod error;
mod extract;
mod generation;
mod handlers;
mod media;
mod models;
#[cfg(test)]
mod testing;

use crate::clients::Collaborators;
use crate::config::Config;
use crate::db::Repositories;
use crate::generation::AdvertGenerator;
use crate::media::MediaStorage;

/// Shared application state; every field is a cheap clone.
#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub media: MediaStorage,
    pub generator: AdvertGenerator,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (ignored in production where env vars are injected)
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,listing_service=debug")),
        )
        .with_target(false)
        .compact()
        .init();

    let config = Config::from_env()?;

    let repos = match &config.database_url {
        Some(url) => {
            info!("Connecting to PostgreSQL...");
            let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
            info!("Database connection pool established.");

            info!("Running migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Migrations complete.");

            Repositories::postgres(pool)
        }
        None => {
            warn!("DATABASE_URL is not set; records are kept in memory and lost on exit");
            Repositories::memory()
        }
    };

    let media = MediaStorage::new(config.media_root.clone(), &config.media_url);
    tokio::fs::create_dir_all(media.root()).await?;

    let collaborators = Collaborators::from_config(&config.external)?;
    let generator = AdvertGenerator::new(collaborators, repos.advertisements.clone(), media.clone());

    let state = AppState {
        repos,
        media,
        generator,
    };

    let app = build_app(state, config.max_upload_bytes);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, ServiceExt::<Request>::into_make_service(app)).await?;

    Ok(())
}

/// The router wrapped in trailing-slash normalization, which has to run
/// before routing.
fn build_app(state: AppState, max_upload_bytes: usize) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(build_router(state, max_upload_bytes))
}

fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let media = ServeDir::new(state.media.root());
    let media_mount = state.media.mount_path().to_string();

    let router = Router::new()
        // ── Health ──────────────────────────────────────────────────────────
        .route("/health", get(handlers::health))

        // ── Categories ──────────────────────────────────────────────────────
        .route(
            "/api/categories",
            get(handlers::categories::list_categories).post(handlers::categories::create_category),
        )
        .route(
            "/api/categories/:id",
            get(handlers::categories::get_category)
                .put(handlers::categories::update_category)
                .patch(handlers::categories::update_category)
                .delete(handlers::categories::delete_category),
        )

        // ── Products ────────────────────────────────────────────────────────
        .route(
            "/api/products",
            get(handlers::products::list_products).post(handlers::products::create_product),
        )
        .route(
            "/api/products/:id",
            get(handlers::products::get_product)
                .put(handlers::products::update_product)
                .patch(handlers::products::update_product)
                .delete(handlers::products::delete_product),
        )
        .route(
            "/api/products/:id/update_stock",
            post(handlers::products::update_stock),
        )
        .route("/api/products/:id/image", post(handlers::products::upload_image))

        // ── Inventory ───────────────────────────────────────────────────────
        .route(
            "/api/inventory",
            get(handlers::inventory::list_items).post(handlers::inventory::create_item),
        )
        .route("/api/inventory/low_stock", get(handlers::inventory::low_stock))
        .route(
            "/api/inventory/:id",
            get(handlers::inventory::get_item)
                .put(handlers::inventory::update_item)
                .patch(handlers::inventory::update_item)
                .delete(handlers::inventory::delete_item),
        )

        // ── Advertisements ──────────────────────────────────────────────────
        .route(
            "/api/advertisements",
            get(handlers::advertisements::list_advertisements),
        )
        .route(
            "/api/advertisements/generate",
            post(handlers::advertisements::generate_advertisement),
        )
        .route(
            "/api/advertisements/:id",
            get(handlers::advertisements::get_advertisement),
        );

    // An absolute MEDIA_URL points at another host, so nothing is served here.
    let router = if media_mount.starts_with('/') {
        router.nest_service(&media_mount, media)
    } else {
        router
    };

    router
        // ── Middleware ──────────────────────────────────────────────────────
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
