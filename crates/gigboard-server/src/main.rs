use axum::{
    http::HeaderValue,
    routing::get,
    Json, Router,
};
use gigboard_db::AppState;
use sea_orm_migration::MigratorTrait;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod api;
mod error;
mod validation;

#[derive(Serialize)]
struct ApiStatus {
    status: &'static str,
    version: &'static str,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Database connection
    let db_config = gigboard_db::DatabaseConfig::from_env();
    tracing::info!("connecting to database...");
    let db = gigboard_db::connect(&db_config)
        .await
        .expect("failed to connect to database");

    // Run migrations
    tracing::info!("running database migrations...");
    gigboard_migration::Migrator::up(&db, None)
        .await
        .expect("failed to run migrations");
    tracing::info!("migrations complete");

    let state = Arc::new(AppState { db });

    let api_routes = Router::new()
        .route(
            "/venues",
            get(api::venues::list_venues).post(api::venues::create_venue),
        )
        .route("/venues/search", get(api::venues::search_venues))
        .route(
            "/venues/{id}",
            get(api::venues::get_venue)
                .put(api::venues::update_venue)
                .delete(api::venues::delete_venue),
        )
        .route(
            "/artists",
            get(api::artists::list_artists).post(api::artists::create_artist),
        )
        .route("/artists/search", get(api::artists::search_artists))
        .route(
            "/artists/{id}",
            get(api::artists::get_artist).put(api::artists::update_artist),
        )
        .route(
            "/shows",
            get(api::shows::list_shows).post(api::shows::create_show),
        )
        .route("/stats/overview", get(api::stats::stats_overview));

    // CORS configuration — restrict to configured origins
    let cors = {
        let allowed_origins_str = std::env::var("CORS_ORIGINS").unwrap_or_default();
        let layer = if allowed_origins_str.is_empty() {
            tracing::warn!(
                "CORS_ORIGINS not set — defaulting to restrictive CORS. \
                 Set CORS_ORIGINS=http://localhost:3000 for dev."
            );
            CorsLayer::new().allow_origin(AllowOrigin::exact(HeaderValue::from_static(
                "http://localhost:8080",
            )))
        } else {
            let origins: Vec<HeaderValue> = allowed_origins_str
                .split(',')
                .filter_map(|s| HeaderValue::from_str(s.trim()).ok())
                .collect();
            tracing::info!("CORS allowed origins: {:?}", origins);
            CorsLayer::new().allow_origin(origins)
        };
        layer
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PUT,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers(tower_http::cors::Any)
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "server started");

    axum::serve(
        tokio::net::TcpListener::bind(addr).await.unwrap(),
        app.into_make_service(),
    )
    .await
    .unwrap();
}

async fn healthz() -> Json<ApiStatus> {
    Json(ApiStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
