#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for pothole report submission.
//!
//! The server is the authoritative territory check: a report whose
//! coordinates fall outside Portugal is rejected with `400` no matter what
//! the client did. Accepted reports are reverse geocoded on the spot with
//! the same normalizer the backfill uses; anything that does not resolve is
//! stored `pending` for the next backfill run.
//!
//! The geocoding proxy endpoints (`/api/geocode/reverse`,
//! `/api/geocode/search`) let the frontend reuse the server's provider
//! configuration instead of calling Nominatim directly.

mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpResponse, HttpServer, error, middleware, web};
use road_watch_database::PotholeStore;
use road_watch_database::duck::DuckDbStore;
use road_watch_geocoder::nominatim::NominatimClient;
use road_watch_geocoder::service_registry::NominatimConfig;
use road_watch_server_models::ApiError;

/// Shared application state.
pub struct AppState {
    /// Report storage.
    pub store: Arc<dyn PotholeStore>,
    /// Reverse/forward geocoder. `None` disables submission-time geocoding
    /// and makes the proxy endpoints answer `503`.
    pub geocoder: Option<NominatimClient>,
}

/// Registers the `/api` routes and JSON error handling.
pub fn configure(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        let message = format!("Invalid request body: {err}");
        error::InternalError::from_response(
            err,
            HttpResponse::BadRequest().json(ApiError::new(message)),
        )
        .into()
    });

    let query_config = web::QueryConfig::default().error_handler(|err, _req| {
        let message = format!("Invalid query parameters: {err}");
        error::InternalError::from_response(
            err,
            HttpResponse::BadRequest().json(ApiError::new(message)),
        )
        .into()
    });

    cfg.app_data(json_config).app_data(query_config).service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/potholes", web::get().to(handlers::list_potholes))
            .route("/potholes", web::post().to(handlers::create_pothole))
            .route("/geocode/reverse", web::get().to(handlers::reverse_geocode))
            .route("/geocode/search", web::get().to(handlers::search)),
    );
}

/// Opens the report store.
///
/// `ROAD_WATCH_DUCKDB`, when set, selects a local `DuckDB` file; otherwise
/// Postgres is reached through `DATABASE_URL`.
async fn open_store() -> Result<Arc<dyn PotholeStore>, Box<dyn std::error::Error>> {
    if let Ok(path) = std::env::var("ROAD_WATCH_DUCKDB")
        && !path.trim().is_empty()
    {
        log::info!("Opening DuckDB store at {path}...");
        return Ok(Arc::new(DuckDbStore::open(std::path::Path::new(&path))?));
    }

    log::info!("Connecting to database...");
    Ok(Arc::new(road_watch_database::db::connect_from_env().await?))
}

/// Starts the road watch API server.
///
/// Opens the store, ensures the schema, builds the geocoder from the
/// embedded service registry, and serves until shut down. The caller
/// provides the async runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an error if the store cannot be opened, the schema cannot be
/// created, or the HTTP server fails to bind.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let store = open_store().await?;
    store.ensure_schema().await?;

    let geocoder = match NominatimConfig::from_registry().and_then(NominatimClient::new) {
        Ok(client) => {
            log::info!("Geocoding via {}", client.config().base_url);
            Some(client)
        }
        Err(e) => {
            log::warn!("Geocoding disabled: {e}");
            None
        }
    };

    let state = web::Data::new(AppState { store, geocoder });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await?;

    Ok(())
}
