#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the campus air prediction engine.
//!
//! Opens the historical `SQLite` store, trains a [`PredictionEngine`] from
//! it, and serves forecasts, anomaly scans, model metadata, and energy
//! estimates as JSON under `/api`.

mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use campus_air_database::db;
use campus_air_ml::{DatabaseProvider, PredictionEngine};
use switchy_database::Database;

/// Port the server listens on when `PORT` is unset or invalid.
pub const DEFAULT_PORT: u16 = 8000;

/// Shared application state.
pub struct AppState {
    /// Historical store, used for health checks.
    pub db: Arc<dyn Database>,
    /// Trained prediction engine.
    pub engine: Arc<PredictionEngine>,
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route(
                "/ml/air-quality-forecast",
                web::get().to(handlers::air_quality_forecast),
            )
            .route("/ml/anomalies", web::get().to(handlers::anomalies))
            .route("/ml/model-info", web::get().to(handlers::model_info))
            .route(
                "/ml/energy-forecast",
                web::get().to(handlers::energy_forecast),
            ),
    );
}

/// Starts the campus air API server.
///
/// Connects to the historical store, trains the prediction engine, and
/// starts the Actix-Web HTTP server. The caller provides the async runtime
/// (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
///
/// # Panics
///
/// Panics if the historical store cannot be opened.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    log::info!("Connecting to database...");
    let db_conn: Arc<dyn Database> =
        Arc::from(db::connect_from_env().expect("Failed to connect to database"));

    log::info!("Training prediction engine...");
    let provider = Arc::new(DatabaseProvider::new(Arc::clone(&db_conn)));
    let engine = PredictionEngine::new(provider).await;

    let state = web::Data::new(AppState {
        db: db_conn,
        engine: Arc::new(engine),
    });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

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
    .await
}
