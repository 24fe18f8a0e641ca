//! HTTP handler functions for the campus air API.

use actix_web::{HttpResponse, web};
use campus_air_database::queries;
use campus_air_server_models::{
    AnomalyQueryParams, ApiForecastResponse, ApiHealth, DEFAULT_DATA_TYPE, DEFAULT_ENERGY_HOURS,
    DEFAULT_FORECAST_DAYS, EnergyQueryParams, ForecastQueryParams, MAX_ENERGY_HOURS,
    MAX_FORECAST_DAYS, validate_range,
};
use chrono::Utc;

use crate::AppState;

const FORECAST_NOTE: &str =
    "Each prediction names the model tier that produced it; lower tiers are used when data is missing";

/// `GET /api/health`
///
/// Reports whether the historical store answers a trivial query.
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let database_connected = match queries::ping(state.db.as_ref()).await {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Health check query failed: {e}");
            false
        }
    };

    HttpResponse::Ok().json(ApiHealth {
        status: if database_connected {
            "healthy"
        } else {
            "degraded"
        }
        .to_string(),
        timestamp: Utc::now(),
        database_connected,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/ml/air-quality-forecast`
///
/// Forecasts `days` (default 7, at most 30) days starting today.
pub async fn air_quality_forecast(
    state: web::Data<AppState>,
    params: web::Query<ForecastQueryParams>,
) -> HttpResponse {
    let days = match validate_range(
        "days",
        params.days.unwrap_or(DEFAULT_FORECAST_DAYS),
        MAX_FORECAST_DAYS,
    ) {
        Ok(days) => days,
        Err(e) => return HttpResponse::BadRequest().json(e),
    };

    let predictions = state.engine.predict_forecast(days as usize).await;

    HttpResponse::Ok().json(ApiForecastResponse {
        predictions,
        days,
        note: FORECAST_NOTE.to_string(),
    })
}

/// `GET /api/ml/anomalies`
///
/// Scans the most recent readings of `data_type` (default `air_quality`).
pub async fn anomalies(
    state: web::Data<AppState>,
    params: web::Query<AnomalyQueryParams>,
) -> HttpResponse {
    let data_type = params.data_type.as_deref().unwrap_or(DEFAULT_DATA_TYPE);
    HttpResponse::Ok().json(state.engine.scan_anomalies(data_type).await)
}

/// `GET /api/ml/model-info`
pub async fn model_info(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.engine.describe_models())
}

/// `GET /api/ml/energy-forecast`
///
/// Estimates hourly usage for `hours` (default 24, at most 168) hours.
pub async fn energy_forecast(
    state: web::Data<AppState>,
    params: web::Query<EnergyQueryParams>,
) -> HttpResponse {
    let hours = match validate_range(
        "hours",
        params.hours.unwrap_or(DEFAULT_ENERGY_HOURS),
        MAX_ENERGY_HOURS,
    ) {
        Ok(hours) => hours,
        Err(e) => return HttpResponse::BadRequest().json(e),
    };

    HttpResponse::Ok().json(state.engine.predict_energy(hours as usize))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{App, http::StatusCode, test};
    use campus_air_ml::{DatabaseProvider, PredictionEngine};
    use serde_json::Value;
    use switchy_database::Database;
    use switchy_database_connection::init_sqlite_rusqlite;

    use super::*;

    async fn state(name: &str) -> web::Data<AppState> {
        let path = std::env::temp_dir().join(format!("campus_air_server_{name}.db"));
        let _ = std::fs::remove_file(&path);

        let db: Arc<dyn Database> = Arc::from(init_sqlite_rusqlite(Some(&path)).unwrap());
        db.exec_raw(
            "CREATE TABLE historical_air_quality_data (
                date TEXT NOT NULL, pm2_5 REAL, pm10 REAL, carbon_monoxide REAL,
                nitrogen_dioxide REAL, sulphur_dioxide REAL, ozone REAL, us_aqi INTEGER
            )",
        )
        .await
        .unwrap();
        db.exec_raw(
            "INSERT INTO historical_air_quality_data
                (date, pm2_5, pm10, carbon_monoxide, nitrogen_dioxide,
                 sulphur_dioxide, ozone, us_aqi)
             VALUES
                ('2024-05-01 00:00:00', 4.0, 6.0, 120.0, 8.0, 1.0, 60.0, 20),
                ('2024-05-01 01:00:00', 6.0, 10.0, 130.0, 9.5, 1.2, 70.0, 40)",
        )
        .await
        .unwrap();

        let provider = Arc::new(DatabaseProvider::new(Arc::clone(&db)));
        let engine = PredictionEngine::new(provider).await;

        web::Data::new(AppState {
            db,
            engine: Arc::new(engine),
        })
    }

    async fn get(state: web::Data<AppState>, uri: &str) -> (StatusCode, Value) {
        let app = test::init_service(App::new().app_data(state).configure(crate::configure)).await;
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        let status = resp.status();
        let body = test::read_body(resp).await;
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    #[actix_web::test]
    async fn health_reports_connected_store() {
        let (status, body) = get(state("health").await, "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database_connected"], true);
    }

    #[actix_web::test]
    async fn forecast_defaults_to_seven_days() {
        let (status, body) = get(
            state("forecast_default").await,
            "/api/ml/air-quality-forecast",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["days"], 7);
        let predictions = body["predictions"].as_array().unwrap();
        assert_eq!(predictions.len(), 7);
        // Two readings are too few to train, so the recent average is used.
        assert_eq!(predictions[0]["model"], "Historical Average");
        assert_eq!(predictions[0]["confidence"], 0.7);
    }

    #[actix_web::test]
    async fn forecast_rejects_out_of_range_days() {
        let (status, body) = get(
            state("forecast_range").await,
            "/api/ml/air-quality-forecast?days=31",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "days must be between 1 and 30, got 31");

        let (status, _) = get(
            state("forecast_zero").await,
            "/api/ml/air-quality-forecast?days=0",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn anomalies_for_unknown_category_are_empty() {
        let (status, body) = get(
            state("anomalies_weather").await,
            "/api/ml/anomalies?data_type=weather",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data_type"], "weather");
        assert_eq!(body["anomalies_detected"], 0);
        assert_eq!(body["model"], "Not available");
    }

    #[actix_web::test]
    async fn anomalies_default_to_air_quality() {
        let (status, body) = get(state("anomalies_default").await, "/api/ml/anomalies").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data_type"], "air_quality");
        // Too few readings for a lazy fit.
        assert_eq!(body["model"], "Not available");
    }

    #[actix_web::test]
    async fn model_info_reports_untrained_engine() {
        let (status, body) = get(state("model_info").await, "/api/ml/model-info").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "training_required");
        assert_eq!(body["state"], "untrained");
        assert_eq!(body["models"]["energy_predictor"]["loaded"], true);
        assert_eq!(body["models"]["anomaly_detector"]["contamination"], 0.1);
    }

    #[actix_web::test]
    async fn energy_forecast_validates_hours() {
        let (status, body) = get(
            state("energy_ok").await,
            "/api/ml/energy-forecast?hours=6",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 6);
        assert_eq!(body[0]["model"], "Pattern-based Regression");

        let (status, _) = get(
            state("energy_range").await,
            "/api/ml/energy-forecast?hours=169",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
