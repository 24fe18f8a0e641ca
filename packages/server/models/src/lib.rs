#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the campus air server.
//!
//! Keys are `snake_case` to match the engine's result types, which are
//! returned to clients as-is.

use campus_air_ml_models::ForecastPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of forecast days.
pub const DEFAULT_FORECAST_DAYS: u32 = 7;
/// Largest accepted number of forecast days.
pub const MAX_FORECAST_DAYS: u32 = 30;
/// Default number of energy forecast hours.
pub const DEFAULT_ENERGY_HOURS: u32 = 24;
/// Largest accepted number of energy forecast hours.
pub const MAX_ENERGY_HOURS: u32 = 168;
/// Category scanned when none is given.
pub const DEFAULT_DATA_TYPE: &str = "air_quality";

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    /// `"healthy"` when the store answers, else `"degraded"`.
    pub status: String,
    /// When the check ran.
    pub timestamp: DateTime<Utc>,
    /// Whether the store answered a trivial query.
    pub database_connected: bool,
    /// Server version.
    pub version: String,
}

/// Query parameters for the air quality forecast endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForecastQueryParams {
    /// Days to forecast, 1 to 30.
    pub days: Option<u32>,
}

/// Query parameters for the anomaly endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnomalyQueryParams {
    /// Data category to scan.
    pub data_type: Option<String>,
}

/// Query parameters for the energy forecast endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnergyQueryParams {
    /// Hours to forecast, 1 to 168.
    pub hours: Option<u32>,
}

/// Air quality forecast response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiForecastResponse {
    /// One point per day, in date order.
    pub predictions: Vec<ForecastPoint>,
    /// Number of days requested.
    pub days: u32,
    /// Provenance remark.
    pub note: String,
}

/// Error body for rejected requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// What was wrong with the request.
    pub error: String,
}

/// Checks that `value` lies in `1..=max`.
///
/// # Errors
///
/// Returns an [`ApiError`] naming the parameter when it is out of range.
pub fn validate_range(name: &str, value: u32, max: u32) -> Result<u32, ApiError> {
    if (1..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ApiError {
            error: format!("{name} must be between 1 and {max}, got {value}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_validation() {
        assert_eq!(validate_range("days", 1, MAX_FORECAST_DAYS).unwrap(), 1);
        assert_eq!(validate_range("days", 30, MAX_FORECAST_DAYS).unwrap(), 30);
        assert!(validate_range("days", 0, MAX_FORECAST_DAYS).is_err());
        let err = validate_range("hours", 169, MAX_ENERGY_HOURS).unwrap_err();
        assert_eq!(err.error, "hours must be between 1 and 168, got 169");
    }

    #[test]
    fn anomaly_params_deserialize() {
        let params: AnomalyQueryParams =
            serde_json::from_str(r#"{"data_type":"weather"}"#).unwrap();
        assert_eq!(params.data_type.as_deref(), Some("weather"));
        let empty: AnomalyQueryParams = serde_json::from_str("{}").unwrap();
        assert!(empty.data_type.is_none());
    }
}
