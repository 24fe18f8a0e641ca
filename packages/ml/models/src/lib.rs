#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Result types produced by the campus air prediction engine.
//!
//! Every public engine operation returns one of these structurally valid
//! values, never an error. The `model`, `confidence`, and `note` fields let
//! consumers tell a degraded answer apart from a nominal one.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Score below which a flagged reading is [`AnomalySeverity::High`].
pub const HIGH_SEVERITY_SCORE: f64 = -0.5;

/// Score below which a flagged reading is at least
/// [`AnomalySeverity::Medium`].
pub const MEDIUM_SEVERITY_SCORE: f64 = -0.3;

/// Which forecasting strategy produced a [`ForecastPoint`], ordered from
/// highest to lowest fidelity.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum ForecastModel {
    /// Trained regression forest over calendar features.
    #[serde(rename = "Random Forest")]
    #[strum(serialize = "Random Forest")]
    RandomForest,
    /// Jittered mean of the most recent week of readings.
    #[serde(rename = "Historical Average")]
    #[strum(serialize = "Historical Average")]
    HistoricalAverage,
    /// Static values used when nothing else is available.
    #[serde(rename = "Baseline")]
    #[strum(serialize = "Baseline")]
    Baseline,
}

impl ForecastModel {
    /// Confidence attached to every point produced by this strategy.
    #[must_use]
    pub const fn confidence(self) -> f64 {
        match self {
            Self::RandomForest => 0.85,
            Self::HistoricalAverage => 0.70,
            Self::Baseline => 0.50,
        }
    }

    /// Human-readable note attached to every point produced by this
    /// strategy.
    #[must_use]
    pub const fn note(self) -> &'static str {
        match self {
            Self::RandomForest => "Prediction based on trained ML model",
            Self::HistoricalAverage => "Prediction based on recent historical averages",
            Self::Baseline => "Default baseline prediction",
        }
    }
}

/// A single day of the air quality forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Forecast date (`YYYY-MM-DD`).
    pub date: NaiveDate,
    /// Predicted PM2.5 concentration, rounded to 2 decimals.
    pub predicted_pm25: f64,
    /// Predicted PM10 concentration, rounded to 2 decimals.
    pub predicted_pm10: f64,
    /// Predicted US AQI, rounded to the nearest integer.
    pub predicted_aqi: i64,
    /// Strategy confidence in `[0, 1]`.
    pub confidence: f64,
    /// Strategy that produced this point.
    pub model: ForecastModel,
    /// Human-readable provenance note.
    pub note: String,
}

/// Data categories the anomaly scanner understands.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DataCategory {
    /// Hourly air quality readings.
    AirQuality,
}

/// Severity of a flagged reading.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AnomalySeverity {
    /// Flagged, but close to the inlier boundary.
    Low,
    /// Score in `[-0.5, -0.3)`.
    Medium,
    /// Score below `-0.5`.
    High,
}

impl AnomalySeverity {
    /// Classifies an anomaly score (more negative = more anomalous).
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score < HIGH_SEVERITY_SCORE {
            Self::High
        } else if score < MEDIUM_SEVERITY_SCORE {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Feature values of a flagged reading, rounded to 2 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyValues {
    /// PM2.5 concentration.
    pub pm2_5: f64,
    /// PM10 concentration.
    pub pm10: f64,
    /// US AQI.
    pub us_aqi: f64,
    /// Ozone concentration.
    pub ozone: f64,
}

/// A reading the anomaly model labeled as an outlier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    /// Reading timestamp as stored.
    pub timestamp: String,
    /// Data category the reading belongs to.
    #[serde(rename = "type")]
    pub kind: DataCategory,
    /// Severity derived from `anomaly_score`.
    pub severity: AnomalySeverity,
    /// Isolation score, rounded to 3 decimals.
    pub anomaly_score: f64,
    /// Feature values of the reading.
    pub values: AnomalyValues,
    /// Human-readable description.
    pub description: String,
}

/// Result of one anomaly scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    /// Requested category, echoed back even when unsupported.
    pub data_type: String,
    /// Number of flagged readings before truncation.
    pub anomalies_detected: usize,
    /// At most ten flagged readings, in recency order.
    pub anomalies: Vec<AnomalyRecord>,
    /// Number of complete readings that were scored.
    pub total_samples_analyzed: usize,
    /// When the scan ran.
    pub last_check: DateTime<Utc>,
    /// Model label, `"Not available"` for empty reports.
    pub model: String,
    /// Human-readable provenance note.
    pub note: String,
}

impl AnomalyReport {
    /// Model label carried by empty reports.
    pub const NOT_AVAILABLE: &'static str = "Not available";

    /// Builds the report returned when nothing could be scored.
    #[must_use]
    pub fn empty(data_type: &str, checked_at: DateTime<Utc>) -> Self {
        Self {
            data_type: data_type.to_string(),
            anomalies_detected: 0,
            anomalies: Vec::new(),
            total_samples_analyzed: 0,
            last_check: checked_at,
            model: Self::NOT_AVAILABLE.to_string(),
            note: "Insufficient data or model not trained".to_string(),
        }
    }
}

/// Which models the engine currently holds.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EngineState {
    /// Neither model is available.
    Untrained,
    /// Only the forecast model is available.
    ForecastOnly,
    /// Only the anomaly model is available (typically after a lazy fit).
    AnomalyOnly,
    /// Both models are available.
    Full,
}

impl EngineState {
    /// Derives the state from model presence.
    #[must_use]
    pub const fn from_presence(forecast: bool, anomaly: bool) -> Self {
        match (forecast, anomaly) {
            (false, false) => Self::Untrained,
            (true, false) => Self::ForecastOnly,
            (false, true) => Self::AnomalyOnly,
            (true, true) => Self::Full,
        }
    }

    /// Whether the forecast model is present.
    #[must_use]
    pub const fn is_trained(self) -> bool {
        matches!(self, Self::ForecastOnly | Self::Full)
    }

    /// Whether the anomaly model is present.
    #[must_use]
    pub const fn has_anomaly_model(self) -> bool {
        matches!(self, Self::AnomalyOnly | Self::Full)
    }
}

/// Metadata for one logical model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Whether the model is ready to serve.
    pub loaded: bool,
    /// Model family label.
    #[serde(rename = "type")]
    pub model_type: String,
    /// `"Active"` or `"Not trained"`.
    pub status: String,
    /// Input features.
    pub features: Vec<String>,
    /// Predicted targets, for regressors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<String>>,
    /// Configured contamination fraction, for the anomaly model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contamination: Option<f64>,
    /// Additional remarks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// The three logical model slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSlots {
    /// Calendar-feature regression forest.
    pub air_quality_forecaster: ModelInfo,
    /// Pattern-based energy usage generator.
    pub energy_predictor: ModelInfo,
    /// Isolation forest over pollutant readings.
    pub anomaly_detector: ModelInfo,
}

/// Provenance of the training run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingDataInfo {
    /// Upper bound of records requested from the store.
    pub max_records: u32,
    /// Cleaned rows the forecast model was fitted on.
    pub samples_used: Option<usize>,
    /// When the forecast model was fitted.
    pub last_trained: Option<DateTime<Utc>>,
}

/// Engine health and model metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// `"active"` when trained, else `"training_required"`.
    pub status: String,
    /// Which models are present.
    pub state: EngineState,
    /// Per-model details.
    pub models: ModelSlots,
    /// Training provenance.
    pub training_data: TrainingDataInfo,
    /// Additional remarks.
    pub note: String,
}

/// Multiplicative factors applied to the energy baseline for one hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyFactors {
    /// Time-of-day factor, rounded to 2 decimals.
    pub time_of_day: f64,
    /// Weekday/weekend factor.
    pub day_of_week: f64,
    /// Seasonal factor.
    pub seasonal: f64,
}

/// One hour of the campus energy usage forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyPoint {
    /// Start of the forecast hour.
    pub timestamp: DateTime<Utc>,
    /// Predicted usage, rounded to 2 decimals.
    pub predicted_usage_kwh: f64,
    /// Fixed confidence of the pattern model.
    pub confidence: f64,
    /// Factors that produced the prediction.
    pub factors: EnergyFactors,
    /// Model label.
    pub model: String,
    /// Human-readable provenance note.
    pub note: String,
}
