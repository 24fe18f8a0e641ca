#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Air quality forecasting and anomaly detection engine.
//!
//! A [`PredictionEngine`] trains a calendar-feature regression forest and an
//! isolation forest from the most recent readings of a
//! [`HistoricalDataProvider`] when it is constructed. Afterwards it serves
//! daily forecasts, anomaly scans, model metadata, and hourly energy
//! estimates. None of those operations fail: when data or models are
//! missing they degrade to a lower-fidelity answer whose `model`,
//! `confidence`, and `note` fields say so.

pub mod anomaly;
pub mod energy;
pub mod features;
pub mod forecast;
pub mod forest;
pub mod isolation;
pub mod provider;
pub mod status;
pub mod train;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use campus_air_ml_models::{
    AnomalyReport, EnergyPoint, EngineState, ForecastPoint, ModelMetadata,
};
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use tokio::sync::OnceCell;

pub use forecast::{FallbackReason, ForecastGenerator};
pub use forest::{ForestParams, RegressionForest};
pub use isolation::{IsolationForest, IsolationParams, Verdict};
pub use provider::{DatabaseProvider, HistoricalDataProvider, ProviderError};

/// Errors raised while fitting or evaluating a model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// No rows (or no trees) to work with.
    #[error("No data to fit or evaluate")]
    EmptyData,

    /// Feature and target tables have different lengths.
    #[error("Row count mismatch: {features} feature rows, {targets} target rows")]
    RowCountMismatch {
        /// Number of feature rows.
        features: usize,
        /// Number of target rows.
        targets: usize,
    },

    /// A row does not have the width the model was fitted on.
    #[error("Expected {expected} features, got {actual}")]
    FeatureCount {
        /// Width the model was fitted on.
        expected: usize,
        /// Width of the offending row.
        actual: usize,
    },

    /// A value is NaN or infinite.
    #[error("Non-finite value in input")]
    NonFinite,

    /// A hyperparameter is out of range.
    #[error("Invalid value for {name}: {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Rejected value.
        value: f64,
    },
}

/// Errors raised inside the engine.
///
/// These never escape a public engine operation. They are logged and
/// resolved to a lower forecast tier, an empty report, or the untrained
/// state.
#[derive(Debug, Error)]
pub enum PredictError {
    /// Too few usable rows to fit a model.
    #[error("Insufficient data for {stage}: {found} rows, need {required}")]
    InsufficientData {
        /// Which table came up short.
        stage: &'static str,
        /// Rows available.
        found: usize,
        /// Rows required.
        required: usize,
    },

    /// The historical data provider failed.
    #[error(transparent)]
    Upstream(#[from] ProviderError),

    /// Fitting or evaluating a model failed.
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// A blocking fit task panicked or was cancelled.
    #[error("Fit task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Engine tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Records requested from the provider for training.
    pub training_limit: u32,
    /// Raw records required before training is attempted.
    pub min_raw_records: usize,
    /// Complete rows required to fit either model.
    pub min_clean_rows: usize,
    /// Forecast forest hyperparameters.
    pub forest: ForestParams,
    /// Anomaly forest hyperparameters.
    pub isolation: IsolationParams,
    /// Records averaged by the historical-average forecast.
    pub recent_average_limit: u32,
    /// Standard deviation of the per-day historical-average jitter.
    pub jitter_std_dev: f64,
    /// Records fetched per anomaly scan.
    pub scan_limit: u32,
    /// Most recent records scored per anomaly scan.
    pub scan_window: usize,
    /// Flagged records listed in an anomaly report.
    pub max_reported_anomalies: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            training_limit: 5000,
            min_raw_records: 100,
            min_clean_rows: 50,
            forest: ForestParams::default(),
            isolation: IsolationParams::default(),
            recent_average_limit: 168,
            jitter_std_dev: 0.15,
            scan_limit: 500,
            scan_window: 48,
            max_reported_anomalies: 10,
        }
    }
}

/// Rounds half away from zero to `decimals` places.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Trained models plus the provider they were trained from.
///
/// Shared behind an `Arc` once constructed. Every operation takes `&self`;
/// the only mutation after construction is the lazy anomaly fit, which is
/// guarded by a single-fit cell.
pub struct PredictionEngine {
    provider: Arc<dyn HistoricalDataProvider>,
    config: EngineConfig,
    forecast_model: Option<RegressionForest>,
    anomaly_model: OnceCell<IsolationForest>,
    generator: ForecastGenerator,
    samples_used: Option<usize>,
    trained_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for PredictionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionEngine")
            .field("state", &self.state())
            .field("samples_used", &self.samples_used)
            .field("trained_at", &self.trained_at)
            .finish_non_exhaustive()
    }
}

impl PredictionEngine {
    /// Trains an engine with the default configuration.
    ///
    /// Never fails: training problems are logged and leave the engine
    /// untrained.
    pub async fn new(provider: Arc<dyn HistoricalDataProvider>) -> Self {
        Self::with_config(provider, EngineConfig::default()).await
    }

    /// Trains an engine with a custom configuration.
    pub async fn with_config(
        provider: Arc<dyn HistoricalDataProvider>,
        config: EngineConfig,
    ) -> Self {
        let trained = train::train(provider.as_ref(), &config).await;

        let engine = Self {
            provider,
            config,
            forecast_model: trained.forecaster,
            anomaly_model: OnceCell::new_with(trained.anomaly),
            generator: ForecastGenerator::default(),
            samples_used: trained.samples_used,
            trained_at: trained.trained_at,
        };

        log::info!("Prediction engine ready: {}", engine.state());
        engine
    }

    /// Which models are currently present.
    #[must_use]
    pub fn state(&self) -> EngineState {
        EngineState::from_presence(
            self.forecast_model.is_some(),
            self.anomaly_model.initialized(),
        )
    }

    /// The configuration the engine was built with.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Forecasts `days` consecutive days starting today (UTC).
    pub async fn predict_forecast(&self, days: usize) -> Vec<ForecastPoint> {
        self.predict_forecast_from(Utc::now().date_naive(), days).await
    }

    /// Forecasts `days` consecutive days starting at `start`.
    pub async fn predict_forecast_from(&self, start: NaiveDate, days: usize) -> Vec<ForecastPoint> {
        let dates: Vec<NaiveDate> = start.iter_days().take(days).collect();
        if dates.is_empty() {
            return Vec::new();
        }

        let ctx = forecast::ForecastContext {
            provider: self.provider.as_ref(),
            model: self.forecast_model.as_ref(),
            config: &self.config,
        };
        self.generator.generate(&ctx, &dates).await
    }

    /// Scans the most recent readings of `category` for anomalies.
    ///
    /// Unsupported categories and every failure yield an empty report.
    pub async fn scan_anomalies(&self, category: &str) -> AnomalyReport {
        anomaly::scan(
            self.provider.as_ref(),
            &self.anomaly_model,
            &self.config,
            category,
        )
        .await
    }

    /// Reports engine health and per-model metadata.
    #[must_use]
    pub fn describe_models(&self) -> ModelMetadata {
        status::describe(
            self.state(),
            &self.config,
            self.samples_used,
            self.trained_at,
        )
    }

    /// Estimates hourly campus energy usage for the next `hours` hours.
    #[must_use]
    pub fn predict_energy(&self, hours: usize) -> Vec<EnergyPoint> {
        energy::predict_energy(Utc::now(), hours)
    }
}
