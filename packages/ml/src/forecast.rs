//! Tiered daily air quality forecasting.
//!
//! A [`ForecastGenerator`] holds an ordered list of strategies, highest
//! fidelity first. Each call walks the list until a strategy produces a
//! full forecast; the choice is never cached between calls.

use campus_air_database_models::{AirQualityField, HistoricalRecord};
use campus_air_ml_models::{ForecastModel, ForecastPoint};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng as _};
use rand_distr::StandardNormal;
use thiserror::Error;

use crate::features::FeatureRow;
use crate::forest::RegressionForest;
use crate::provider::{HistoricalDataProvider, ProviderError};
use crate::{EngineConfig, ModelError, round_to};

/// PM2.5 used when no reading is available.
pub const DEFAULT_PM25: f64 = 5.0;
/// PM10 used when no reading is available.
pub const DEFAULT_PM10: f64 = 8.0;
/// US AQI used when no reading is available.
pub const DEFAULT_AQI: f64 = 30.0;

/// Why a strategy declined to forecast.
#[derive(Debug, Error)]
pub enum FallbackReason {
    /// The forecast model is not trained.
    #[error("Forecast model not trained")]
    Untrained,

    /// The forecast model failed to evaluate.
    #[error("Model evaluation failed: {0}")]
    Evaluation(#[from] ModelError),

    /// Recent readings could not be fetched.
    #[error("Recent readings unavailable: {0}")]
    Upstream(#[from] ProviderError),
}

/// What a strategy may draw on.
pub struct ForecastContext<'a> {
    /// Source of recent readings.
    pub provider: &'a dyn HistoricalDataProvider,
    /// The trained forecast forest, if any.
    pub model: Option<&'a RegressionForest>,
    /// Engine tunables.
    pub config: &'a EngineConfig,
}

/// One tier of the forecast fallback chain.
#[async_trait::async_trait]
pub trait ForecastStrategy: Send + Sync {
    /// Model label of the points this strategy produces.
    fn model(&self) -> ForecastModel;

    /// Forecasts one point per date, or declines for the whole call.
    ///
    /// # Errors
    ///
    /// Returns [`FallbackReason`] when the next tier should be tried.
    async fn forecast(
        &self,
        ctx: &ForecastContext<'_>,
        dates: &[NaiveDate],
    ) -> Result<Vec<ForecastPoint>, FallbackReason>;
}

#[allow(clippy::cast_possible_truncation)]
fn point(date: NaiveDate, model: ForecastModel, pm25: f64, pm10: f64, aqi: f64) -> ForecastPoint {
    ForecastPoint {
        date,
        predicted_pm25: round_to(pm25, 2),
        predicted_pm10: round_to(pm10, 2),
        predicted_aqi: aqi.round() as i64,
        confidence: model.confidence(),
        model,
        note: model.note().to_string(),
    }
}

/// Evaluates the trained forest at every hour of each date and averages.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrainedModelStrategy;

#[async_trait::async_trait]
impl ForecastStrategy for TrainedModelStrategy {
    fn model(&self) -> ForecastModel {
        ForecastModel::RandomForest
    }

    async fn forecast(
        &self,
        ctx: &ForecastContext<'_>,
        dates: &[NaiveDate],
    ) -> Result<Vec<ForecastPoint>, FallbackReason> {
        let model = ctx.model.ok_or(FallbackReason::Untrained)?;

        dates
            .iter()
            .map(|&date| {
                let rows: Vec<Vec<f64>> = (0..24)
                    .map(|hour| FeatureRow::for_date(date, hour).to_vec())
                    .collect();
                let means = model.predict_mean(&rows)?;
                match means.as_slice() {
                    [pm25, pm10, aqi] => Ok(point(date, self.model(), *pm25, *pm10, *aqi)),
                    other => Err(ModelError::FeatureCount {
                        expected: 3,
                        actual: other.len(),
                    }
                    .into()),
                }
            })
            .collect()
    }
}

/// Jitters the mean of the most recent readings per day.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoricalAverageStrategy;

#[allow(clippy::cast_precision_loss)]
fn mean_of(
    records: &[HistoricalRecord],
    field: AirQualityField,
    default: f64,
) -> f64 {
    let (sum, count) = records
        .iter()
        .filter_map(|r| r.get(field))
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        default
    } else {
        sum / count as f64
    }
}

#[async_trait::async_trait]
impl ForecastStrategy for HistoricalAverageStrategy {
    fn model(&self) -> ForecastModel {
        ForecastModel::HistoricalAverage
    }

    async fn forecast(
        &self,
        ctx: &ForecastContext<'_>,
        dates: &[NaiveDate],
    ) -> Result<Vec<ForecastPoint>, FallbackReason> {
        let records = ctx
            .provider
            .get_recent(ctx.config.recent_average_limit)
            .await?;

        let pm25 = mean_of(&records, AirQualityField::Pm25, DEFAULT_PM25);
        let pm10 = mean_of(&records, AirQualityField::Pm10, DEFAULT_PM10);
        let aqi = mean_of(&records, AirQualityField::UsAqi, DEFAULT_AQI);

        let mut rng = StdRng::from_entropy();
        let std_dev = ctx.config.jitter_std_dev;

        Ok(dates
            .iter()
            .map(|&date| {
                let variation: f64 = rng.sample::<f64, _>(StandardNormal) * std_dev;
                let scale = 1.0 + variation;
                point(date, self.model(), pm25 * scale, pm10 * scale, aqi * scale)
            })
            .collect())
    }
}

/// Static defaults; always succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaselineStrategy;

impl BaselineStrategy {
    fn points(dates: &[NaiveDate]) -> Vec<ForecastPoint> {
        dates
            .iter()
            .map(|&date| {
                point(
                    date,
                    ForecastModel::Baseline,
                    DEFAULT_PM25,
                    DEFAULT_PM10,
                    DEFAULT_AQI,
                )
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl ForecastStrategy for BaselineStrategy {
    fn model(&self) -> ForecastModel {
        ForecastModel::Baseline
    }

    async fn forecast(
        &self,
        _ctx: &ForecastContext<'_>,
        dates: &[NaiveDate],
    ) -> Result<Vec<ForecastPoint>, FallbackReason> {
        Ok(Self::points(dates))
    }
}

/// Ordered fallback chain of forecast strategies.
pub struct ForecastGenerator {
    tiers: Vec<Box<dyn ForecastStrategy>>,
}

impl Default for ForecastGenerator {
    fn default() -> Self {
        Self {
            tiers: vec![
                Box::new(TrainedModelStrategy),
                Box::new(HistoricalAverageStrategy),
                Box::new(BaselineStrategy),
            ],
        }
    }
}

impl ForecastGenerator {
    /// Model labels of the tiers, in the order they are tried.
    #[must_use]
    pub fn tiers(&self) -> Vec<ForecastModel> {
        self.tiers.iter().map(|tier| tier.model()).collect()
    }

    /// Forecasts one point per date with the first tier that succeeds.
    pub async fn generate(
        &self,
        ctx: &ForecastContext<'_>,
        dates: &[NaiveDate],
    ) -> Vec<ForecastPoint> {
        for tier in &self.tiers {
            match tier.forecast(ctx, dates).await {
                Ok(points) => return points,
                Err(FallbackReason::Untrained) => {
                    log::debug!("{} tier skipped: model not trained", tier.model());
                }
                Err(reason) => {
                    log::warn!("{} tier failed, falling back: {reason}", tier.model());
                }
            }
        }

        BaselineStrategy::points(dates)
    }
}
