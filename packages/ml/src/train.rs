//! Startup training of the forecast and anomaly models.

use chrono::{DateTime, Utc};

use crate::features::{TARGET_FIELDS, TrainingSet, build_anomaly_matrix, build_training_set};
use crate::forest::{ForestParams, RegressionForest};
use crate::isolation::{IsolationForest, IsolationParams};
use crate::provider::HistoricalDataProvider;
use crate::{EngineConfig, ModelError, PredictError};

/// Models produced by a training run, plus its provenance.
#[derive(Debug, Default)]
pub struct TrainedModels {
    /// Calendar-feature forecast forest.
    pub forecaster: Option<RegressionForest>,
    /// Anomaly forest fitted on the same records.
    pub anomaly: Option<IsolationForest>,
    /// Rows the forecaster was fitted on.
    pub samples_used: Option<usize>,
    /// When the forecaster was fitted.
    pub trained_at: Option<DateTime<Utc>>,
}

/// Trains both models from the provider's most recent records.
///
/// Never fails: any problem is logged and yields untrained models.
pub async fn train(provider: &dyn HistoricalDataProvider, config: &EngineConfig) -> TrainedModels {
    match try_train(provider, config).await {
        Ok(models) => models,
        Err(PredictError::InsufficientData {
            stage,
            found,
            required,
        }) => {
            log::warn!(
                "Not enough data to train ({stage}: {found} of {required}), running untrained"
            );
            TrainedModels::default()
        }
        Err(e) => {
            log::warn!("Training failed, running untrained: {e}");
            TrainedModels::default()
        }
    }
}

/// Trains both models, surfacing the reason training was abandoned.
///
/// # Errors
///
/// Returns [`PredictError`] if the provider fails, too few usable rows
/// remain, or the forecast fit fails.
pub async fn try_train(
    provider: &dyn HistoricalDataProvider,
    config: &EngineConfig,
) -> Result<TrainedModels, PredictError> {
    let records = provider.get_recent(config.training_limit).await?;
    log::info!("Loaded {} records for training", records.len());

    if records.len() < config.min_raw_records {
        return Err(PredictError::InsufficientData {
            stage: "raw records",
            found: records.len(),
            required: config.min_raw_records,
        });
    }

    let set = build_training_set(&records, TARGET_FIELDS);
    if set.len() < config.min_clean_rows {
        return Err(PredictError::InsufficientData {
            stage: "training rows",
            found: set.len(),
            required: config.min_clean_rows,
        });
    }

    let anomaly_rows = build_anomaly_matrix(&records);
    let samples_used = set.len();
    let min_clean_rows = config.min_clean_rows;
    let forest_params = config.forest.clone();
    let isolation_params = config.isolation.clone();

    let (forecaster, anomaly) = tokio::task::spawn_blocking(move || {
        fit_models(
            &set,
            &anomaly_rows,
            min_clean_rows,
            &forest_params,
            &isolation_params,
        )
    })
    .await??;

    log::info!(
        "Trained forecast model on {samples_used} rows (anomaly model: {})",
        if anomaly.is_some() { "ready" } else { "deferred" }
    );

    Ok(TrainedModels {
        forecaster: Some(forecaster),
        anomaly,
        samples_used: Some(samples_used),
        trained_at: Some(Utc::now()),
    })
}

/// Fits the forecaster, and the anomaly model when enough complete rows
/// exist. An anomaly fit failure leaves that model to a later lazy fit.
fn fit_models(
    set: &TrainingSet,
    anomaly_rows: &[Vec<f64>],
    min_clean_rows: usize,
    forest_params: &ForestParams,
    isolation_params: &IsolationParams,
) -> Result<(RegressionForest, Option<IsolationForest>), ModelError> {
    let forecaster = RegressionForest::fit(&set.features, &set.targets, forest_params)?;

    let anomaly = if anomaly_rows.len() >= min_clean_rows {
        match IsolationForest::fit(anomaly_rows, isolation_params) {
            Ok(model) => Some(model),
            Err(e) => {
                log::warn!("Anomaly model fit failed: {e}");
                None
            }
        }
    } else {
        log::debug!(
            "Skipping anomaly model: {} complete rows, need {min_clean_rows}",
            anomaly_rows.len()
        );
        None
    };

    Ok((forecaster, anomaly))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingProvider, StaticProvider, synthetic_records};

    fn config() -> EngineConfig {
        EngineConfig {
            forest: ForestParams {
                n_trees: 5,
                ..ForestParams::default()
            },
            isolation: IsolationParams {
                n_trees: 20,
                ..IsolationParams::default()
            },
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn trains_both_models() {
        let provider = StaticProvider::new(synthetic_records(200));

        let models = try_train(&provider, &config()).await.unwrap();

        assert!(models.forecaster.is_some());
        assert!(models.anomaly.is_some());
        assert_eq!(models.samples_used, Some(200));
        assert!(models.trained_at.is_some());
    }

    #[tokio::test]
    async fn too_few_raw_records() {
        let provider = StaticProvider::new(synthetic_records(80));

        let err = try_train(&provider, &config()).await.unwrap_err();

        assert!(matches!(
            err,
            PredictError::InsufficientData {
                stage: "raw records",
                found: 80,
                required: 100
            }
        ));
        assert!(train(&provider, &config()).await.forecaster.is_none());
    }

    #[tokio::test]
    async fn too_few_clean_rows() {
        let mut records = synthetic_records(120);
        for record in records.iter_mut().skip(40) {
            record.us_aqi = None;
        }
        let provider = StaticProvider::new(records);

        let err = try_train(&provider, &config()).await.unwrap_err();

        assert!(matches!(
            err,
            PredictError::InsufficientData {
                stage: "training rows",
                found: 40,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn anomaly_model_needs_its_own_complete_rows() {
        let mut records = synthetic_records(150);
        for record in records.iter_mut().skip(30) {
            record.ozone = None;
        }
        let provider = StaticProvider::new(records);

        let models = try_train(&provider, &config()).await.unwrap();

        assert!(models.forecaster.is_some());
        assert!(models.anomaly.is_none());
    }

    #[tokio::test]
    async fn provider_failure_is_swallowed() {
        let models = train(&FailingProvider, &config()).await;

        assert!(models.forecaster.is_none());
        assert!(models.anomaly.is_none());
        assert!(models.samples_used.is_none());
    }
}
