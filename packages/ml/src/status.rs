//! Model metadata reporting.

use campus_air_ml_models::{EngineState, ModelInfo, ModelMetadata, ModelSlots, TrainingDataInfo};
use chrono::{DateTime, Utc};

use crate::EngineConfig;
use crate::anomaly::MODEL_LABEL;
use crate::energy::{ENERGY_FEATURES, ENERGY_MODEL};
use crate::features::CALENDAR_FEATURES;

const ACTIVE: &str = "Active";
const NOT_TRAINED: &str = "Not trained";

fn status_label(loaded: bool) -> String {
    (if loaded { ACTIVE } else { NOT_TRAINED }).to_string()
}

fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

/// Builds the metadata for an engine in `state`.
///
/// Pure: the same inputs always produce the same output.
#[must_use]
pub fn describe(
    state: EngineState,
    config: &EngineConfig,
    samples_used: Option<usize>,
    trained_at: Option<DateTime<Utc>>,
) -> ModelMetadata {
    let forecaster_loaded = state.is_trained();
    let detector_loaded = state.has_anomaly_model();

    ModelMetadata {
        status: if forecaster_loaded {
            "active"
        } else {
            "training_required"
        }
        .to_string(),
        state,
        models: ModelSlots {
            air_quality_forecaster: ModelInfo {
                loaded: forecaster_loaded,
                model_type: "Random Forest Regression".to_string(),
                status: status_label(forecaster_loaded),
                features: labels(&CALENDAR_FEATURES),
                targets: Some(labels(&["PM2.5", "PM10", "AQI"])),
                contamination: None,
                note: None,
            },
            energy_predictor: ModelInfo {
                loaded: true,
                model_type: ENERGY_MODEL.to_string(),
                status: ACTIVE.to_string(),
                features: labels(&ENERGY_FEATURES),
                targets: None,
                contamination: None,
                note: Some("Uses temporal patterns for prediction".to_string()),
            },
            anomaly_detector: ModelInfo {
                loaded: detector_loaded,
                model_type: MODEL_LABEL.to_string(),
                status: status_label(detector_loaded),
                features: labels(&["PM2.5", "PM10", "AQI", "Ozone"]),
                targets: None,
                contamination: Some(config.isolation.contamination),
                note: None,
            },
        },
        training_data: TrainingDataInfo {
            max_records: config.training_limit,
            samples_used,
            last_trained: trained_at,
        },
        note: "ML models trained on historical campus environmental data".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untrained_engine_requires_training() {
        let metadata = describe(EngineState::Untrained, &EngineConfig::default(), None, None);

        assert_eq!(metadata.status, "training_required");
        assert!(!metadata.models.air_quality_forecaster.loaded);
        assert_eq!(metadata.models.air_quality_forecaster.status, "Not trained");
        assert!(metadata.models.energy_predictor.loaded);
        assert_eq!(metadata.models.anomaly_detector.contamination, Some(0.1));
        assert_eq!(metadata.training_data.max_records, 5000);
        assert!(metadata.training_data.last_trained.is_none());
    }

    #[test]
    fn anomaly_only_state_is_still_untrained() {
        let metadata = describe(EngineState::AnomalyOnly, &EngineConfig::default(), None, None);

        assert_eq!(metadata.status, "training_required");
        assert!(metadata.models.anomaly_detector.loaded);
        assert_eq!(metadata.models.anomaly_detector.status, "Active");
    }

    #[test]
    fn serializes_with_type_keys() {
        let now = Utc::now();
        let metadata = describe(EngineState::Full, &EngineConfig::default(), Some(4800), Some(now));
        let json = serde_json::to_value(&metadata).unwrap();

        assert_eq!(json["status"], "active");
        assert_eq!(json["state"], "full");
        assert_eq!(
            json["models"]["air_quality_forecaster"]["type"],
            "Random Forest Regression"
        );
        assert_eq!(
            json["models"]["air_quality_forecaster"]["features"],
            serde_json::json!(["hour", "day_of_week", "month"])
        );
        assert!(json["models"]["energy_predictor"].get("targets").is_none());
        assert_eq!(json["training_data"]["samples_used"], 4800);
    }
}
