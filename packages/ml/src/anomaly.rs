//! Anomaly scanning over the most recent readings.
//!
//! The anomaly model is normally fitted at startup. When it is not, the
//! first scan fits it from the records it fetched; concurrent scans wait
//! for that single fit and reuse its result. A fit that fails leaves the
//! cell empty so a later scan can try again.

use campus_air_database_models::HistoricalRecord;
use campus_air_ml_models::{
    AnomalyRecord, AnomalyReport, AnomalySeverity, AnomalyValues, DataCategory,
};
use chrono::Utc;
use tokio::sync::OnceCell;

use crate::features::{ANOMALY_FIELDS, build_anomaly_matrix};
use crate::isolation::IsolationForest;
use crate::provider::HistoricalDataProvider;
use crate::{EngineConfig, PredictError, round_to};

/// Model label of non-empty reports.
pub const MODEL_LABEL: &str = "Isolation Forest";

const SCAN_NOTE: &str = "Anomaly detection using trained ML model";

/// Scans `category` and never fails; every problem yields an empty report.
pub async fn scan(
    provider: &dyn HistoricalDataProvider,
    cell: &OnceCell<IsolationForest>,
    config: &EngineConfig,
    category: &str,
) -> AnomalyReport {
    let Ok(kind) = category.parse::<DataCategory>() else {
        log::debug!("Anomaly scan requested for unsupported category '{category}'");
        return AnomalyReport::empty(category, Utc::now());
    };

    match try_scan(provider, cell, config, kind).await {
        Ok(report) => report,
        Err(e) => {
            log::warn!("Anomaly scan for {category} failed: {e}");
            AnomalyReport::empty(category, Utc::now())
        }
    }
}

/// Fetches, lazily fits, and scores one scan.
///
/// # Errors
///
/// Returns [`PredictError`] if the provider fails, no records exist, the
/// lazy fit lacks data or fails, or no complete reading is in the window.
pub async fn try_scan(
    provider: &dyn HistoricalDataProvider,
    cell: &OnceCell<IsolationForest>,
    config: &EngineConfig,
    kind: DataCategory,
) -> Result<AnomalyReport, PredictError> {
    let records = provider.get_recent(config.scan_limit).await?;
    if records.is_empty() {
        return Err(PredictError::InsufficientData {
            stage: "anomaly scan",
            found: 0,
            required: 1,
        });
    }

    let model = cell.get_or_try_init(|| lazy_fit(&records, config)).await?;

    let window: Vec<(&HistoricalRecord, [f64; 4])> = records
        .iter()
        .take(config.scan_window)
        .filter_map(|record| record.select(ANOMALY_FIELDS).map(|values| (record, values)))
        .collect();
    if window.is_empty() {
        return Err(PredictError::InsufficientData {
            stage: "scan window",
            found: 0,
            required: 1,
        });
    }

    let rows: Vec<Vec<f64>> = window.iter().map(|(_, values)| values.to_vec()).collect();
    let verdicts = model.score(&rows)?;

    let mut anomalies: Vec<AnomalyRecord> = window
        .iter()
        .zip(&verdicts)
        .filter(|(_, verdict)| verdict.is_outlier)
        .map(|((record, values), verdict)| flagged(record, values, verdict.score, kind))
        .collect();

    let anomalies_detected = anomalies.len();
    anomalies.truncate(config.max_reported_anomalies);

    log::debug!(
        "Anomaly scan: {anomalies_detected} of {} readings flagged",
        rows.len()
    );

    Ok(AnomalyReport {
        data_type: kind.to_string(),
        anomalies_detected,
        anomalies,
        total_samples_analyzed: rows.len(),
        last_check: Utc::now(),
        model: MODEL_LABEL.to_string(),
        note: SCAN_NOTE.to_string(),
    })
}

fn flagged(
    record: &HistoricalRecord,
    [pm2_5, pm10, us_aqi, ozone]: &[f64; 4],
    raw_score: f64,
    kind: DataCategory,
) -> AnomalyRecord {
    let score = round_to(raw_score, 3);
    AnomalyRecord {
        timestamp: record.time.clone(),
        kind,
        // Severity follows the rounded score, not the raw one.
        severity: AnomalySeverity::from_score(score),
        anomaly_score: score,
        values: AnomalyValues {
            pm2_5: round_to(*pm2_5, 2),
            pm10: round_to(*pm10, 2),
            us_aqi: round_to(*us_aqi, 2),
            ozone: round_to(*ozone, 2),
        },
        description: format!("Unusual {kind} pattern detected"),
    }
}

async fn lazy_fit(
    records: &[HistoricalRecord],
    config: &EngineConfig,
) -> Result<IsolationForest, PredictError> {
    let rows = build_anomaly_matrix(records);
    if rows.len() < config.min_clean_rows {
        return Err(PredictError::InsufficientData {
            stage: "anomaly rows",
            found: rows.len(),
            required: config.min_clean_rows,
        });
    }

    let params = config.isolation.clone();
    let n = rows.len();
    let model = tokio::task::spawn_blocking(move || IsolationForest::fit(&rows, &params)).await??;

    log::info!("Fitted anomaly model on demand from {n} readings");
    Ok(model)
}
