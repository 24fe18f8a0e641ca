//! In-memory providers and record generators for engine tests.

use campus_air_database_models::HistoricalRecord;
use chrono::{Duration, NaiveDate, Timelike as _};

use crate::provider::{HistoricalDataProvider, ProviderError};

/// Serves a fixed list of records, most recent first.
pub struct StaticProvider {
    records: Vec<HistoricalRecord>,
}

impl StaticProvider {
    pub const fn new(records: Vec<HistoricalRecord>) -> Self {
        Self { records }
    }
}

#[async_trait::async_trait]
impl HistoricalDataProvider for StaticProvider {
    async fn get_recent(&self, limit: u32) -> Result<Vec<HistoricalRecord>, ProviderError> {
        Ok(self
            .records
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

/// Fails every request.
pub struct FailingProvider;

#[async_trait::async_trait]
impl HistoricalDataProvider for FailingProvider {
    async fn get_recent(&self, _limit: u32) -> Result<Vec<HistoricalRecord>, ProviderError> {
        Err(ProviderError::Unavailable {
            message: "store offline".to_string(),
        })
    }
}

/// `n` complete hourly readings ending at 2024-04-30 23:00, most recent
/// first, with a daily cycle and a small deterministic wobble.
pub fn synthetic_records(n: usize) -> Vec<HistoricalRecord> {
    let newest = NaiveDate::from_ymd_opt(2024, 4, 30)
        .and_then(|d| d.and_hms_opt(23, 0, 0))
        .unwrap();

    (0..n)
        .map(|i| {
            let time = newest - Duration::hours(i64::try_from(i).unwrap());
            let hour = f64::from(time.hour());
            let wobble = f64::from(u32::try_from(i % 7).unwrap()) * 0.3;
            let daily = (hour - 14.0).abs();

            HistoricalRecord {
                time: time.format("%Y-%m-%d %H:%M:%S").to_string(),
                pm2_5: Some(4.0 + daily * 0.3 + wobble),
                pm10: Some(7.0 + daily * 0.4 + wobble),
                carbon_monoxide: Some(180.0 + daily),
                nitrogen_dioxide: Some(9.0),
                sulphur_dioxide: Some(2.0),
                ozone: Some(70.0 - daily * 1.5 + wobble),
                us_aqi: Some(20.0 + daily + wobble * 2.0),
            }
        })
        .collect()
}
