//! Calendar feature extraction and training table assembly.
//!
//! Timestamps are interpreted as UTC. A timestamp that cannot be parsed
//! excludes its row from the calendar tables; it is never defaulted.

use campus_air_database_models::{AirQualityField, HistoricalRecord};
use chrono::{DateTime, Datelike as _, NaiveDate, NaiveDateTime, Timelike as _, Utc};

/// Targets predicted jointly by the forecast model.
pub const TARGET_FIELDS: [AirQualityField; 3] = [
    AirQualityField::Pm25,
    AirQualityField::Pm10,
    AirQualityField::UsAqi,
];

/// Columns the anomaly model scores.
pub const ANOMALY_FIELDS: [AirQualityField; 4] = [
    AirQualityField::Pm25,
    AirQualityField::Pm10,
    AirQualityField::UsAqi,
    AirQualityField::Ozone,
];

/// Names of the calendar features, in column order.
pub const CALENDAR_FEATURES: [&str; 3] = ["hour", "day_of_week", "month"];

/// Calendar features of a single reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureRow {
    /// Hour of day, 0–23.
    pub hour: u32,
    /// Day of week, Monday = 0 through Sunday = 6.
    pub day_of_week: u32,
    /// Month, 1–12.
    pub month: u32,
}

impl FeatureRow {
    /// Features for a given hour of `date`.
    #[must_use]
    pub fn for_date(date: NaiveDate, hour: u32) -> Self {
        Self {
            hour,
            day_of_week: date.weekday().num_days_from_monday(),
            month: date.month(),
        }
    }

    /// The row as a model input vector.
    #[must_use]
    pub fn to_vec(self) -> Vec<f64> {
        vec![
            f64::from(self.hour),
            f64::from(self.day_of_week),
            f64::from(self.month),
        ]
    }
}

/// Feature/target table the forecast model is fitted on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    /// Calendar feature vectors.
    pub features: Vec<Vec<f64>>,
    /// Target vectors, aligned with `features`.
    pub targets: Vec<Vec<f64>>,
}

impl TrainingSet {
    /// Number of complete rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Parses a stored timestamp as UTC.
///
/// Offsets are honored and converted; naive values are taken as UTC;
/// a bare date means midnight.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Derives calendar features from a stored timestamp.
///
/// Returns `None` when the timestamp cannot be parsed.
#[must_use]
pub fn build_calendar_features(timestamp: &str) -> Option<FeatureRow> {
    let dt = parse_timestamp(timestamp)?;
    Some(FeatureRow {
        hour: dt.hour(),
        day_of_week: dt.weekday().num_days_from_monday(),
        month: dt.month(),
    })
}

/// Joins calendar features with the requested target columns.
///
/// Rows with an unparseable timestamp or any missing target are dropped.
#[must_use]
pub fn build_training_set<const T: usize>(
    records: &[HistoricalRecord],
    targets: [AirQualityField; T],
) -> TrainingSet {
    let mut set = TrainingSet::default();

    for record in records {
        let Some(row) = build_calendar_features(&record.time) else {
            continue;
        };
        let Some(values) = record.select(targets) else {
            continue;
        };
        set.features.push(row.to_vec());
        set.targets.push(values.to_vec());
    }

    set
}

/// Selects the anomaly feature columns, dropping incomplete rows.
///
/// Timestamps play no part here, so a malformed timestamp does not remove
/// a reading from this table.
#[must_use]
pub fn build_anomaly_matrix(records: &[HistoricalRecord]) -> Vec<Vec<f64>> {
    records
        .iter()
        .filter_map(|record| record.select(ANOMALY_FIELDS))
        .map(|values| values.to_vec())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(time: &str, pm2_5: Option<f64>) -> HistoricalRecord {
        HistoricalRecord {
            time: time.to_string(),
            pm2_5,
            pm10: Some(9.0),
            ozone: Some(61.0),
            us_aqi: Some(24.0),
            ..Default::default()
        }
    }

    #[test]
    fn parses_store_formats_as_utc() {
        let expected = "2024-07-04 13:00:00 UTC";
        for s in [
            "2024-07-04 13:00:00",
            "2024-07-04T13:00:00",
            "2024-07-04T13:00:00.000",
            "2024-07-04T13:00:00Z",
            "2024-07-04 13:00:00+00:00",
            "2024-07-04T08:00:00-05:00",
        ] {
            assert_eq!(parse_timestamp(s).unwrap().to_string(), expected, "{s}");
        }
        assert_eq!(
            parse_timestamp("2024-07-04").unwrap().to_string(),
            "2024-07-04 00:00:00 UTC"
        );
    }

    #[test]
    fn calendar_features_use_monday_zero() {
        // 2024-07-04 was a Thursday.
        let row = build_calendar_features("2024-07-04 13:00:00").unwrap();
        assert_eq!(
            row,
            FeatureRow {
                hour: 13,
                day_of_week: 3,
                month: 7
            }
        );

        let sunday = build_calendar_features("2024-07-07T23:00:00").unwrap();
        assert_eq!(sunday.day_of_week, 6);
    }

    #[test]
    fn unparseable_timestamp_is_none() {
        assert!(build_calendar_features("not a time").is_none());
        assert!(build_calendar_features("").is_none());
        assert!(build_calendar_features("2024-13-40 99:00:00").is_none());
    }

    #[test]
    fn unparseable_timestamp_drops_exactly_one_row() {
        let records = vec![
            record("2024-07-04 10:00:00", Some(4.0)),
            record("garbage", Some(4.5)),
            record("2024-07-04 12:00:00", Some(5.0)),
            record("2024-07-04 13:00:00", Some(5.5)),
        ];

        let set = build_training_set(&records, TARGET_FIELDS);

        assert_eq!(set.len(), records.len() - 1);
        assert_eq!(set.features[1], vec![12.0, 3.0, 7.0]);
        assert_eq!(set.targets[1], vec![5.0, 9.0, 24.0]);
    }

    #[test]
    fn missing_target_drops_row() {
        let records = vec![
            record("2024-07-04 10:00:00", None),
            record("2024-07-04 11:00:00", Some(4.5)),
        ];

        let set = build_training_set(&records, TARGET_FIELDS);

        assert_eq!(set.len(), 1);
    }

    #[test]
    fn anomaly_matrix_ignores_timestamps() {
        let mut missing_ozone = record("2024-07-04 12:00:00", Some(5.0));
        missing_ozone.ozone = None;
        let records = vec![
            record("garbage", Some(4.5)),
            missing_ozone,
            record("2024-07-04 13:00:00", Some(5.5)),
        ];

        let rows = build_anomaly_matrix(&records);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![4.5, 9.0, 24.0, 61.0]);
        assert_eq!(rows[1], vec![5.5, 9.0, 24.0, 61.0]);
    }
}
