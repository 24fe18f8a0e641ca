//! Database query functions for historical air quality data.
//!
//! Numeric columns are cast to `REAL` in SQL so that integer-typed values
//! written by the collection jobs decode the same way as floats.

use campus_air_database_models::HistoricalRecord;
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue};

use crate::DbError;

/// Returns up to `limit` air quality readings, most recent first.
///
/// # Errors
///
/// Returns [`DbError`] if the database query fails.
pub async fn get_recent_air_quality(
    db: &dyn Database,
    limit: u32,
) -> Result<Vec<HistoricalRecord>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT CAST(date AS TEXT) AS time,
                    CAST(pm2_5 AS REAL) AS pm2_5,
                    CAST(pm10 AS REAL) AS pm10,
                    CAST(carbon_monoxide AS REAL) AS carbon_monoxide,
                    CAST(nitrogen_dioxide AS REAL) AS nitrogen_dioxide,
                    CAST(sulphur_dioxide AS REAL) AS sulphur_dioxide,
                    CAST(ozone AS REAL) AS ozone,
                    CAST(us_aqi AS REAL) AS us_aqi
             FROM historical_air_quality_data
             ORDER BY date DESC
             LIMIT $1",
            &[DatabaseValue::Int64(i64::from(limit))],
        )
        .await?;

    log::debug!(
        "Fetched {} historical air quality rows (limit {limit})",
        rows.len()
    );

    Ok(rows
        .iter()
        .map(|row| HistoricalRecord {
            time: row.to_value("time").unwrap_or_default(),
            pm2_5: row.to_value("pm2_5").unwrap_or(None),
            pm10: row.to_value("pm10").unwrap_or(None),
            carbon_monoxide: row.to_value("carbon_monoxide").unwrap_or(None),
            nitrogen_dioxide: row.to_value("nitrogen_dioxide").unwrap_or(None),
            sulphur_dioxide: row.to_value("sulphur_dioxide").unwrap_or(None),
            ozone: row.to_value("ozone").unwrap_or(None),
            us_aqi: row.to_value("us_aqi").unwrap_or(None),
        })
        .collect())
}

/// Checks that the store answers a trivial query.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn ping(db: &dyn Database) -> Result<(), DbError> {
    let rows = db.query_raw_params("SELECT 1 AS ok", &[]).await?;
    let ok: i64 = rows
        .first()
        .ok_or_else(|| DbError::Conversion {
            message: "Empty response to health query".to_string(),
        })?
        .to_value("ok")
        .map_err(|e| DbError::Conversion {
            message: format!("Failed to parse health query result: {e}"),
        })?;

    if ok == 1 {
        Ok(())
    } else {
        Err(DbError::Conversion {
            message: format!("Unexpected health query result: {ok}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use switchy_database_connection::init_sqlite_rusqlite;

    use super::*;

    async fn seeded_store(name: &str) -> (PathBuf, Box<dyn Database>) {
        let path = std::env::temp_dir().join(format!("campus_air_{name}.db"));
        let _ = std::fs::remove_file(&path);

        let db = init_sqlite_rusqlite(Some(&path)).unwrap();
        db.exec_raw(
            "CREATE TABLE historical_air_quality_data (
                date              TEXT NOT NULL,
                pm2_5             REAL,
                pm10              REAL,
                carbon_monoxide   REAL,
                nitrogen_dioxide  REAL,
                sulphur_dioxide   REAL,
                ozone             REAL,
                us_aqi            INTEGER
            )",
        )
        .await
        .unwrap();
        db.exec_raw(
            "INSERT INTO historical_air_quality_data
                (date, pm2_5, pm10, carbon_monoxide, nitrogen_dioxide,
                 sulphur_dioxide, ozone, us_aqi)
             VALUES
                ('2024-05-01 00:00:00', 3.1, 5.2, 120.0, 8.0, 1.0, 60.0, 18),
                ('2024-05-01 01:00:00', 4.0, 6.0, NULL, NULL, NULL, NULL, 22),
                ('2024-05-01 02:00:00', 5.5, 9.1, 130.0, 9.5, 1.2, 70.0, 31)",
        )
        .await
        .unwrap();

        (path, db)
    }

    #[tokio::test]
    async fn returns_most_recent_first_with_limit() {
        let (path, db) = seeded_store("recent_first").await;

        let records = get_recent_air_quality(db.as_ref(), 2).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].time, "2024-05-01 02:00:00");
        assert_eq!(records[1].time, "2024-05-01 01:00:00");
        assert_eq!(records[0].us_aqi, Some(31.0));
        assert_eq!(records[1].ozone, None);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn ping_succeeds_on_open_store() {
        let (path, db) = seeded_store("ping").await;

        ping(db.as_ref()).await.unwrap();

        let _ = std::fs::remove_file(&path);
    }
}
