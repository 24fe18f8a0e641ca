#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Historical air quality row types.
//!
//! These types represent the shapes of data as stored in and retrieved from
//! the campus `SQLite` store. The store is populated by the collection jobs;
//! nothing in this workspace writes to it.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A pollutant column of the `historical_air_quality_data` table.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AirQualityField {
    /// Fine particulate matter (μg/m³).
    #[strum(serialize = "pm2_5")]
    #[serde(rename = "pm2_5")]
    Pm25,
    /// Coarse particulate matter (μg/m³).
    Pm10,
    /// Carbon monoxide (μg/m³).
    CarbonMonoxide,
    /// Nitrogen dioxide (μg/m³).
    NitrogenDioxide,
    /// Sulphur dioxide (μg/m³).
    SulphurDioxide,
    /// Ozone (μg/m³).
    Ozone,
    /// US Air Quality Index.
    UsAqi,
}

impl AirQualityField {
    /// Returns all variants of this enum, in table column order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Pm25,
            Self::Pm10,
            Self::CarbonMonoxide,
            Self::NitrogenDioxide,
            Self::SulphurDioxide,
            Self::Ozone,
            Self::UsAqi,
        ]
    }
}

/// An hourly air quality reading as retrieved from the store.
///
/// The timestamp is kept exactly as the store returned it. Parsing happens
/// at feature-building time so that a malformed timestamp only excludes the
/// row from the tables that need it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    /// Reading timestamp as stored (`date` column).
    pub time: String,
    /// PM2.5 concentration.
    pub pm2_5: Option<f64>,
    /// PM10 concentration.
    pub pm10: Option<f64>,
    /// Carbon monoxide concentration.
    pub carbon_monoxide: Option<f64>,
    /// Nitrogen dioxide concentration.
    pub nitrogen_dioxide: Option<f64>,
    /// Sulphur dioxide concentration.
    pub sulphur_dioxide: Option<f64>,
    /// Ozone concentration.
    pub ozone: Option<f64>,
    /// US Air Quality Index.
    pub us_aqi: Option<f64>,
}

impl HistoricalRecord {
    /// Returns the value of a single pollutant column.
    #[must_use]
    pub const fn get(&self, field: AirQualityField) -> Option<f64> {
        match field {
            AirQualityField::Pm25 => self.pm2_5,
            AirQualityField::Pm10 => self.pm10,
            AirQualityField::CarbonMonoxide => self.carbon_monoxide,
            AirQualityField::NitrogenDioxide => self.nitrogen_dioxide,
            AirQualityField::SulphurDioxide => self.sulphur_dioxide,
            AirQualityField::Ozone => self.ozone,
            AirQualityField::UsAqi => self.us_aqi,
        }
    }

    /// Returns the values of `fields` in order, or `None` if any is missing.
    #[must_use]
    pub fn select<const N: usize>(&self, fields: [AirQualityField; N]) -> Option<[f64; N]> {
        let mut out = [0.0; N];
        for (slot, field) in out.iter_mut().zip(fields) {
            *slot = self.get(field)?;
        }
        Some(out)
    }
}
