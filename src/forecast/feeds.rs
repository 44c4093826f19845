//! Decoding of the two third-party JSON feeds
//!
//! - the hourly forecast (Open-Meteo shaped): `time` and `uv_index` arrays in
//!   parallel, plus the current reading and the location's UTC offset
//! - the IP geolocation lookup: `status`, `lat`, `lon`, `city`

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use heapless::String as FixedString;
use serde::Deserialize;

use super::HourlySample;
use crate::app_state::{AppError, AppResult, LOCATION_LABEL_CAPACITY, truncated};

/// Query string for a one-location UV request, appended to the configured base URL
pub fn forecast_url(base: &str, latitude: f32, longitude: f32, forecast_days: u8) -> String {
    format!(
        "{base}?latitude={latitude:.4}&longitude={longitude:.4}&current=uv_index&hourly=uv_index&forecast_days={forecast_days}&timezone=auto"
    )
}

#[derive(Deserialize)]
struct ForecastDocument {
    utc_offset_seconds: Option<i32>,
    current: Option<CurrentBlock>,
    hourly: Option<HourlyBlock>,
}

#[derive(Deserialize)]
struct CurrentBlock {
    uv_index: Option<f32>,
}

#[derive(Deserialize)]
struct HourlyBlock {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    uv_index: Vec<Option<f32>>,
}

/// A decoded forecast response
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastFeed {
    pub utc_offset_secs: Option<i32>,
    pub current_index: Option<f32>,
    times: Vec<String>,
    values: Vec<Option<f32>>,
    has_hourly: bool,
}

impl ForecastFeed {
    pub fn parse(body: &[u8]) -> AppResult<Self> {
        let document: ForecastDocument =
            serde_json::from_slice(body).map_err(|_| AppError::Decode("forecast body is not the expected JSON"))?;

        let (times, values, has_hourly) = match document.hourly {
            Some(hourly) => (hourly.time, hourly.uv_index, true),
            None => (Vec::new(), Vec::new(), false),
        };

        Ok(Self {
            utc_offset_secs: document.utc_offset_seconds,
            current_index: document.current.and_then(|c| c.uv_index).map(|v| v.max(0.0)),
            times,
            values,
            has_hourly,
        })
    }

    /// The hourly series as `(timestamp, value)` pairs
    ///
    /// Only positions present in both arrays are returned. `None` when the
    /// response carried no hourly block at all.
    pub fn samples(&self) -> Option<Vec<HourlySample<'_>>> {
        if !self.has_hourly {
            return None;
        }
        Some(
            self.times
                .iter()
                .zip(&self.values)
                .map(|(timestamp, value)| HourlySample {
                    timestamp: timestamp.as_str(),
                    value: *value,
                })
                .collect(),
        )
    }
}

#[derive(Deserialize)]
struct GeoDocument {
    status: String,
    lat: Option<f32>,
    lon: Option<f32>,
    city: Option<String>,
}

/// Result of a successful IP geolocation lookup
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFix {
    pub latitude: f32,
    pub longitude: f32,
    pub city: FixedString<LOCATION_LABEL_CAPACITY>,
}

impl GeoFix {
    pub fn parse(body: &[u8]) -> AppResult<Self> {
        let document: GeoDocument =
            serde_json::from_slice(body).map_err(|_| AppError::Decode("geolocation body is not the expected JSON"))?;

        if document.status != "success" {
            return Err(AppError::Decode("geolocation lookup did not succeed"));
        }

        match (document.lat, document.lon) {
            (Some(latitude), Some(longitude)) => Ok(Self {
                latitude,
                longitude,
                city: truncated(document.city.as_deref().unwrap_or("Unknown")),
            }),
            _ => Err(AppError::Decode("geolocation response has no coordinates")),
        }
    }
}
