//! Persistent device state and the error types shared across the engine

use core::fmt::Write;

use chrono::{NaiveDateTime, Timelike};
use heapless::String;
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::config::Config;

/// Number of hourly slots shown on the dashboard
pub const FORECAST_WINDOW: usize = 6;

pub const LOCATION_LABEL_CAPACITY: usize = 24;
pub const TIME_LABEL_CAPACITY: usize = 12;

/// Label shown before the first successful fetch
pub const NEVER_UPDATED: &str = "Never";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PowerMode {
    #[default]
    Normal,
    LowPowerSleeping,
    LowPowerTemporaryWake,
}

impl PowerMode {
    pub const fn is_low_power(self) -> bool {
        matches!(self, Self::LowPowerSleeping | Self::LowPowerTemporaryWake)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::LowPowerSleeping => "Low power",
            Self::LowPowerTemporaryWake => "Low power (awake)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LocationSource {
    #[default]
    FixedCoordinates,
    NetworkGeolocated,
}

impl LocationSource {
    pub const fn toggled(self) -> Self {
        match self {
            Self::FixedCoordinates => Self::NetworkGeolocated,
            Self::NetworkGeolocated => Self::FixedCoordinates,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::FixedCoordinates => "Fixed",
            Self::NetworkGeolocated => "IP lookup",
        }
    }
}

/// One hour of the dashboard's forecast strip
///
/// `None` is the invalid sentinel for both fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastSlot {
    pub hour_of_day: Option<u8>,
    pub index: Option<f32>,
}

impl ForecastSlot {
    pub const EMPTY: Self = Self {
        hour_of_day: None,
        index: None,
    };

    pub const fn new(hour_of_day: u8, index: f32) -> Self {
        Self {
            hour_of_day: Some(hour_of_day),
            index: Some(index),
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.hour_of_day.is_none() && self.index.is_none()
    }
}

/// Outcome of the most recent refresh, shown to the user as a short label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FetchStatus {
    #[default]
    Never,
    Ok,
    NoConnection,
    HttpError,
    DecodeError,
    NoData,
    TimeUnavailable,
}

impl FetchStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Never => "Never",
            Self::Ok => "OK",
            Self::NoConnection => "No Conn",
            Self::HttpError => "HTTP Err",
            Self::DecodeError => "JSON Err",
            Self::NoData => "No Data",
            Self::TimeUnavailable => "Time N/A",
        }
    }

    pub const fn is_error(self) -> bool {
        !matches!(self, Self::Never | Self::Ok)
    }
}

/// Everything that has to survive a deep-sleep cycle
///
/// The validity cookie is not a field: the store writes it in the image header
/// once the payload is down, see [`crate::storage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistentState {
    pub power_mode: PowerMode,
    pub location_source: LocationSource,
    pub latitude: f32,
    pub longitude: f32,
    pub forecast_slots: [ForecastSlot; FORECAST_WINDOW],
    pub current_index: Option<f32>,
    pub last_update_label: String<TIME_LABEL_CAPACITY>,
    pub location_label: String<LOCATION_LABEL_CAPACITY>,
    pub has_valid_forecast: bool,
    pub status: FetchStatus,
    /// Offset learned from the forecast feed, re-applied to the clock on resume
    pub utc_offset_secs: Option<i32>,
}

impl PersistentState {
    /// Power-on defaults: fixed coordinates, empty forecast, normal mode
    pub fn with_defaults(config: &Config<'_>) -> Self {
        Self {
            power_mode: PowerMode::Normal,
            location_source: LocationSource::FixedCoordinates,
            latitude: config.location.latitude,
            longitude: config.location.longitude,
            forecast_slots: [ForecastSlot::EMPTY; FORECAST_WINDOW],
            current_index: None,
            last_update_label: truncated(NEVER_UPDATED),
            location_label: truncated(config.location.label),
            has_valid_forecast: false,
            status: FetchStatus::Never,
            utc_offset_secs: None,
        }
    }

    /// Drop the forecast, keeping the empty-slot invariant
    pub fn clear_forecast(&mut self) {
        self.forecast_slots = [ForecastSlot::EMPTY; FORECAST_WINDOW];
        self.has_valid_forecast = false;
    }

    pub fn set_fixed_location(&mut self, config: &Config<'_>) {
        self.location_source = LocationSource::FixedCoordinates;
        self.latitude = config.location.latitude;
        self.longitude = config.location.longitude;
        self.location_label = truncated(config.location.label);
    }

    /// Stamp the last-update label with a 12-hour clock reading, e.g. `02:05 PM`
    pub fn stamp_update(&mut self, local: NaiveDateTime) {
        self.last_update_label = format_clock_label(local);
    }
}

pub fn format_clock_label(local: NaiveDateTime) -> String<TIME_LABEL_CAPACITY> {
    let (pm, hour) = local.hour12();
    let mut label = String::new();
    // "hh:mm AM" is 8 bytes, always fits
    let _ = write!(label, "{:02}:{:02} {}", hour, local.minute(), if pm { "PM" } else { "AM" });
    label
}

/// Copy `value` into a fixed-capacity string, dropping whole characters that don't fit
pub fn truncated<const N: usize>(value: &str) -> String<N> {
    let mut out = String::new();
    for c in value.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Network unavailable or request timed out")]
    Connectivity,
    #[error("Remote returned status {0}")]
    Remote(u16),
    #[error("Malformed payload: {0}")]
    Decode(&'static str),
    #[error("Forecast alignment failed: {0}")]
    Alignment(&'static str),
    #[error("Persistent storage failure: {0}")]
    Persistence(&'static str),
}

impl AppError {
    /// The label the dashboard shows for this failure
    ///
    /// Storage failures are not a fetch outcome and leave the label alone.
    pub const fn status(&self) -> Option<FetchStatus> {
        match self {
            Self::Connectivity => Some(FetchStatus::NoConnection),
            Self::Remote(_) => Some(FetchStatus::HttpError),
            Self::Decode(_) => Some(FetchStatus::DecodeError),
            Self::Alignment(_) => Some(FetchStatus::TimeUnavailable),
            Self::Persistence(_) => None,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
