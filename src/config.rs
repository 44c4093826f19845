//! Deployment configuration for the uvwatch engine
//!
//! Everything here is fixed at build time on the device (`Config::DEFAULT`), but the
//! structure is serde-friendly so host tools can load overrides from JSON.

use embassy_time::Duration;
use serde::{Deserialize, Serialize};

use crate::app_state::PowerMode;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct Config<'a> {
    #[serde(default)]
    pub schedule: ScheduleConfig,
    pub location: LocationConfig<'a>,
    pub endpoints: EndpointConfig<'a>,
    #[serde(default)]
    pub timing: TimingConfig,
}

impl Config<'static> {
    pub const DEFAULT: Self = Self {
        schedule: ScheduleConfig::DEFAULT,
        location: LocationConfig {
            latitude: 25.2697,
            longitude: 55.3095,
            label: "Dubai",
        },
        endpoints: EndpointConfig {
            forecast_url: "https://api.open-meteo.com/v1/forecast",
            geolocation_url: "http://ip-api.com/json/?fields=status,lat,lon,city",
            forecast_days: 1,
        },
        timing: TimingConfig::DEFAULT,
    };
}

impl Default for Config<'static> {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Update grid definition
///
/// Values outside their documented ranges are tolerated here and clamped by
/// [`ScheduleConfig::clamped`] before any grid arithmetic.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Updates per hour while awake, 1..=60
    pub updates_per_hour: u8,
    /// Phase offset of the grid inside each hour, 0..=59
    pub target_minute_of_hour: u8,
    /// Ceiling on updates per hour while in low power
    pub max_updates_per_hour_low_power: u8,
}

impl ScheduleConfig {
    pub const DEFAULT: Self = Self {
        updates_per_hour: 4,
        target_minute_of_hour: 5,
        max_updates_per_hour_low_power: 1,
    };

    pub const fn clamped(self) -> Self {
        Self {
            updates_per_hour: clamp_u8(self.updates_per_hour, 1, 60),
            target_minute_of_hour: clamp_u8(self.target_minute_of_hour, 0, 59),
            max_updates_per_hour_low_power: clamp_u8(self.max_updates_per_hour_low_power, 1, 60),
        }
    }

    /// Minutes between two grid instants (integer division of the hour)
    pub const fn interval_minutes(self) -> u8 {
        60 / self.clamped().updates_per_hour
    }

    /// The grid that applies to `mode`, already clamped
    ///
    /// Low-power modes run at most `max_updates_per_hour_low_power` updates per hour.
    pub const fn for_mode(self, mode: PowerMode) -> Self {
        let clamped = self.clamped();
        if mode.is_low_power() && clamped.updates_per_hour > clamped.max_updates_per_hour_low_power {
            Self {
                updates_per_hour: clamped.max_updates_per_hour_low_power,
                ..clamped
            }
        } else {
            clamped
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

const fn clamp_u8(value: u8, min: u8, max: u8) -> u8 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Coordinates used while the location source is `FixedCoordinates`
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct LocationConfig<'a> {
    pub latitude: f32,
    pub longitude: f32,
    pub label: &'a str,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointConfig<'a> {
    /// Base URL of the hourly forecast feed, query string is appended
    pub forecast_url: &'a str,
    /// Full URL of the IP geolocation feed
    pub geolocation_url: &'a str,
    pub forecast_days: u8,
}

/// Timing knobs, stored as plain integers so they round-trip through JSON
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct TimingConfig {
    /// Link bring-up budget, spent before the first request of a wake
    pub connect_timeout_ms: u32,
    pub http_timeout_ms: u32,
    pub wake_window_secs: u32,
    pub confirmation_hold_ms: u32,
    pub fallback_sleep_secs: u32,
    pub debounce_ms: u32,
    pub long_press_ms: u32,
    pub tick_ms: u32,
}

impl TimingConfig {
    pub const DEFAULT: Self = Self {
        connect_timeout_ms: 60_000,
        http_timeout_ms: 10_000,
        wake_window_secs: 30,
        confirmation_hold_ms: 2_000,
        fallback_sleep_secs: 30 * 60,
        debounce_ms: 40,
        long_press_ms: 1_000,
        tick_ms: 20,
    };

    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms as u64)
    }

    pub const fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms as u64)
    }

    pub const fn wake_window(&self) -> Duration {
        Duration::from_secs(self.wake_window_secs as u64)
    }

    pub const fn confirmation_hold(&self) -> Duration {
        Duration::from_millis(self.confirmation_hold_ms as u64)
    }

    /// Sleep used when wall-clock time is unknown
    pub const fn fallback_sleep(&self) -> Duration {
        Duration::from_secs(self.fallback_sleep_secs as u64)
    }

    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms as u64)
    }

    pub const fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_ms as u64)
    }

    pub const fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms as u64)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
