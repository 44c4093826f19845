//! Select the window of hourly slots that starts at "now"
//!
//! The feed delivers a whole day of hourly values. The dashboard wants the
//! `N` slots starting at the current local hour, and it wants a plausible
//! hour axis even when the feed is missing or unusable: in that case hours are
//! projected forward from the local clock with zero intensity.

use log::{debug, warn};

use super::HourlySample;
use crate::app_state::{FORECAST_WINDOW, ForecastSlot, PersistentState};

/// How a window was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentOutcome {
    /// Filled from the feed, starting at this position of the series
    Aligned { start: usize },
    /// No usable series; hours projected from the local clock, zero intensity
    Projected,
    /// Local time unknown, nothing to anchor the window to
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastWindow<const N: usize = FORECAST_WINDOW> {
    pub slots: [ForecastSlot; N],
    pub valid: bool,
    pub outcome: AlignmentOutcome,
}

impl ForecastWindow<FORECAST_WINDOW> {
    /// Copy the window into `state`, keeping the empty-slot invariant
    pub fn apply_to(&self, state: &mut PersistentState) {
        if self.valid {
            state.forecast_slots = self.slots;
            state.has_valid_forecast = true;
        } else {
            state.clear_forecast();
        }
    }
}

/// Hour-of-day of an ISO-like `YYYY-MM-DDTHH:MM` timestamp
pub fn hour_of_timestamp(timestamp: &str) -> Option<u8> {
    let digits = timestamp.get(11..13)?;
    let hour: u8 = digits.parse().ok()?;
    (hour < 24).then_some(hour)
}

/// Hours `local_hour, local_hour + 1, ...` wrapping at midnight, all at zero
pub fn project_fallback<const N: usize>(local_hour: u8) -> [ForecastSlot; N] {
    core::array::from_fn(|i| ForecastSlot::new(projected_hour(local_hour, i), 0.0))
}

fn projected_hour(local_hour: u8, offset: usize) -> u8 {
    ((local_hour as usize + offset) % 24) as u8
}

/// Build the window for `local_hour` out of `series`
///
/// `series` is `None` when the fetch or decode failed. `local_hour` is `None`
/// when the clock has never been set.
pub fn align_forecast<const N: usize>(
    series: Option<&[HourlySample<'_>]>,
    local_hour: Option<u8>,
) -> ForecastWindow<N> {
    let Some(local_hour) = local_hour.filter(|h| *h < 24) else {
        warn!(" Local time unavailable, forecast window left empty");
        return ForecastWindow {
            slots: [ForecastSlot::EMPTY; N],
            valid: false,
            outcome: AlignmentOutcome::Unavailable,
        };
    };

    let start = series.and_then(|series| {
        series
            .iter()
            .position(|sample| hour_of_timestamp(sample.timestamp).is_some_and(|hour| hour >= local_hour))
    });

    let (Some(series), Some(start)) = (series, start) else {
        debug!(" No alignment point for local hour {}, projecting", local_hour);
        return ForecastWindow {
            slots: project_fallback(local_hour),
            valid: true,
            outcome: AlignmentOutcome::Projected,
        };
    };

    let slots = core::array::from_fn(|i| match series.get(start + i) {
        Some(sample) => {
            let hour = hour_of_timestamp(sample.timestamp).unwrap_or(projected_hour(local_hour, i));
            // Null and negative both mean "no sun"
            let index = sample.value.filter(|v| *v > 0.0).unwrap_or(0.0);
            ForecastSlot::new(hour, index)
        }
        None => ForecastSlot::EMPTY,
    });

    ForecastWindow {
        slots,
        valid: true,
        outcome: AlignmentOutcome::Aligned { start },
    }
}
