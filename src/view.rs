//! Screen-independent dashboard layout data
//!
//! [`crate::render`] draws from a [`DashboardView`], and so do the tests and
//! log output, so the labels, categories and bar scaling are identical
//! everywhere.

use core::fmt::Write;

use heapless::String;

use crate::app_state::{FORECAST_WINDOW, ForecastSlot, PersistentState};

/// Bars are scaled against this index; anything above is drawn full height
pub const BAR_SCALE_MAX: f32 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UvCategory {
    Low,
    Moderate,
    High,
    VeryHigh,
    Extreme,
}

impl UvCategory {
    pub fn from_index(index: f32) -> Self {
        if index < 3.0 {
            Self::Low
        } else if index < 6.0 {
            Self::Moderate
        } else if index < 8.0 {
            Self::High
        } else if index < 11.0 {
            Self::VeryHigh
        } else {
            Self::Extreme
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
            Self::VeryHigh => "Very High",
            Self::Extreme => "Extreme",
        }
    }

    /// RGB888 colour of the WHO UV scale
    pub const fn rgb(self) -> (u8, u8, u8) {
        match self {
            Self::Low => (0x29, 0x95, 0x01),
            Self::Moderate => (0xF7, 0xE4, 0x00),
            Self::High => (0xF8, 0x59, 0x00),
            Self::VeryHigh => (0xD8, 0x00, 0x1D),
            Self::Extreme => (0x6B, 0x49, 0xC8),
        }
    }
}

/// Bar height in pixels for `index`, out of `max_px`
///
/// Any positive index gets at least one pixel so it is distinguishable from zero.
pub fn bar_height(index: f32, max_px: u32) -> u32 {
    if index <= 0.0 || index.is_nan() {
        return 0;
    }
    let ratio = if index >= BAR_SCALE_MAX { 1.0 } else { index / BAR_SCALE_MAX };
    let px = (ratio * max_px as f32) as u32;
    px.clamp(1, max_px.max(1))
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotView {
    pub hour: String<3>,
    pub value: String<6>,
    pub index: Option<f32>,
    pub category: Option<UvCategory>,
}

impl SlotView {
    fn new(slot: &ForecastSlot) -> Self {
        let mut hour = String::new();
        match slot.hour_of_day {
            Some(h) => {
                let _ = write!(hour, "{}", h);
            }
            None => {
                let _ = hour.push('-');
            }
        }

        Self {
            hour,
            value: format_index(slot.index),
            index: slot.index,
            category: slot.index.map(UvCategory::from_index),
        }
    }

    pub fn bar_height(&self, max_px: u32) -> u32 {
        self.index.map_or(0, |index| bar_height(index, max_px))
    }
}

/// Info overlay lines
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayView<'s> {
    pub mode: &'static str,
    pub source: &'static str,
    pub location: &'s str,
    pub coordinates: String<24>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView<'s> {
    pub current: String<6>,
    pub current_category: Option<UvCategory>,
    pub last_update: &'s str,
    pub status: &'static str,
    pub status_is_error: bool,
    pub slots: [SlotView; FORECAST_WINDOW],
    pub overlay: Option<OverlayView<'s>>,
}

impl<'s> DashboardView<'s> {
    pub fn new(state: &'s PersistentState, overlay: bool) -> Self {
        let overlay = overlay.then(|| {
            let mut coordinates = String::new();
            let _ = write!(coordinates, "{:.2}, {:.2}", state.latitude, state.longitude);
            OverlayView {
                mode: state.power_mode.label(),
                source: state.location_source.label(),
                location: state.location_label.as_str(),
                coordinates,
            }
        });

        Self {
            current: format_index(state.current_index),
            current_category: state.current_index.map(UvCategory::from_index),
            last_update: state.last_update_label.as_str(),
            status: state.status.label(),
            status_is_error: state.status.is_error(),
            slots: core::array::from_fn(|i| SlotView::new(&state.forecast_slots[i])),
            overlay,
        }
    }
}

/// One decimal, or `-` when absent
pub fn format_index(index: Option<f32>) -> String<6> {
    let mut out = String::new();
    match index {
        Some(v) if v < 100.0 => {
            let _ = write!(out, "{:.1}", v);
        }
        Some(_) => {
            let _ = out.push_str("99+");
        }
        None => {
            let _ = out.push('-');
        }
    }
    out
}
