//! Forecast feeds and their alignment to the local clock

pub mod alignment;
pub mod feeds;

pub use alignment::{AlignmentOutcome, ForecastWindow, align_forecast, hour_of_timestamp, project_fallback};
pub use feeds::{ForecastFeed, GeoFix, forecast_url};

/// One `(timestamp, value)` pair of the hourly series, as delivered by the feed
///
/// `value` is `None` where the feed reports `null`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourlySample<'a> {
    pub timestamp: &'a str,
    pub value: Option<f32>,
}
