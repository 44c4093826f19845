//! The fetch sequence: optional geolocation, forecast request, alignment, persist

use alloc::vec::Vec;
use core::fmt::Debug;

use chrono::Timelike;
use embassy_time::with_timeout;
use embedded_storage::Storage;
use log::{debug, info, warn};

use super::PowerModeController;
use crate::app_state::{AppError, AppResult, FetchStatus, LocationSource};
use crate::forecast::{AlignmentOutcome, ForecastFeed, ForecastWindow, GeoFix, align_forecast, forecast_url};
use crate::platform::{HttpTransport, Screen, WallClock};

impl<'a, N, C, S, R, F> PowerModeController<'a, N, C, S, R, F>
where
    N: HttpTransport,
    C: WallClock,
    S: Screen,
    R: Storage,
    R::Error: Debug,
    F: Storage,
    F::Error: Debug,
{
    /// Fetch and align a new forecast, then persist the result
    ///
    /// Never fails. Network and decode errors degrade to the projected window
    /// and show up in `state.status`. Geolocation is only re-resolved when
    /// `resolve_location` is set and the source is `NetworkGeolocated`.
    pub(super) async fn refresh(&mut self, resolve_location: bool) {
        if resolve_location && self.state.location_source == LocationSource::NetworkGeolocated {
            match self.resolve_location().await {
                Ok(fix) => {
                    info!(" Located at {} ({}, {})", fix.city, fix.latitude, fix.longitude);
                    self.state.latitude = fix.latitude;
                    self.state.longitude = fix.longitude;
                    self.state.location_label = fix.city;
                }
                Err(e) => warn!(" Geolocation failed, keeping previous coordinates: {}", e),
            }
        }

        let fetched = self.fetch_forecast().await;

        if let Some(offset) = fetched.as_ref().ok().and_then(|feed| feed.utc_offset_secs) {
            self.clock.configure(offset);
            self.state.utc_offset_secs = Some(offset);
        }

        let local = self.clock.now();
        let local_hour = local.map(|t| t.hour() as u8);
        if let Some(local) = local {
            self.mark_fetched_at(local);
        }

        let window: ForecastWindow = match &fetched {
            Ok(feed) => {
                let samples = feed.samples();
                align_forecast(samples.as_deref(), local_hour)
            }
            Err(_) => align_forecast(None, local_hour),
        };
        window.apply_to(&mut self.state);

        match fetched {
            Ok(feed) => {
                self.state.current_index = feed.current_index;
                self.state.status = match window.outcome {
                    AlignmentOutcome::Aligned { .. } => FetchStatus::Ok,
                    AlignmentOutcome::Projected => FetchStatus::NoData,
                    AlignmentOutcome::Unavailable => FetchStatus::TimeUnavailable,
                };
                if let Some(local) = local {
                    self.state.stamp_update(local);
                }
                info!(" Forecast updated: {}", self.state.status.label());
            }
            Err(e) => {
                warn!(" Forecast refresh failed: {}", e);
                self.state.current_index = None;
                if let Some(status) = e.status() {
                    self.state.status = status;
                }
            }
        }

        self.persist();
    }

    /// Flip between fixed and geolocated coordinates and refresh right away
    pub(super) async fn toggle_location(&mut self) {
        let source = self.state.location_source.toggled();
        info!(" Location source: {}", source.label());

        match source {
            LocationSource::FixedCoordinates => self.state.set_fixed_location(&self.config),
            LocationSource::NetworkGeolocated => self.state.location_source = source,
        }
        self.refresh(true).await;
    }

    async fn fetch_forecast(&mut self) -> AppResult<ForecastFeed> {
        let endpoints = self.config.endpoints;
        let url = forecast_url(
            endpoints.forecast_url,
            self.state.latitude,
            self.state.longitude,
            endpoints.forecast_days,
        );
        let body = self.get(&url).await?;
        ForecastFeed::parse(&body)
    }

    async fn resolve_location(&mut self) -> AppResult<GeoFix> {
        let url = self.config.endpoints.geolocation_url;
        let body = self.get(url).await?;
        GeoFix::parse(&body)
    }

    async fn get(&mut self, url: &str) -> AppResult<Vec<u8>> {
        with_timeout(self.config.timing.connect_timeout(), self.net.connect())
            .await
            .map_err(|_| {
                warn!(" Link bring-up timed out");
                AppError::Connectivity
            })?
            .map_err(|e| {
                warn!(" Link bring-up failed: {:?}", e);
                AppError::Connectivity
            })?;

        debug!(" GET {}", url);
        let response = with_timeout(self.config.timing.http_timeout(), self.net.get(url))
            .await
            .map_err(|_| {
                warn!(" Request timed out");
                AppError::Connectivity
            })?
            .map_err(|e| {
                warn!(" Request failed: {:?}", e);
                AppError::Connectivity
            })?;

        if !response.is_success() {
            return Err(AppError::Remote(response.status));
        }
        Ok(response.body)
    }
}
