//! Mock collaborators for driving the power-mode controller on the host

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use embassy_time::{Duration, Instant, Timer};

use uvwatch::PowerModeController;
use uvwatch::app_state::PersistentState;
use uvwatch::buttons::{ButtonEvent, ButtonEventKind, ButtonId};
use uvwatch::config::Config;
use uvwatch::platform::{HttpResponse, HttpTransport, Screen, WallClock};
use uvwatch::storage::{PersistentStateStore, RETAINED_CAPACITY, RamRegion};

pub type TestStore = PersistentStateStore<RamRegion<RETAINED_CAPACITY>, RamRegion<4>>;
pub type TestController = PowerModeController<'static, MockNet, MockClock, RecordingScreen, RamRegion<RETAINED_CAPACITY>, RamRegion<4>>;

#[derive(Debug, Clone)]
pub enum Reply {
    Respond(u16, String),
    Fail,
    Hang,
}

/// How link bring-up behaves
#[derive(Debug, Clone, Copy)]
pub enum Link {
    Up,
    /// Comes up after the delay, like a fallback network joined after a stalled one
    Slow(Duration),
    Hang,
}

#[derive(Debug)]
pub struct MockNetError;

/// Answers geolocation and forecast URLs with canned replies
pub struct MockNet {
    pub link: Link,
    pub connects: usize,
    pub forecast: Reply,
    pub geolocation: Reply,
    pub requests: Vec<String>,
}

impl MockNet {
    pub fn online() -> Self {
        Self {
            link: Link::Up,
            connects: 0,
            forecast: Reply::Respond(200, forecast_body("2024-06-01", 14400)),
            geolocation: Reply::Respond(200, GEO_PARIS.to_string()),
            requests: Vec::new(),
        }
    }

    pub fn offline() -> Self {
        Self {
            link: Link::Up,
            connects: 0,
            forecast: Reply::Fail,
            geolocation: Reply::Fail,
            requests: Vec::new(),
        }
    }

    pub fn geolocation_requests(&self) -> usize {
        self.requests.iter().filter(|url| url.contains("ip-api")).count()
    }

    pub fn forecast_requests(&self) -> usize {
        self.requests.len() - self.geolocation_requests()
    }
}

impl HttpTransport for MockNet {
    type Error = MockNetError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        self.connects += 1;
        match self.link {
            Link::Up => Ok(()),
            Link::Slow(delay) => {
                Timer::after(delay).await;
                Ok(())
            }
            Link::Hang => core::future::pending().await,
        }
    }

    async fn get(&mut self, url: &str) -> Result<HttpResponse, Self::Error> {
        self.requests.push(url.to_string());
        let reply = if url.contains("ip-api") {
            self.geolocation.clone()
        } else {
            self.forecast.clone()
        };

        match reply {
            Reply::Respond(status, body) => Ok(HttpResponse {
                status,
                body: body.into_bytes(),
            }),
            Reply::Fail => Err(MockNetError),
            Reply::Hang => core::future::pending().await,
        }
    }
}

pub struct MockClock {
    pub now: Option<NaiveDateTime>,
    pub configured: Vec<i32>,
}

impl MockClock {
    pub fn at(now: NaiveDateTime) -> Self {
        Self {
            now: Some(now),
            configured: Vec::new(),
        }
    }

    pub fn unset() -> Self {
        Self {
            now: None,
            configured: Vec::new(),
        }
    }
}

impl WallClock for MockClock {
    fn now(&mut self) -> Option<NaiveDateTime> {
        self.now
    }

    fn configure(&mut self, utc_offset_secs: i32) {
        self.configured.push(utc_offset_secs);
    }
}

#[derive(Debug, Default)]
pub struct RecordingScreen {
    pub renders: Vec<(PersistentState, bool)>,
    pub messages: Vec<(String, String)>,
    pub power: Vec<bool>,
}

impl RecordingScreen {
    pub fn is_on(&self) -> bool {
        self.power.last().copied().unwrap_or(false)
    }

    pub fn last_render(&self) -> &(PersistentState, bool) {
        self.renders.last().expect("nothing rendered")
    }
}

impl Screen for RecordingScreen {
    type Error = core::convert::Infallible;

    fn render(&mut self, state: &PersistentState, overlay: bool) -> Result<(), Self::Error> {
        self.renders.push((state.clone(), overlay));
        Ok(())
    }

    fn show_message(&mut self, title: &str, detail: &str) -> Result<(), Self::Error> {
        self.messages.push((title.to_string(), detail.to_string()));
        Ok(())
    }

    fn set_power(&mut self, on: bool) -> Result<(), Self::Error> {
        self.power.push(on);
        Ok(())
    }
}

pub const GEO_PARIS: &str = r#"{"status":"success","lat":48.8566,"lon":2.3522,"city":"Paris"}"#;

/// Open-Meteo shaped response covering one whole day
///
/// UV peaks at 10.0 at noon, is `null` before 06:00 and zero after 19:00.
pub fn forecast_body(date: &str, utc_offset: i32) -> String {
    let times: Vec<String> = (0..24).map(|h| format!("\"{date}T{h:02}:00\"")).collect();
    let values: Vec<String> = (0..24).map(|h| uv_at(h).map_or("null".to_string(), |v| format!("{v:.1}"))).collect();
    format!(
        r#"{{"utc_offset_seconds":{utc_offset},"current":{{"uv_index":7.5}},"hourly":{{"time":[{}],"uv_index":[{}]}}}}"#,
        times.join(","),
        values.join(",")
    )
}

/// The value `forecast_body` reports for `hour`
pub fn uv_at(hour: u32) -> Option<f32> {
    match hour {
        0..6 => None,
        6..=18 => Some((10.0 - (hour as f32 - 12.0).abs() * 1.5).max(0.0)),
        _ => Some(0.0),
    }
}

pub fn local(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(h, m, s).unwrap()
}

pub fn ms(t: u64) -> Instant {
    Instant::from_millis(t)
}

pub fn press(button: ButtonId, kind: ButtonEventKind, at: Instant) -> ButtonEvent {
    ButtonEvent {
        button,
        kind,
        timestamp: at,
    }
}

pub fn test_config() -> Config<'static> {
    let mut config = Config::DEFAULT;
    config.timing.http_timeout_ms = 50;
    config.timing.connect_timeout_ms = 400;
    config
}

pub fn fresh_store() -> TestStore {
    PersistentStateStore::new(
        RamRegion::erased(),
        RamRegion::erased(),
        PersistentState::with_defaults(&Config::DEFAULT),
    )
}

pub fn controller(net: MockNet, clock: MockClock, store: TestStore) -> TestController {
    PowerModeController::new(test_config(), net, clock, RecordingScreen::default(), store)
}

/// Simulate deep sleep: only the store survives, a new controller boots from it
pub fn reset(controller: TestController, net: MockNet, clock: MockClock) -> TestController {
    let (_, _, _, store) = controller.into_parts();
    PowerModeController::new(test_config(), net, clock, RecordingScreen::default(), store)
}
