//! Traits for the hardware and network services the engine drives
//!
//! The firmware binds these to ESP32-S3 peripherals; the simulator binds them
//! to the desktop. Everything above this layer is platform agnostic.

use alloc::vec::Vec;
use core::fmt::Debug;

use chrono::NaiveDateTime;
use embassy_time::Duration;

use crate::app_state::PersistentState;

/// Status code and body of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Blocking-style HTTP GET
///
/// The engine calls `connect` before every `get` and bounds the two
/// separately: `connect` by `TimingConfig::connect_timeout`, `get` by
/// `TimingConfig::http_timeout`. Implementations bring the link up in
/// `connect`, so a wake that never fetches never pays for Wi-Fi.
pub trait HttpTransport {
    type Error: Debug;

    /// Make sure the link is up; a no-op when it already is
    fn connect(&mut self) -> impl Future<Output = Result<(), Self::Error>> {
        async { Ok(()) }
    }

    fn get(&mut self, url: &str) -> impl Future<Output = Result<HttpResponse, Self::Error>>;
}

/// Local wall-clock time
pub trait WallClock {
    /// Current local time, `None` until the clock has been set at least once
    fn now(&mut self) -> Option<NaiveDateTime>;

    /// Apply the UTC offset of the resolved location
    fn configure(&mut self, utc_offset_secs: i32);
}

pub trait Screen {
    type Error: Debug;

    /// Redraw everything from `state`
    fn render(&mut self, state: &PersistentState, overlay: bool) -> Result<(), Self::Error>;

    /// Short two-line notice, e.g. before going to sleep
    fn show_message(&mut self, title: &str, detail: &str) -> Result<(), Self::Error>;

    fn set_power(&mut self, on: bool) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    Timer,
    ButtonInput,
    ColdBoot,
}

/// Deep sleep entry and wake-up cause
pub trait WakeControl {
    fn wake_reason(&self) -> WakeReason;

    /// Power down until `duration` elapses (or a button is pressed)
    ///
    /// Execution restarts from the reset vector; nothing in RAM survives
    /// except the retained region.
    fn suspend(&mut self, duration: Duration, wake_on_button: bool) -> !;
}
