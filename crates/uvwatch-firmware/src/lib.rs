//! ESP32-S3 bindings for the uvwatch engine
//!
//! This crate contains hardware-specific code that cannot compile on desktop
//! targets: the RTC clock and deep sleep, the retained RTC fast memory, the
//! flash-backed mode flag, Wi-Fi with HTTPS and SNTP, and the SPI LCD.

#![no_std]

extern crate alloc;

pub mod clock;
pub mod display;
pub mod flag;
pub mod net;
pub mod retained;
pub mod secrets;
pub mod wake;

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use esp_hal::rtc_cntl::Rtc;

/// The RTC is shared by the wall clock, SNTP sync and deep sleep
pub type SharedRtc = Mutex<CriticalSectionRawMutex, RefCell<Rtc<'static>>>;

// When you are okay with using a nightly compiler it's better to use https://docs.rs/static_cell/2.1.0/static_cell/macro.make_static.html
#[macro_export]
macro_rules! mk_static {
    ($t:ty,$val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write(($val));
        x
    }};
}
