//! Local wall clock on top of the RTC
//!
//! The RTC keeps counting through deep sleep, so once SNTP has set it the
//! time stays valid until power is lost.

use chrono::{DateTime, NaiveDateTime, TimeDelta};
use uvwatch::platform::WallClock;

use crate::SharedRtc;

/// RTC readings before 2024-01-01 mean the clock was never set
pub const MIN_VALID_UNIX_SECS: i64 = 1_704_067_200;

pub fn rtc_utc(rtc: &SharedRtc) -> Option<NaiveDateTime> {
    let us = rtc.lock(|rtc| rtc.borrow().current_time_us());
    let secs = (us / 1_000_000) as i64;
    if secs < MIN_VALID_UNIX_SECS {
        return None;
    }
    DateTime::from_timestamp(secs, ((us % 1_000_000) * 1_000) as u32).map(|t| t.naive_utc())
}

pub fn set_rtc_utc(rtc: &SharedRtc, unix_secs: u64, micros: u32) {
    let us = unix_secs * 1_000_000 + micros as u64;
    rtc.lock(|rtc| rtc.borrow_mut().set_current_time_us(us));
}

pub struct RtcClock {
    rtc: &'static SharedRtc,
    utc_offset: TimeDelta,
}

impl RtcClock {
    pub fn new(rtc: &'static SharedRtc) -> Self {
        Self {
            rtc,
            utc_offset: TimeDelta::zero(),
        }
    }
}

impl WallClock for RtcClock {
    fn now(&mut self) -> Option<NaiveDateTime> {
        rtc_utc(self.rtc).map(|utc| utc + self.utc_offset)
    }

    fn configure(&mut self, utc_offset_secs: i32) {
        self.utc_offset = TimeDelta::seconds(utc_offset_secs as i64);
    }
}
