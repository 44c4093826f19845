//! Deep sleep entry and wake-cause decoding

use core::convert::Infallible;
use core::time::Duration as CoreDuration;

use embassy_time::Duration;
use esp_hal::gpio::RtcPinWithResistors;
use esp_hal::peripherals::GPIO0;
use esp_hal::rtc_cntl::sleep::{Ext0WakeupSource, TimerWakeupSource, WakeupLevel};
use esp_hal::system::SleepSource;
use log::info;
use uvwatch::platform::{WakeControl, WakeReason};

use crate::SharedRtc;

pub struct DeepSleep {
    rtc: &'static SharedRtc,
    cause: SleepSource,
}

impl DeepSleep {
    /// `cause` must be read with `wakeup_cause()` before anything else touches the RTC
    pub fn new(rtc: &'static SharedRtc, cause: SleepSource) -> Self {
        Self { rtc, cause }
    }
}

impl WakeControl for DeepSleep {
    fn wake_reason(&self) -> WakeReason {
        match self.cause {
            SleepSource::Timer => WakeReason::Timer,
            SleepSource::Ext0 => WakeReason::ButtonInput,
            _ => WakeReason::ColdBoot,
        }
    }

    fn suspend(&mut self, duration: Duration, wake_on_button: bool) -> ! {
        let timer = TimerWakeupSource::new(CoreDuration::from_millis(duration.as_millis()));
        info!(" Deep sleep for {} ms", duration.as_millis());

        let slept = self.rtc.lock(|rtc| -> Infallible {
            let mut rtc = rtc.borrow_mut();
            if wake_on_button {
                // SAFETY: the button input driver is never used again, sleep does not return
                let pin = unsafe { GPIO0::steal() };
                pin.rtcio_pullup(true);
                pin.rtcio_pulldown(false);
                // Mode button is active low
                let ext0 = Ext0WakeupSource::new(pin, WakeupLevel::Low);
                rtc.sleep_deep(&[&timer, &ext0])
            } else {
                rtc.sleep_deep(&[&timer])
            }
        });
        match slept {}
    }
}
