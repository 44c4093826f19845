use core::fmt::{Debug, Write};

use chrono::{NaiveDateTime, TimeDelta};
use embassy_time::{Duration, Instant, Timer};
use embedded_hal::digital::InputPin;
use embedded_storage::Storage;
use heapless::String;
use log::{debug, error, info, warn};

use crate::app_state::{PersistentState, PowerMode, format_clock_label};
use crate::buttons::{ButtonEvent, ButtonEventKind, ButtonId, ButtonPad};
use crate::config::Config;
use crate::platform::{HttpTransport, Screen, WakeControl, WakeReason, WallClock};
use crate::schedule::{DUE_TOLERANCE_SECS, compute_low_power_sleep, compute_schedule, missed_low_power_instant};
use crate::storage::PersistentStateStore;

/// What the device should sleep for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuspendRequest {
    pub duration: Duration,
    pub wake_on_button: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Suspend(SuspendRequest),
}

/// Runtime state of the controller
///
/// `LowPowerSleeping` has no variant: while sleeping nothing runs, and the
/// mode only exists in the persisted flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    /// Constructed, `boot` not called yet
    Booting,
    NormalActive,
    /// Low power, screen on for user interaction until `deadline`
    TemporaryWake { deadline: Instant },
    /// Low power selected, confirmation on screen until `until`
    Confirming { until: Instant },
}

pub struct PowerModeController<'a, N, C, S, R, F>
where
    N: HttpTransport,
    C: WallClock,
    S: Screen,
    R: Storage,
    F: Storage,
{
    pub(super) config: Config<'a>,
    pub(super) net: N,
    pub(super) clock: C,
    pub(super) screen: S,
    pub(super) store: PersistentStateStore<R, F>,
    pub(super) state: PersistentState,
    phase: ControllerPhase,
    overlay: bool,
    last_serviced: Option<NaiveDateTime>,
    /// Low-power grid instants up to here need no fetch
    serviced_through: Option<NaiveDateTime>,
    /// Next refresh while the wall clock is unknown
    blind_refresh_at: Option<Instant>,
}

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
    pub fn new(config: Config<'a>, net: N, clock: C, screen: S, store: PersistentStateStore<R, F>) -> Self {
        let state = store.defaults().clone();
        Self {
            config,
            net,
            clock,
            screen,
            store,
            state,
            phase: ControllerPhase::Booting,
            overlay: false,
            last_serviced: None,
            serviced_through: None,
            blind_refresh_at: None,
        }
    }

    /// Entry point after every reset, deep-sleep wake included
    pub async fn boot(&mut self, reason: WakeReason, now: Instant) -> Step {
        self.state = self.store.load();

        // The flag outlives the retained image, so it decides the mode
        self.state.power_mode = if self.store.read_power_mode_flag().is_low_power() {
            PowerMode::LowPowerSleeping
        } else {
            PowerMode::Normal
        };
        if let Some(offset) = self.state.utc_offset_secs {
            self.clock.configure(offset);
        }

        info!(" Boot after {:?} in {} mode", reason, self.state.power_mode.label());

        match (self.state.power_mode, reason) {
            (PowerMode::Normal, _) => {
                self.enter_normal(now, false).await;
                Step::Continue
            }
            (_, WakeReason::Timer) => {
                info!(" Silent refresh");
                self.refresh(false).await;
                Step::Suspend(self.prepare_sleep().await)
            }
            (_, WakeReason::ButtonInput) => {
                self.enter_temporary_wake(now);
                Step::Continue
            }
            (_, WakeReason::ColdBoot) => {
                self.set_screen_power(true);
                self.show_message("Low power mode", "Updating...");
                self.refresh(false).await;
                self.enter_temporary_wake(now);
                Step::Continue
            }
        }
    }

    /// One pass of the cooperative loop
    pub async fn tick(&mut self, now: Instant, events: &[ButtonEvent]) -> Step {
        for event in events {
            self.handle_button(*event, now).await;
        }

        match self.phase {
            ControllerPhase::Booting => Step::Continue,
            ControllerPhase::NormalActive => {
                if self.update_due(now) {
                    info!(" Scheduled update due");
                    self.refresh(false).await;
                    self.mark_serviced();
                    self.render();
                }
                Step::Continue
            }
            ControllerPhase::TemporaryWake { deadline } if now >= deadline => {
                info!(" Wake window elapsed");
                Step::Suspend(self.prepare_sleep().await)
            }
            ControllerPhase::Confirming { until } if now >= until => Step::Suspend(self.prepare_sleep().await),
            ControllerPhase::TemporaryWake { .. } | ControllerPhase::Confirming { .. } => Step::Continue,
        }
    }

    /// Boot, then poll buttons and tick until the device suspends
    pub async fn run<A, B, W>(mut self, mut buttons: ButtonPad<A, B>, mut wake: W) -> !
    where
        A: InputPin,
        B: InputPin,
        W: WakeControl,
    {
        let mut step = self.boot(wake.wake_reason(), Instant::now()).await;
        loop {
            if let Step::Suspend(request) = step {
                self.suspend(&mut wake, request);
            }
            Timer::after(self.config.timing.tick()).await;

            let now = Instant::now();
            let events = buttons.poll(now);
            step = self.tick(now, &events).await;
        }
    }

    /// Persist, blank the screen and hand over to the wake controller
    pub fn suspend<W: WakeControl>(&mut self, wake: &mut W, request: SuspendRequest) -> ! {
        self.persist();
        self.set_screen_power(false);
        info!(
            " Suspending for {} s (button wake: {})",
            request.duration.as_secs(),
            request.wake_on_button
        );
        wake.suspend(request.duration, request.wake_on_button)
    }

    pub fn state(&self) -> &PersistentState {
        &self.state
    }

    pub fn phase(&self) -> ControllerPhase {
        self.phase
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay
    }

    pub fn screen(&self) -> &S {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut S {
        &mut self.screen
    }

    pub fn net_mut(&mut self) -> &mut N {
        &mut self.net
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Tear down for a simulated reset
    pub fn into_parts(self) -> (N, C, S, PersistentStateStore<R, F>) {
        (self.net, self.clock, self.screen, self.store)
    }

    async fn handle_button(&mut self, event: ButtonEvent, now: Instant) {
        match (event.button, event.kind, self.phase) {
            (_, _, ControllerPhase::Booting | ControllerPhase::Confirming { .. }) => {
                debug!(" Ignoring {:?} while {:?}", event.kind, self.phase);
            }
            (ButtonId::ModeToggle, ButtonEventKind::LongPressStart, ControllerPhase::NormalActive) => {
                self.begin_low_power(now);
            }
            (ButtonId::ModeToggle, ButtonEventKind::LongPressStart, ControllerPhase::TemporaryWake { .. }) => {
                info!(" Leaving low power mode");
                if let Err(e) = self.store.write_power_mode_flag(PowerMode::Normal) {
                    error!(" Failed to clear low power flag: {}", e);
                }
                self.enter_normal(now, true).await;
            }
            (ButtonId::ModeToggle, ButtonEventKind::ShortPress, _) => {
                self.overlay = !self.overlay;
                self.render();
                self.extend_wake(now);
            }
            (ButtonId::Location, ButtonEventKind::LongPressStart, _) if self.overlay => {
                self.toggle_location().await;
                self.render();
                self.extend_wake(now);
            }
            (ButtonId::Location, ButtonEventKind::LongPressStart, _) => {
                debug!(" Location toggle ignored, overlay hidden");
            }
            (ButtonId::Location, ButtonEventKind::ShortPress, _) => self.extend_wake(now),
            _ => {}
        }
    }

    async fn enter_normal(&mut self, now: Instant, force_refresh: bool) {
        self.state.power_mode = PowerMode::Normal;
        self.phase = ControllerPhase::NormalActive;
        self.set_screen_power(true);

        let due = self.update_due(now);
        if due || force_refresh || !self.state.has_valid_forecast {
            self.refresh(false).await;
            self.mark_serviced();
        } else {
            self.persist();
        }
        self.render();
    }

    fn enter_temporary_wake(&mut self, now: Instant) {
        self.hold_serviced_at_least_now();
        self.state.power_mode = PowerMode::LowPowerTemporaryWake;
        self.phase = ControllerPhase::TemporaryWake {
            deadline: now + self.config.timing.wake_window(),
        };
        self.set_screen_power(true);
        self.render();
    }

    fn begin_low_power(&mut self, now: Instant) {
        info!(" Entering low power mode");
        if let Err(e) = self.store.write_power_mode_flag(PowerMode::LowPowerSleeping) {
            error!(" Failed to set low power flag: {}", e);
        }
        self.state.power_mode = PowerMode::LowPowerSleeping;
        self.overlay = false;
        self.hold_serviced_at_least_now();
        self.persist();

        let mut detail: String<32> = String::new();
        match self.clock.now() {
            Some(local) => {
                let next = compute_schedule(local, self.config.schedule, PowerMode::LowPowerSleeping, None);
                let _ = write!(detail, "Next update {}", format_clock_label(next.next_update_instant));
            }
            None => {
                let _ = detail.push_str("Next update unknown");
            }
        }
        self.show_message("Low power mode", &detail);

        self.phase = ControllerPhase::Confirming {
            until: now + self.config.timing.confirmation_hold(),
        };
    }

    /// Restart the wake window after user activity
    fn extend_wake(&mut self, now: Instant) {
        if let ControllerPhase::TemporaryWake { .. } = self.phase {
            self.phase = ControllerPhase::TemporaryWake {
                deadline: now + self.config.timing.wake_window(),
            };
        }
    }

    /// Whether the active-mode grid wants an update right now
    fn update_due(&mut self, now: Instant) -> bool {
        match self.clock.now() {
            Some(local) => {
                self.blind_refresh_at = None;
                compute_schedule(local, self.config.schedule, PowerMode::Normal, self.last_serviced).is_due_now
            }
            None => {
                // No wall clock: refresh on a fixed monotonic cadence instead
                let due = self.blind_refresh_at.is_none_or(|at| now >= at);
                if due {
                    self.blind_refresh_at = Some(now + self.config.timing.fallback_sleep());
                }
                due
            }
        }
    }

    fn mark_serviced(&mut self) {
        if let Some(local) = self.clock.now() {
            let result = compute_schedule(local, self.config.schedule, PowerMode::Normal, self.last_serviced);
            if let Some(instant) = result.due_instant {
                self.last_serviced = Some(instant);
            }
        }
    }

    /// Grid instants that passed before the device woke up are not owed a fetch
    fn hold_serviced_at_least_now(&mut self) {
        if let Some(local) = self.clock.now() {
            self.serviced_through = Some(self.serviced_through.map_or(local, |at| at.max(local)));
        }
    }

    /// A fetch at `local` covers every grid instant up to the due tolerance after it
    pub(super) fn mark_fetched_at(&mut self, local: NaiveDateTime) {
        self.serviced_through = Some(local + TimeDelta::seconds(DUE_TOLERANCE_SECS));
    }

    /// Settle on the sleep duration and persist everything for the next boot
    ///
    /// A grid instant that came due while the screen was on is fetched for
    /// first, silently, so the wake window never swallows a slot.
    async fn prepare_sleep(&mut self) -> SuspendRequest {
        self.state.power_mode = PowerMode::LowPowerSleeping;

        if let Some(local) = self.clock.now() {
            let serviced = self.serviced_through.unwrap_or(local);
            if let Some(instant) = missed_low_power_instant(local, self.config.schedule, serviced) {
                info!(" Update for {} came due while awake", instant);
                self.refresh(false).await;
            }
        }

        let duration = match self.clock.now() {
            Some(local) => {
                let serviced = self.serviced_through.unwrap_or(local);
                let result = compute_low_power_sleep(local, self.config.schedule, serviced);
                info!(" Next update at {}", result.next_update_instant);
                result.sleep_duration
            }
            None => {
                warn!(" Wall clock unknown, using fallback sleep");
                self.config.timing.fallback_sleep()
            }
        };

        self.persist();
        SuspendRequest {
            duration,
            wake_on_button: true,
        }
    }

    pub(super) fn persist(&mut self) {
        if let Err(e) = self.store.save(&self.state) {
            error!(" Failed to persist state: {}", e);
        }
    }

    fn render(&mut self) {
        if let Err(e) = self.screen.render(&self.state, self.overlay) {
            error!(" Failed to render: {:?}", e);
        }
    }

    fn show_message(&mut self, title: &str, detail: &str) {
        if let Err(e) = self.screen.show_message(title, detail) {
            error!(" Failed to show message: {:?}", e);
        }
    }

    fn set_screen_power(&mut self, on: bool) {
        if let Err(e) = self.screen.set_power(on) {
            error!(" Failed to switch screen {}: {:?}", if on { "on" } else { "off" }, e);
        }
    }
}
