//! Desktop simulator for the uvwatch UV-index display.
//!
//! Runs the real `PowerModeController` against the live forecast and
//! geolocation services, renders into an SDL2 window via
//! `embedded-graphics-simulator`, and simulates deep sleep by blanking the
//! window and rebuilding the controller from the retained region.
//!
//! # Key bindings
//!
//! | Key | Action                                             |
//! |-----|----------------------------------------------------|
//! | M   | Mode button (tap: info overlay, hold: power mode)  |
//! | L   | Location button (hold with overlay: switch source) |
//! | W   | End a simulated sleep early (timer wake)           |
//! | Q   | Quit                                               |
//!
//! # Environment
//!
//! - `UVWATCH_CONFIG`: path of a JSON `Config` to use instead of the defaults
//! - `UVWATCH_FAST_SLEEP`: when set, sleeps last a few real seconds and the
//!   simulated wall clock jumps forward by the rest
//!
//! The low-power flag lives in a file next to the executable's working
//! directory, so it survives restarts the same way flash survives a battery
//! pull. The retained region does not.

use std::cell::Cell;
use std::convert::Infallible;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration as StdDuration, Instant as StdInstant};

use chrono::{NaiveDateTime, TimeDelta, Utc};
use embassy_futures::block_on;
use embassy_time::Instant;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics_simulator::{OutputSettingsBuilder, SimulatorDisplay, SimulatorEvent, Window, sdl2::Keycode};
use embedded_hal::digital::{ErrorType, InputPin};
use embedded_storage::{ReadStorage, Storage};
use log::{error, info, warn};

use uvwatch::app_state::PersistentState;
use uvwatch::buttons::ButtonPad;
use uvwatch::config::Config;
use uvwatch::platform::{HttpResponse, HttpTransport, Screen, WakeReason, WallClock};
use uvwatch::power::SuspendRequest;
use uvwatch::render::{DISPLAY_HEIGHT, DISPLAY_WIDTH, draw_dashboard, draw_message};
use uvwatch::storage::{PersistentStateStore, RETAINED_CAPACITY, RamRegion};
use uvwatch::view::DashboardView;
use uvwatch::{PowerModeController, Step};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Pixel scale factor for the simulator window.
const WINDOW_SCALE: u32 = 2;

/// Poll interval while the simulated device is asleep.
const SLEEP_POLL: StdDuration = StdDuration::from_millis(50);

/// Real time a simulated sleep lasts with `UVWATCH_FAST_SLEEP`.
const FAST_SLEEP: StdDuration = StdDuration::from_secs(3);

const FLAG_FILE: &str = "uvwatch-mode.flag";
const FLAG_LEN: usize = 4;

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Blocking ureq client behind the async transport trait
struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    fn new(timeout: StdDuration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(timeout)
                .user_agent("uvwatch-simulator")
                .build(),
        }
    }
}

impl HttpTransport for UreqTransport {
    type Error = ureq::Transport;

    async fn get(&mut self, url: &str) -> Result<HttpResponse, Self::Error> {
        let response = match self.agent.get(url).call() {
            Ok(response) => response,
            // Non-2xx replies still carry a status the engine wants to see
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(e)) => return Err(e),
        };

        let status = response.status();
        let mut body = Vec::new();
        if let Err(e) = response.into_reader().read_to_end(&mut body) {
            warn!("Failed to read response body: {}", e);
        }
        Ok(HttpResponse { status, body })
    }
}

// ---------------------------------------------------------------------------
// Wall clock
// ---------------------------------------------------------------------------

/// Host UTC shifted by the learned offset and by time skipped while asleep
struct SimClock {
    utc_offset: Option<TimeDelta>,
    warp: TimeDelta,
}

impl SimClock {
    fn new() -> Self {
        Self {
            utc_offset: None,
            warp: TimeDelta::zero(),
        }
    }

    fn advance(&mut self, by: StdDuration) {
        if let Ok(delta) = TimeDelta::from_std(by) {
            self.warp += delta;
        }
    }
}

impl WallClock for SimClock {
    fn now(&mut self) -> Option<NaiveDateTime> {
        // Like an RTC after SNTP: UTC is known, local time is UTC until an offset arrives
        let utc = Utc::now().naive_utc() + self.warp;
        Some(utc + self.utc_offset.unwrap_or_else(TimeDelta::zero))
    }

    fn configure(&mut self, utc_offset_secs: i32) {
        self.utc_offset = Some(TimeDelta::seconds(utc_offset_secs as i64));
    }
}

// ---------------------------------------------------------------------------
// Screen
// ---------------------------------------------------------------------------

struct SimScreen {
    display: SimulatorDisplay<Rgb565>,
    window: Window,
}

impl SimScreen {
    fn new(window: Window) -> Self {
        let mut screen = Self {
            display: SimulatorDisplay::new(Size::new(DISPLAY_WIDTH, DISPLAY_HEIGHT)),
            window,
        };
        // The SDL window is created on the first `update()`; `events()` panics before that.
        screen.blank();
        screen
    }

    fn blank(&mut self) {
        let _ = self.display.clear(Rgb565::BLACK);
        self.window.update(&self.display);
    }

    fn events(&mut self) -> Vec<SimulatorEvent> {
        self.window.events().collect()
    }
}

impl Screen for SimScreen {
    type Error = Infallible;

    fn render(&mut self, state: &PersistentState, overlay: bool) -> Result<(), Self::Error> {
        let view = DashboardView::new(state, overlay);
        draw_dashboard(&mut self.display, &view)?;
        self.window.update(&self.display);
        Ok(())
    }

    fn show_message(&mut self, title: &str, detail: &str) -> Result<(), Self::Error> {
        draw_message(&mut self.display, title, detail)?;
        self.window.update(&self.display);
        Ok(())
    }

    fn set_power(&mut self, on: bool) -> Result<(), Self::Error> {
        if !on {
            self.blank();
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Buttons
// ---------------------------------------------------------------------------

/// Active-low input driven by a keyboard key
#[derive(Clone)]
struct KeyPin {
    pressed: Rc<Cell<bool>>,
}

impl KeyPin {
    fn new() -> Self {
        Self {
            pressed: Rc::new(Cell::new(false)),
        }
    }

    fn set(&self, pressed: bool) {
        self.pressed.set(pressed);
    }
}

impl ErrorType for KeyPin {
    type Error = Infallible;
}

impl InputPin for KeyPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.pressed.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.pressed.get())
    }
}

// ---------------------------------------------------------------------------
// Mode flag file
// ---------------------------------------------------------------------------

/// Stand-in for the flash sector holding the low-power flag
struct FlagFile {
    path: PathBuf,
}

impl FlagFile {
    fn contents(&self) -> [u8; FLAG_LEN] {
        let mut bytes = [0xFF; FLAG_LEN];
        if let Ok(stored) = fs::read(&self.path) {
            let n = stored.len().min(FLAG_LEN);
            bytes[..n].copy_from_slice(&stored[..n]);
        }
        bytes
    }
}

impl ReadStorage for FlagFile {
    type Error = std::io::Error;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let contents = self.contents();
        let start = offset as usize;
        let source = contents
            .get(start..start + bytes.len())
            .ok_or_else(|| std::io::Error::other("read past end of flag file"))?;
        bytes.copy_from_slice(source);
        Ok(())
    }

    fn capacity(&self) -> usize {
        FLAG_LEN
    }
}

impl Storage for FlagFile {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let mut contents = self.contents();
        let start = offset as usize;
        contents
            .get_mut(start..start + bytes.len())
            .ok_or_else(|| std::io::Error::other("write past end of flag file"))?
            .copy_from_slice(bytes);
        fs::write(&self.path, contents)
    }
}

// ---------------------------------------------------------------------------
// Setup helpers
// ---------------------------------------------------------------------------

fn load_config() -> Config<'static> {
    let Ok(path) = std::env::var("UVWATCH_CONFIG") else {
        return Config::DEFAULT;
    };

    match fs::read_to_string(&path) {
        Ok(contents) => {
            // Config borrows its strings; the simulator keeps them for its whole life
            let contents: &'static str = Box::leak(contents.into_boxed_str());
            match serde_json::from_str(contents) {
                Ok(config) => {
                    info!("Loaded config from {}", path);
                    config
                }
                Err(e) => {
                    error!("Invalid config {}: {}", path, e);
                    Config::DEFAULT
                }
            }
        }
        Err(e) => {
            error!("Failed to read config {}: {}", path, e);
            Config::DEFAULT
        }
    }
}

fn to_std(duration: embassy_time::Duration) -> StdDuration {
    StdDuration::from_millis(duration.as_millis())
}

/// Forward key state to the virtual buttons; `false` once the user quits
fn handle_keys(events: &[SimulatorEvent], mode: &KeyPin, location: &KeyPin) -> bool {
    for event in events {
        match event {
            SimulatorEvent::Quit => return false,
            SimulatorEvent::KeyDown { keycode, repeat, .. } if !repeat => match *keycode {
                Keycode::Q | Keycode::Escape => return false,
                Keycode::M => mode.set(true),
                Keycode::L => location.set(true),
                _ => {}
            },
            SimulatorEvent::KeyUp { keycode, .. } => match *keycode {
                Keycode::M => mode.set(false),
                Keycode::L => location.set(false),
                _ => {}
            },
            _ => {}
        }
    }
    true
}

/// Block through a simulated deep sleep; `None` if the user quit
fn sleep(screen: &mut SimScreen, clock: &mut SimClock, request: SuspendRequest, fast: bool) -> Option<WakeReason> {
    let requested = to_std(request.duration);
    let real = if fast { requested.min(FAST_SLEEP) } else { requested };
    let started = StdInstant::now();
    info!(
        "Sleeping for {} s (button wake: {})",
        requested.as_secs(),
        request.wake_on_button
    );

    while started.elapsed() < real {
        std::thread::sleep(SLEEP_POLL);
        for event in screen.events() {
            match event {
                SimulatorEvent::Quit => return None,
                SimulatorEvent::KeyDown { keycode, .. } => match keycode {
                    Keycode::Q | Keycode::Escape => return None,
                    Keycode::W => {
                        clock.advance(requested.saturating_sub(started.elapsed()));
                        return Some(WakeReason::Timer);
                    }
                    Keycode::M | Keycode::L if request.wake_on_button => return Some(WakeReason::ButtonInput),
                    _ => {}
                },
                _ => {}
            }
        }
    }

    clock.advance(requested.saturating_sub(started.elapsed()));
    Some(WakeReason::Timer)
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();

    info!("uvwatch simulator starting");
    info!("Keys: M=Mode  L=Location  W=Wake  Q=Quit");

    let config = load_config();
    let fast = std::env::var_os("UVWATCH_FAST_SLEEP").is_some();

    let output_settings = OutputSettingsBuilder::new().scale(WINDOW_SCALE).build();
    let screen = SimScreen::new(Window::new("uvwatch Simulator", &output_settings));

    let store = PersistentStateStore::new(
        RamRegion::<RETAINED_CAPACITY>::erased(),
        FlagFile {
            path: PathBuf::from(FLAG_FILE),
        },
        PersistentState::with_defaults(&config),
    );

    let mode_key = KeyPin::new();
    let location_key = KeyPin::new();

    let mut parts = (
        UreqTransport::new(to_std(config.timing.http_timeout())),
        SimClock::new(),
        screen,
        store,
    );
    let mut reason = WakeReason::ColdBoot;

    // -----------------------------------------------------------------------
    // Power cycles: each pass is one boot of the device
    // -----------------------------------------------------------------------
    'power: loop {
        let (net, clock, screen, store) = parts;
        let mut controller = PowerModeController::new(config.clone(), net, clock, screen, store);
        let mut buttons = ButtonPad::new(
            mode_key.clone(),
            location_key.clone(),
            config.timing.debounce(),
            config.timing.long_press(),
        );
        mode_key.set(false);
        location_key.set(false);

        let mut step = block_on(controller.boot(reason, Instant::now()));

        // --- Awake ----------------------------------------------------------
        let request = loop {
            if let Step::Suspend(request) = step {
                break request;
            }
            std::thread::sleep(to_std(config.timing.tick()));

            let events = controller.screen_mut().events();
            if !handle_keys(&events, &mode_key, &location_key) {
                break 'power;
            }

            let now = Instant::now();
            let presses = buttons.poll(now);
            step = block_on(controller.tick(now, &presses));
        };

        // --- Asleep ---------------------------------------------------------
        let (net, mut clock, mut screen, store) = controller.into_parts();
        screen.blank();
        match sleep(&mut screen, &mut clock, request, fast) {
            Some(wake) => reason = wake,
            None => break 'power,
        }
        parts = (net, clock, screen, store);
    }

    info!("Simulator exiting");
}
