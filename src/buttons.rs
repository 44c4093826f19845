//! Debounced short/long press classification for the two front buttons
//!
//! Each physical input gets its own [`ButtonClassifier`], polled once per loop
//! tick with the raw level. Classification only updates the classifier's own
//! timers; acting on events is up to the caller.
//!
//! ```text
//! Idle --press--> Pressed(since) --held >= long press--> LongPressFired --release--> Idle
//!                     |
//!                     +--release before long press--> ShortPress, Idle
//! ```

use embassy_time::{Duration, Instant};
use embedded_hal::digital::InputPin;
use heapless::Vec;
use log::{debug, warn};

/// Hold-off after an accepted edge during which the opposite edge is ignored
pub const DEBOUNCE: Duration = Duration::from_millis(40);

pub const LONG_PRESS: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonId {
    /// Toggles the info overlay (short) and power mode (long)
    ModeToggle,
    /// Wakes the screen (short) and switches location source (long, overlay only)
    Location,
}

impl ButtonId {
    pub const ALL: [ButtonId; 2] = [ButtonId::ModeToggle, ButtonId::Location];

    pub const fn label(self) -> &'static str {
        match self {
            Self::ModeToggle => "mode",
            Self::Location => "location",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEventKind {
    ShortPress,
    LongPressStart,
    /// Still held after the long press fired
    LongPressHeld,
    /// Released, no action attached
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub button: ButtonId,
    pub kind: ButtonEventKind,
    pub timestamp: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Pressed { since: Instant },
    LongPressFired,
}

#[derive(Debug, Clone)]
pub struct ButtonClassifier {
    id: ButtonId,
    phase: Phase,
    /// Debounced level, true while pressed
    pressed: bool,
    last_edge: Option<Instant>,
    debounce: Duration,
    long_press: Duration,
}

impl ButtonClassifier {
    pub const fn new(id: ButtonId) -> Self {
        Self::with_timing(id, DEBOUNCE, LONG_PRESS)
    }

    pub const fn with_timing(id: ButtonId, debounce: Duration, long_press: Duration) -> Self {
        Self {
            id,
            phase: Phase::Idle,
            pressed: false,
            last_edge: None,
            debounce,
            long_press,
        }
    }

    pub const fn id(&self) -> ButtonId {
        self.id
    }

    /// Feed one raw sample, returning the action it completes, if any
    ///
    /// Only `ShortPress` and `LongPressStart` are returned; each physical press
    /// yields at most one of them.
    pub fn poll(&mut self, pressed: bool, now: Instant) -> Option<ButtonEvent> {
        if pressed != self.pressed {
            let settled = self
                .last_edge
                .is_none_or(|at| now.saturating_duration_since(at) >= self.debounce);
            if !settled {
                return None;
            }
            self.pressed = pressed;
            self.last_edge = Some(now);
            return self.on_edge(pressed, now);
        }

        match self.phase {
            Phase::Pressed { since } if now.saturating_duration_since(since) >= self.long_press => {
                self.phase = Phase::LongPressFired;
                self.event(ButtonEventKind::LongPressStart, now)
            }
            _ => None,
        }
    }

    /// What the button is doing right now, for UIs that track a hold
    pub fn held_kind(&self) -> Option<ButtonEventKind> {
        match self.phase {
            Phase::LongPressFired => Some(ButtonEventKind::LongPressHeld),
            _ => None,
        }
    }

    pub const fn is_pressed(&self) -> bool {
        self.pressed
    }

    fn on_edge(&mut self, pressed: bool, now: Instant) -> Option<ButtonEvent> {
        match (self.phase, pressed) {
            (Phase::Idle, true) => {
                self.phase = Phase::Pressed { since: now };
                None
            }
            (Phase::Pressed { since }, false) => {
                self.phase = Phase::Idle;
                if now.saturating_duration_since(since) < self.long_press {
                    self.event(ButtonEventKind::ShortPress, now)
                } else {
                    // The loop missed the threshold while the button was held
                    self.event(ButtonEventKind::LongPressStart, now)
                }
            }
            (Phase::LongPressFired, false) => {
                self.phase = Phase::Idle;
                None
            }
            _ => None,
        }
    }

    fn event(&self, kind: ButtonEventKind, timestamp: Instant) -> Option<ButtonEvent> {
        debug!(" Button {}: {:?}", self.id.label(), kind);
        Some(ButtonEvent {
            button: self.id,
            kind,
            timestamp,
        })
    }
}

/// Both front buttons with their classifiers
///
/// Inputs are active low (pulled up, shorted to ground when pressed).
pub struct ButtonPad<A, B>
where
    A: InputPin,
    B: InputPin,
{
    mode: A,
    location: B,
    classifiers: [ButtonClassifier; 2],
}

impl<A, B> ButtonPad<A, B>
where
    A: InputPin,
    B: InputPin,
{
    pub fn new(mode: A, location: B, debounce: Duration, long_press: Duration) -> Self {
        Self {
            mode,
            location,
            classifiers: ButtonId::ALL.map(|id| ButtonClassifier::with_timing(id, debounce, long_press)),
        }
    }

    /// Sample both inputs once
    ///
    /// A pin read error counts as "not pressed" for that tick.
    pub fn poll(&mut self, now: Instant) -> Vec<ButtonEvent, 2> {
        let levels = [
            self.mode.is_low().unwrap_or_else(|e| {
                warn!(" Mode button read failed: {:?}", e);
                false
            }),
            self.location.is_low().unwrap_or_else(|e| {
                warn!(" Location button read failed: {:?}", e);
                false
            }),
        ];

        let mut events = Vec::new();
        for (classifier, pressed) in self.classifiers.iter_mut().zip(levels) {
            if let Some(event) = classifier.poll(pressed, now) {
                // Capacity equals the number of classifiers
                let _ = events.push(event);
            }
        }
        events
    }

    pub fn classifier(&self, id: ButtonId) -> &ButtonClassifier {
        match id {
            ButtonId::ModeToggle => &self.classifiers[0],
            ButtonId::Location => &self.classifiers[1],
        }
    }
}
