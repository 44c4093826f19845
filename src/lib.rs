//! Hardware-independent engine for the uvwatch UV-index display
//!
//! This crate decides when the device wakes, fetches and renders, and when it
//! goes back to deep sleep: button classification, the update grid, forecast
//! alignment, persistence across sleep, and the power-mode state machine that
//! ties them together. Hardware and network access go through the traits in
//! [`platform`].
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both the
//! ESP32-S3 and desktop hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod app_state;
pub mod buttons;
pub mod config;
pub mod forecast;
pub mod platform;
pub mod power;
pub mod render;
pub mod schedule;
pub mod storage;
pub mod view;

pub use app_state::{AppError, AppResult, PersistentState, PowerMode};
pub use config::Config;
pub use power::{PowerModeController, Step};
