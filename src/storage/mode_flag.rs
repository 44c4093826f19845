//! One-byte power mode flag kept in wear-sensitive, power-loss-safe storage

use core::fmt::Debug;

use embedded_storage::Storage;
use log::error;

use crate::app_state::{AppError, AppResult, PowerMode};

/// Marker for low power. Anything else, including erased flash, means normal.
const LOW_POWER_MARKER: u8 = 0xA5;
const NORMAL_MARKER: u8 = 0x5A;

pub struct ModeFlag<F: Storage> {
    storage: F,
}

impl<F> ModeFlag<F>
where
    F: Storage,
    F::Error: Debug,
{
    pub const fn new(storage: F) -> Self {
        Self { storage }
    }

    pub fn read(&mut self) -> PowerMode {
        match self.read_marker() {
            Some(LOW_POWER_MARKER) => PowerMode::LowPowerSleeping,
            _ => PowerMode::Normal,
        }
    }

    /// Returns whether the flag had to be rewritten
    pub fn write(&mut self, mode: PowerMode) -> AppResult<bool> {
        let marker = if mode.is_low_power() {
            LOW_POWER_MARKER
        } else {
            NORMAL_MARKER
        };

        let current = self.read_marker();
        let unchanged = match current {
            Some(LOW_POWER_MARKER) => marker == LOW_POWER_MARKER,
            Some(_) => marker == NORMAL_MARKER,
            None => false,
        };
        if unchanged {
            return Ok(false);
        }

        self.storage.write(0, &[marker]).map_err(|e| {
            error!(" Mode flag write failed: {:?}", e);
            AppError::Persistence("mode flag write failed")
        })?;
        Ok(true)
    }

    pub fn storage_mut(&mut self) -> &mut F {
        &mut self.storage
    }

    fn read_marker(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.storage.read(0, &mut byte) {
            Ok(()) => Some(byte[0]),
            Err(e) => {
                error!(" Mode flag read failed: {:?}", e);
                None
            }
        }
    }
}
