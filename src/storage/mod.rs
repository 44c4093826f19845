//! Persistence across deep sleep and power loss
//!
//! Two regions back the store:
//!
//! - a small retained region (RTC fast memory on the device) holding the full
//!   [`PersistentState`] image; it survives deep sleep but not a battery pull
//! - a one-byte mode flag in flash, which survives power loss and is only
//!   written when the mode actually changes
//!
//! ## Retained image layout
//!
//! | Offset | Size | Content                             |
//! |--------|------|-------------------------------------|
//! | 0      | 4    | validity cookie (little endian)     |
//! | 4      | 2    | payload length (little endian)      |
//! | 6      | 2    | reserved                            |
//! | 8      | n    | postcard-encoded `PersistentState`  |
//!
//! The cookie is cleared before the payload is rewritten and set again only
//! once the payload write succeeded, so an interrupted save reads back as
//! "uninitialized" rather than as a half-written state.

pub mod mode_flag;
pub mod ram_region;

use core::fmt::Debug;

use embedded_storage::Storage;
use log::{error, info, warn};

use crate::app_state::{AppError, AppResult, PersistentState, PowerMode};

pub use mode_flag::ModeFlag;
pub use ram_region::{RamRegion, RamRegionError};

/// Sentinel marking a retained image as written by this firmware
pub const VALIDITY_COOKIE: u32 = 0x5576_A11C;

pub const HEADER_LEN: usize = 8;

/// Bytes reserved for the retained image, header included
pub const RETAINED_CAPACITY: usize = 256;

const PAYLOAD_CAPACITY: usize = RETAINED_CAPACITY - HEADER_LEN;

pub struct PersistentStateStore<R, F>
where
    R: Storage,
    F: Storage,
{
    retained: R,
    flag: ModeFlag<F>,
    defaults: PersistentState,
}

impl<R, F> PersistentStateStore<R, F>
where
    R: Storage,
    R::Error: Debug,
    F: Storage,
    F::Error: Debug,
{
    /// `defaults` is what `load` hands back when the retained image can't be trusted
    pub fn new(retained: R, flag_storage: F, defaults: PersistentState) -> Self {
        Self {
            retained,
            flag: ModeFlag::new(flag_storage),
            defaults,
        }
    }

    /// Read the retained image, rebuilding and persisting defaults if it is invalid
    pub fn load(&mut self) -> PersistentState {
        match self.read_image() {
            Ok(state) => state,
            Err(e) => {
                warn!(" Retained state unusable ({}), starting from defaults", e);
                let state = self.defaults.clone();
                if let Err(e) = self.save(&state) {
                    error!(" Failed to persist default state: {}", e);
                }
                state
            }
        }
    }

    /// Write the full state image, cookie last
    pub fn save(&mut self, state: &PersistentState) -> AppResult<()> {
        let mut payload = [0u8; PAYLOAD_CAPACITY];
        let encoded = postcard::to_slice(state, &mut payload)
            .map_err(|_| AppError::Persistence("state does not fit the retained region"))?;
        let len = encoded.len() as u16;

        self.write(0, &0u32.to_le_bytes())?;
        self.write(4, &len.to_le_bytes())?;
        self.write(HEADER_LEN as u32, &payload[..len as usize])?;
        self.write(0, &VALIDITY_COOKIE.to_le_bytes())
    }

    /// The power-loss-safe mode flag
    ///
    /// Both low-power variants read back as [`PowerMode::LowPowerSleeping`].
    pub fn read_power_mode_flag(&mut self) -> PowerMode {
        self.flag.read()
    }

    /// Persist `mode` to flash if it differs from what is stored
    pub fn write_power_mode_flag(&mut self, mode: PowerMode) -> AppResult<()> {
        if self.flag.write(mode)? {
            info!(" Power mode flag set to {}", mode.label());
        }
        Ok(())
    }

    pub fn defaults(&self) -> &PersistentState {
        &self.defaults
    }

    pub fn retained_mut(&mut self) -> &mut R {
        &mut self.retained
    }

    pub fn flag_storage_mut(&mut self) -> &mut F {
        self.flag.storage_mut()
    }

    fn read_image(&mut self) -> AppResult<PersistentState> {
        let mut header = [0u8; HEADER_LEN];
        self.retained.read(0, &mut header).map_err(|e| {
            error!(" Retained region read failed: {:?}", e);
            AppError::Persistence("retained region read failed")
        })?;

        let cookie = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        if cookie != VALIDITY_COOKIE {
            return Err(AppError::Persistence("validity cookie mismatch"));
        }

        let len = u16::from_le_bytes([header[4], header[5]]) as usize;
        if len == 0 || len > PAYLOAD_CAPACITY {
            return Err(AppError::Persistence("payload length out of range"));
        }

        let mut payload = [0u8; PAYLOAD_CAPACITY];
        self.retained
            .read(HEADER_LEN as u32, &mut payload[..len])
            .map_err(|e| {
                error!(" Retained region read failed: {:?}", e);
                AppError::Persistence("retained region read failed")
            })?;

        postcard::from_bytes(&payload[..len]).map_err(|_| AppError::Persistence("payload does not decode"))
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> AppResult<()> {
        self.retained.write(offset, bytes).map_err(|e| {
            error!(" Retained region write at {} failed: {:?}", offset, e);
            AppError::Persistence("retained region write failed")
        })
    }
}
