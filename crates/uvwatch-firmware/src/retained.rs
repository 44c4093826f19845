//! The retained state region in RTC fast memory
//!
//! Survives deep sleep, lost on power-off. Validity is up to the store's
//! cookie; this module only hands out the raw bytes.

use core::sync::atomic::{AtomicBool, Ordering};

use embedded_storage::{ReadStorage, Storage};
use thiserror_no_std::Error;
use uvwatch::storage::RETAINED_CAPACITY;

#[esp_hal::ram(unstable(rtc_fast))]
static mut RETAINED: [u8; RETAINED_CAPACITY] = [0; RETAINED_CAPACITY];

static TAKEN: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Error)]
#[error("access at {offset} (+{len}) outside the retained region")]
pub struct OutOfBounds {
    offset: u32,
    len: usize,
}

pub struct RetainedRegion {
    bytes: &'static mut [u8; RETAINED_CAPACITY],
}

impl RetainedRegion {
    /// The one handle to the region, `None` if already taken
    pub fn take() -> Option<Self> {
        if TAKEN.swap(true, Ordering::AcqRel) {
            return None;
        }
        // SAFETY: the flag above guarantees this is the only reference ever created
        let bytes = unsafe { &mut *(&raw mut RETAINED) };
        Some(Self { bytes })
    }

    fn range(&self, offset: u32, len: usize) -> Result<core::ops::Range<usize>, OutOfBounds> {
        let start = offset as usize;
        match start.checked_add(len) {
            Some(end) if end <= RETAINED_CAPACITY => Ok(start..end),
            _ => Err(OutOfBounds { offset, len }),
        }
    }
}

impl ReadStorage for RetainedRegion {
    type Error = OutOfBounds;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let range = self.range(offset, bytes.len())?;
        bytes.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        RETAINED_CAPACITY
    }
}

impl Storage for RetainedRegion {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let range = self.range(offset, bytes.len())?;
        self.bytes[range].copy_from_slice(bytes);
        Ok(())
    }
}
