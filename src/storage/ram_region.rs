//! In-memory storage region for hosts and tests

use embedded_storage::{ReadStorage, Storage};
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RamRegionError {
    #[error("Access at {offset} of {len} bytes is out of bounds")]
    OutOfBounds { offset: u32, len: usize },
    #[error("Injected write failure")]
    WriteFailed,
}

/// A byte region that behaves like a small flash/RTC memory window
///
/// Writes can be made to fail after a budget runs out, which is how tests
/// emulate a reset in the middle of a save.
#[derive(Debug, Clone)]
pub struct RamRegion<const N: usize> {
    bytes: [u8; N],
    writes_left: usize,
    write_count: usize,
}

impl<const N: usize> RamRegion<N> {
    /// A region in the erased state (all `0xFF`)
    pub const fn erased() -> Self {
        Self::filled(0xFF)
    }

    pub const fn filled(value: u8) -> Self {
        Self {
            bytes: [value; N],
            writes_left: usize::MAX,
            write_count: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Allow `count` more successful writes, then fail every write
    pub fn fail_after_writes(&mut self, count: usize) {
        self.writes_left = count;
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.write_count
    }

    fn span(&self, offset: u32, len: usize) -> Result<core::ops::Range<usize>, RamRegionError> {
        let start = offset as usize;
        match start.checked_add(len) {
            Some(end) if end <= N => Ok(start..end),
            _ => Err(RamRegionError::OutOfBounds { offset, len }),
        }
    }
}

impl<const N: usize> Default for RamRegion<N> {
    fn default() -> Self {
        Self::erased()
    }
}

impl<const N: usize> ReadStorage for RamRegion<N> {
    type Error = RamRegionError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let span = self.span(offset, bytes.len())?;
        bytes.copy_from_slice(&self.bytes[span]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Storage for RamRegion<N> {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let span = self.span(offset, bytes.len())?;
        if self.writes_left == 0 {
            return Err(RamRegionError::WriteFailed);
        }
        if self.writes_left != usize::MAX {
            self.writes_left -= 1;
        }
        self.bytes[span].copy_from_slice(bytes);
        self.write_count += 1;
        Ok(())
    }
}
