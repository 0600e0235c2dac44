//! Flash mutation session
//!
//! Erasing or programming stalls every fetch from the flash device, so a
//! session can only be opened while holding a [`SuspendGuard`]. The
//! session borrows the guard, so the receiver cannot resume while flash is
//! being changed.

use embassy_sync::blocking_mutex::raw::RawMutex;

use super::region::StorageRegion;
use super::StorageError;
use crate::config::flash::SECTOR_SIZE;
use crate::radio::exchange::SuspendGuard;

/// Exclusive mutable access to a region while the receiver is parked
pub struct FlashSession<'a, R: StorageRegion> {
    region: &'a mut R,
    quiesced: bool,
}

impl<'a, R: StorageRegion> FlashSession<'a, R> {
    /// Open a session for the lifetime of `guard`
    pub fn new<M: RawMutex>(region: &'a mut R, guard: &'a SuspendGuard<'_, M>) -> Self {
        Self {
            region,
            quiesced: guard.exchange().is_quiesced(),
        }
    }

    /// Region size in bytes
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    /// Read through to the region
    pub fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        self.region.read(offset, buf)
    }

    /// Erase one sector
    pub fn erase_sector(&mut self, sector: usize) -> Result<(), StorageError> {
        self.ensure_quiesced()?;
        self.region.erase_sector(sector)
    }

    /// Program whole pages
    pub fn program(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        self.ensure_quiesced()?;
        self.region.program(offset, data)
    }

    /// Erase a sector and program it with `data`
    pub fn rewrite_sector(&mut self, sector: usize, data: &[u8; SECTOR_SIZE]) -> Result<(), StorageError> {
        self.erase_sector(sector)?;
        self.program(sector * SECTOR_SIZE, data)
    }

    fn ensure_quiesced(&self) -> Result<(), StorageError> {
        if self.quiesced {
            Ok(())
        } else {
            Err(StorageError::NotQuiesced)
        }
    }
}
