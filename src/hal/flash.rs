//! Flash Store Region
//!
//! The persistent store is the top 64 KiB of the 2 MiB program flash. The
//! blocking flash driver runs erase and program from RAM with interrupts
//! off and pauses core 1 for their duration; callers additionally hold a
//! suspension of the receiver through a `FlashSession`.

use embassy_rp::flash::{Blocking, Flash};
use embassy_rp::peripherals::FLASH;

use crate::config::flash::{FLASH_SIZE, REGION_OFFSET, REGION_SIZE, SECTOR_SIZE};
use crate::storage::region::{check_program, check_read, check_sector};
use crate::storage::{StorageError, StorageRegion};

/// The store region of the on-board flash
pub struct FlashRegion<'d> {
    flash: Flash<'d, FLASH, Blocking, FLASH_SIZE>,
}

impl<'d> FlashRegion<'d> {
    /// Wrap the flash driver
    #[must_use]
    pub fn new(flash: Flash<'d, FLASH, Blocking, FLASH_SIZE>) -> Self {
        Self { flash }
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn absolute(offset: usize) -> u32 {
    (REGION_OFFSET + offset) as u32
}

impl StorageRegion for FlashRegion<'_> {
    fn capacity(&self) -> usize {
        REGION_SIZE
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        check_read(REGION_SIZE, offset, buf.len())?;
        self.flash
            .blocking_read(absolute(offset), buf)
            .map_err(|_| StorageError::Device)
    }

    fn erase_sector(&mut self, sector: usize) -> Result<(), StorageError> {
        check_sector(REGION_SIZE, sector)?;
        let from = absolute(sector * SECTOR_SIZE);
        #[allow(clippy::cast_possible_truncation)]
        let to = from + SECTOR_SIZE as u32;
        self.flash
            .blocking_erase(from, to)
            .map_err(|_| StorageError::Device)
    }

    fn program(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        check_program(REGION_SIZE, offset, data.len())?;
        self.flash
            .blocking_write(absolute(offset), data)
            .map_err(|_| StorageError::Device)
    }
}
