//! Erase-then-program storage region

use super::StorageError;
use crate::config::flash::{PAGE_SIZE, SECTOR_SIZE};

/// A NOR-flash-like region: sector erase, page program, 1→0 only
///
/// Offsets are relative to the start of the region.
pub trait StorageRegion {
    /// Region size in bytes
    fn capacity(&self) -> usize;

    /// Read `buf.len()` bytes at `offset`
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Erase sector `sector` to all-ones
    fn erase_sector(&mut self, sector: usize) -> Result<(), StorageError>;

    /// Program whole pages at a page-aligned `offset`
    fn program(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError>;
}

/// Check a read range against the region size
pub fn check_read(capacity: usize, offset: usize, len: usize) -> Result<(), StorageError> {
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(StorageError::OutOfBounds),
    }
}

/// Check a sector index against the region size
pub fn check_sector(capacity: usize, sector: usize) -> Result<(), StorageError> {
    check_read(capacity, sector.saturating_mul(SECTOR_SIZE), SECTOR_SIZE)
}

/// Check a program range for page alignment and bounds
pub fn check_program(capacity: usize, offset: usize, len: usize) -> Result<(), StorageError> {
    if offset % PAGE_SIZE != 0 || len % PAGE_SIZE != 0 {
        return Err(StorageError::Misaligned);
    }
    check_read(capacity, offset, len)
}

/// In-memory flash model for host tests
///
/// Starts fully erased, rejects programs that would set a cleared bit and
/// counts erases per sector.
#[cfg(feature = "std")]
#[derive(Clone, Debug)]
pub struct RamRegion {
    bytes: Vec<u8>,
    erase_counts: Vec<u32>,
    programs: usize,
}

#[cfg(feature = "std")]
impl RamRegion {
    /// Erased region of `sectors` sectors
    #[must_use]
    pub fn new(sectors: usize) -> Self {
        Self {
            bytes: vec![0xFF; sectors * SECTOR_SIZE],
            erase_counts: vec![0; sectors],
            programs: 0,
        }
    }

    /// Erased region sized for the full store
    #[must_use]
    pub fn store() -> Self {
        Self::new(crate::config::flash::REGION_SIZE / SECTOR_SIZE)
    }

    /// Erases performed on `sector`
    #[must_use]
    pub fn erase_count(&self, sector: usize) -> u32 {
        self.erase_counts.get(sector).copied().unwrap_or(0)
    }

    /// Erases performed on all sectors
    #[must_use]
    pub fn total_erases(&self) -> u32 {
        self.erase_counts.iter().sum()
    }

    /// Program operations performed
    #[must_use]
    pub const fn program_count(&self) -> usize {
        self.programs
    }

    /// Raw contents
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(feature = "std")]
impl StorageRegion for RamRegion {
    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        check_read(self.capacity(), offset, buf.len())?;
        buf.copy_from_slice(&self.bytes[offset..offset + buf.len()]);
        Ok(())
    }

    fn erase_sector(&mut self, sector: usize) -> Result<(), StorageError> {
        check_sector(self.capacity(), sector)?;
        let start = sector * SECTOR_SIZE;
        self.bytes[start..start + SECTOR_SIZE].fill(0xFF);
        self.erase_counts[sector] += 1;
        Ok(())
    }

    fn program(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        check_program(self.capacity(), offset, data.len())?;
        let target = &mut self.bytes[offset..offset + data.len()];
        if target.iter().zip(data).any(|(&old, &new)| new & !old != 0) {
            return Err(StorageError::NotErased);
        }
        target.copy_from_slice(data);
        self.programs += 1;
        Ok(())
    }
}
