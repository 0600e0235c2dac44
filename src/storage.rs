//! Persistent store
//!
//! Two structures share one erase-then-program region at the top of flash:
//!
//! - [`AutosaveLog`]: 512 full settings snapshots written in order, erased
//!   only when every slot has been used.
//! - [`ChannelTable`]: 512 named presets, each rewritten by copying,
//!   erasing and reprogramming its sector.
//!
//! Both read through any [`StorageRegion`] and mutate only through a
//! [`FlashSession`], which exists only while the receiver is suspended.

use core::fmt;

pub mod autosave;
pub mod channels;
pub mod region;
pub mod session;

pub use autosave::{AutosaveLog, SavePlan};
pub use channels::{ChannelName, ChannelTable, ScanDirection};
#[cfg(feature = "std")]
pub use region::RamRegion;
pub use region::StorageRegion;
pub use session::FlashSession;

/// Word value of erased flash
pub const ERASED_WORD: u32 = 0xFFFF_FFFF;

/// Storage operation failure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageError {
    /// Access beyond the end of the region
    OutOfBounds,
    /// Offset or length not on a sector or page boundary
    Misaligned,
    /// Program attempted to set a bit that is not erased
    NotErased,
    /// Mutation attempted while the receiver was running
    NotQuiesced,
    /// The flash device reported a failure
    Device,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::OutOfBounds => "access out of bounds",
            Self::Misaligned => "misaligned access",
            Self::NotErased => "program over unerased bits",
            Self::NotQuiesced => "receiver not suspended",
            Self::Device => "flash device error",
        };
        f.write_str(text)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for StorageError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::OutOfBounds => defmt::write!(f, "OutOfBounds"),
            Self::Misaligned => defmt::write!(f, "Misaligned"),
            Self::NotErased => defmt::write!(f, "NotErased"),
            Self::NotQuiesced => defmt::write!(f, "NotQuiesced"),
            Self::Device => defmt::write!(f, "Device"),
        }
    }
}

/// Decode little-endian words from bytes
pub(crate) fn words_from_bytes<const N: usize>(bytes: &[u8]) -> [u32; N] {
    let mut words = [0u32; N];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    words
}

/// Encode words into little-endian bytes
pub(crate) fn words_to_bytes(words: &[u32], bytes: &mut [u8]) {
    for (chunk, word) in bytes.chunks_exact_mut(4).zip(words) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
}
