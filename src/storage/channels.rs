//! Named channel table
//!
//! Record layout (16 words):
//!
//! | Words  | Content                                   |
//! |--------|-------------------------------------------|
//! | 0..6   | stored settings subset                    |
//! | 6..10  | 16-byte name, big-endian packed           |
//! | 10..16 | all-ones                                  |
//!
//! A record is empty when word 9 (name bytes 12..16) is all-ones.

use core::fmt;

use super::region::StorageRegion;
use super::session::FlashSession;
use super::{words_from_bytes, words_to_bytes, StorageError, ERASED_WORD};
use crate::config::flash::{
    CHANNEL_COUNT, CHANNEL_OFFSET, RECORDS_PER_SECTOR, RECORD_BYTES, RECORD_WORDS, SECTOR_SIZE, SETTINGS_TO_STORE,
};
use crate::log::info;
use crate::radio::settings::Settings;

/// Bytes in a channel name
pub const NAME_LEN: usize = 16;

/// First name word
const NAME_WORD: usize = 6;

/// Word that marks a record as empty
const SENTINEL_WORD: usize = 9;

/// Fixed-width channel name, space padded
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ChannelName([u8; NAME_LEN]);

impl ChannelName {
    /// Name shown for empty channels
    pub const BLANK: Self = Self(*b"BLANK           ");

    /// Build from text; longer text is cut, shorter text space padded
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut bytes = [b' '; NAME_LEN];
        for (dst, &src) in bytes.iter_mut().zip(text.as_bytes()) {
            *dst = src;
        }
        Self(bytes)
    }

    /// Raw bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; NAME_LEN] {
        &self.0
    }

    /// Name with trailing spaces stripped
    #[must_use]
    pub fn trimmed(&self) -> &str {
        let text = core::str::from_utf8(&self.0).unwrap_or("");
        text.trim_end_matches(' ')
    }

    fn to_words(self) -> [u32; 4] {
        let mut words = [0u32; 4];
        for (word, chunk) in words.iter_mut().zip(self.0.chunks_exact(4)) {
            *word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        words
    }

    fn from_words(words: &[u32]) -> Self {
        let mut bytes = [0u8; NAME_LEN];
        for (chunk, word) in bytes.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        Self(bytes)
    }
}

impl fmt::Debug for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.trimmed())
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for ChannelName {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.trimmed());
    }
}

/// Scan direction for populated channels
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanDirection {
    /// Towards higher indices
    Up,
    /// Towards lower indices
    Down,
}

/// The channel table, read in place and rewritten a sector at a time
#[derive(Clone, Copy, Debug, Default)]
pub struct ChannelTable;

const fn record_offset(index: usize) -> usize {
    CHANNEL_OFFSET + index * RECORD_BYTES
}

const fn sector_of(index: usize) -> usize {
    (CHANNEL_OFFSET + (index / RECORDS_PER_SECTOR) * SECTOR_SIZE) / SECTOR_SIZE
}

fn check_index(index: usize) -> Result<(), StorageError> {
    if index < CHANNEL_COUNT {
        Ok(())
    } else {
        Err(StorageError::OutOfBounds)
    }
}

fn is_populated(words: &[u32; RECORD_WORDS]) -> bool {
    words[SENTINEL_WORD] != ERASED_WORD
}

impl ChannelTable {
    /// Number of channel slots
    pub const COUNT: usize = CHANNEL_COUNT;

    /// Number of sectors the table spans
    pub const SECTORS: usize = CHANNEL_COUNT / RECORDS_PER_SECTOR;

    /// Raw record words
    pub fn record<R: StorageRegion>(&self, region: &mut R, index: usize) -> Result<[u32; RECORD_WORDS], StorageError> {
        check_index(index)?;
        let mut bytes = [0u8; RECORD_BYTES];
        region.read(record_offset(index), &mut bytes)?;
        Ok(words_from_bytes(&bytes))
    }

    /// Whether channel `index` holds a preset
    pub fn is_populated<R: StorageRegion>(&self, region: &mut R, index: usize) -> Result<bool, StorageError> {
        Ok(is_populated(&self.record(region, index)?))
    }

    /// Channel name, or [`ChannelName::BLANK`] for an empty channel
    pub fn name<R: StorageRegion>(&self, region: &mut R, index: usize) -> Result<ChannelName, StorageError> {
        let words = self.record(region, index)?;
        Ok(if is_populated(&words) {
            ChannelName::from_words(&words[NAME_WORD..NAME_WORD + 4])
        } else {
            ChannelName::BLANK
        })
    }

    /// `current` with the stored subset of channel `index` applied
    ///
    /// Returns `None` for an empty channel.
    pub fn recall<R: StorageRegion>(
        &self,
        region: &mut R,
        index: usize,
        current: &Settings,
    ) -> Result<Option<Settings>, StorageError> {
        let words = self.record(region, index)?;
        if !is_populated(&words) {
            return Ok(None);
        }
        let mut stored = [0u32; SETTINGS_TO_STORE];
        stored.copy_from_slice(&words[..SETTINGS_TO_STORE]);
        Ok(Some(current.with_stored_words(&stored)))
    }

    /// Next populated channel after `from`, wrapping at the table ends
    ///
    /// `from` itself is checked last, so a table with a single populated
    /// channel returns that channel.
    pub fn next<R: StorageRegion>(
        &self,
        region: &mut R,
        from: usize,
        direction: ScanDirection,
    ) -> Result<Option<usize>, StorageError> {
        let from = from % CHANNEL_COUNT;
        for step in 1..=CHANNEL_COUNT {
            let index = match direction {
                ScanDirection::Up => (from + step) % CHANNEL_COUNT,
                ScanDirection::Down => (from + CHANNEL_COUNT - step % CHANNEL_COUNT) % CHANNEL_COUNT,
            };
            if self.is_populated(region, index)? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Store `settings` under `name` in channel `index`
    pub fn store<R: StorageRegion>(
        &self,
        session: &mut FlashSession<'_, R>,
        index: usize,
        settings: &Settings,
        name: ChannelName,
    ) -> Result<(), StorageError> {
        let mut record = [ERASED_WORD; RECORD_WORDS];
        record[..SETTINGS_TO_STORE].copy_from_slice(&settings.stored_words());
        record[NAME_WORD..NAME_WORD + 4].copy_from_slice(&name.to_words());
        self.update(session, index, |words| *words = record)?;
        info!("channel {} stored as {}", index, name);
        Ok(())
    }

    /// Mark channel `index` empty; its stored settings are left in place
    pub fn delete<R: StorageRegion>(&self, session: &mut FlashSession<'_, R>, index: usize) -> Result<(), StorageError> {
        self.update(session, index, |words| words[SENTINEL_WORD] = ERASED_WORD)?;
        info!("channel {} deleted", index);
        Ok(())
    }

    /// Replace table sector `sector` with `words`
    pub fn write_sector<R: StorageRegion>(
        &self,
        session: &mut FlashSession<'_, R>,
        sector: usize,
        words: &[u32; SECTOR_SIZE / 4],
    ) -> Result<(), StorageError> {
        if sector >= Self::SECTORS {
            return Err(StorageError::OutOfBounds);
        }
        let mut bytes = [0u8; SECTOR_SIZE];
        words_to_bytes(words, &mut bytes);
        session.rewrite_sector(CHANNEL_OFFSET / SECTOR_SIZE + sector, &bytes)
    }

    fn update<R: StorageRegion>(
        &self,
        session: &mut FlashSession<'_, R>,
        index: usize,
        edit: impl FnOnce(&mut [u32; RECORD_WORDS]),
    ) -> Result<(), StorageError> {
        check_index(index)?;
        let sector = sector_of(index);
        let mut bytes = [0u8; SECTOR_SIZE];
        session.read(sector * SECTOR_SIZE, &mut bytes)?;

        let start = record_offset(index) - sector * SECTOR_SIZE;
        let slot = &mut bytes[start..start + RECORD_BYTES];
        let mut words: [u32; RECORD_WORDS] = words_from_bytes(slot);
        edit(&mut words);
        words_to_bytes(&words, slot);

        session.rewrite_sector(sector, &bytes)
    }
}
