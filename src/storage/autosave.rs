//! Wear-levelled settings autosave log
//!
//! Slots are filled strictly in order. A slot whose first word is erased is
//! unused. Saving programs only the page holding the next free slot; when
//! all 512 slots are used the log's sectors are erased once each and
//! filling restarts at slot 0.

use super::region::StorageRegion;
use super::session::FlashSession;
use super::{words_from_bytes, words_to_bytes, StorageError, ERASED_WORD};
use crate::config::flash::{
    AUTOSAVE_OFFSET, AUTOSAVE_SIZE, AUTOSAVE_SLOTS, PAGE_SIZE, RECORD_BYTES, RECORD_WORDS, SECTOR_SIZE,
};
use crate::log::{debug, info};
use crate::radio::settings::Settings;

/// What a save would do
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SavePlan {
    /// The last slot already holds these settings
    Unchanged,
    /// Program the given free slot
    Append(usize),
    /// Erase the log and program slot 0
    Wrap,
}

impl SavePlan {
    /// Whether the plan touches flash
    #[must_use]
    pub const fn writes(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Cached view of the autosave log
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AutosaveLog {
    next: Option<usize>,
    last_slot: Option<usize>,
    last: Option<[u32; RECORD_WORDS]>,
}

const fn slot_offset(slot: usize) -> usize {
    AUTOSAVE_OFFSET + slot * RECORD_BYTES
}

fn read_slot<R: StorageRegion>(region: &mut R, slot: usize) -> Result<[u32; RECORD_WORDS], StorageError> {
    let mut bytes = [0u8; RECORD_BYTES];
    region.read(slot_offset(slot), &mut bytes)?;
    Ok(words_from_bytes(&bytes))
}

impl AutosaveLog {
    /// Scan the log for the first unused slot
    pub fn scan<R: StorageRegion>(region: &mut R) -> Result<Self, StorageError> {
        let mut next = None;
        for slot in 0..AUTOSAVE_SLOTS {
            let mut word = [0u8; 4];
            region.read(slot_offset(slot), &mut word)?;
            if u32::from_le_bytes(word) == ERASED_WORD {
                next = Some(slot);
                break;
            }
        }

        let last_slot = match next {
            Some(0) => None,
            Some(slot) => Some(slot - 1),
            None => Some(AUTOSAVE_SLOTS - 1),
        };
        let last = match last_slot {
            Some(slot) => Some(read_slot(region, slot)?),
            None => None,
        };

        debug!("autosave log: next slot {}", next.unwrap_or(AUTOSAVE_SLOTS));
        Ok(Self { next, last_slot, last })
    }

    /// First unused slot, or `None` when the log is full
    #[must_use]
    pub const fn next_slot(&self) -> Option<usize> {
        self.next
    }

    /// Slot holding the most recent snapshot
    #[must_use]
    pub const fn last_slot(&self) -> Option<usize> {
        self.last_slot
    }

    /// Settings from the most recent snapshot, or factory defaults
    #[must_use]
    pub fn restore(&self) -> Settings {
        match self.last {
            Some(words) => {
                let settings = Settings::from_words(&words);
                if settings.to_words() != words {
                    info!("autosave: restored settings clamped");
                }
                settings
            }
            None => Settings::default(),
        }
    }

    /// Decide what saving `settings` would do
    #[must_use]
    pub fn plan(&self, settings: &Settings) -> SavePlan {
        if self.last == Some(settings.to_words()) {
            SavePlan::Unchanged
        } else {
            match self.next {
                Some(slot) => SavePlan::Append(slot),
                None => SavePlan::Wrap,
            }
        }
    }

    /// Save `settings` if they differ from the last snapshot
    pub fn save<R: StorageRegion>(
        &mut self,
        session: &mut FlashSession<'_, R>,
        settings: &Settings,
    ) -> Result<SavePlan, StorageError> {
        let plan = self.plan(settings);
        let slot = match plan {
            SavePlan::Unchanged => return Ok(plan),
            SavePlan::Append(slot) => slot,
            SavePlan::Wrap => {
                let first = AUTOSAVE_OFFSET / SECTOR_SIZE;
                for sector in first..first + AUTOSAVE_SIZE / SECTOR_SIZE {
                    session.erase_sector(sector)?;
                }
                info!("autosave log wrapped");
                0
            }
        };

        let words = settings.to_words();
        let offset = slot_offset(slot);
        let page = offset - offset % PAGE_SIZE;
        let mut buf = [0xFFu8; PAGE_SIZE];
        session.read(page, &mut buf)?;
        let start = offset - page;
        words_to_bytes(&words, &mut buf[start..start + RECORD_BYTES]);
        session.program(page, &buf)?;

        self.last = Some(words);
        self.last_slot = Some(slot);
        self.next = (slot + 1 < AUTOSAVE_SLOTS).then_some(slot + 1);
        info!("autosave slot {}", slot);
        Ok(plan)
    }
}
