//! Control-core command dispatcher
//!
//! Owns the control side of the settings, the persistent store and a
//! reference to the exchange. Every flash mutation runs inside a
//! suspension of the receiver.

use embassy_sync::blocking_mutex::raw::RawMutex;

use super::exchange::Exchange;
use super::settings::Settings;
use super::status::Status;
use crate::config::flash::SECTOR_SIZE;
use crate::config::AUTOSAVE_QUIET_TICKS;
use crate::log::{debug, warn};
use crate::storage::{
    AutosaveLog, ChannelName, ChannelTable, FlashSession, SavePlan, ScanDirection, StorageError, StorageRegion,
};

/// Request handled by the [`Controller`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Publish new settings; the autosave follows once tuning goes quiet
    Apply(Settings),
    /// Periodic tick at [`crate::config::UI_TICK_HZ`]
    Tick,
    /// Save the current settings now
    Autosave,
    /// Store the current settings as a named channel
    StoreChannel {
        /// Channel index
        index: usize,
        /// Channel name
        name: ChannelName,
    },
    /// Mark a channel empty
    DeleteChannel(usize),
    /// Load a channel into the current settings
    RecallChannel(usize),
    /// Load the next populated channel after `from`
    ScanChannel {
        /// Starting index, not itself considered until the scan wraps
        from: usize,
        /// Scan direction
        direction: ScanDirection,
    },
}

/// Result of a handled [`Command`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Response {
    /// Nothing to report
    Done,
    /// An autosave ran
    Saved(SavePlan),
    /// The channel now loaded, if any
    Channel(Option<usize>),
}

/// Suspend the receiver and run `f` against the region
async fn with_session<M, R, T>(
    exchange: &Exchange<M>,
    region: &mut R,
    f: impl FnOnce(&mut FlashSession<'_, R>) -> Result<T, StorageError>,
) -> Result<T, StorageError>
where
    M: RawMutex,
    R: StorageRegion,
{
    let guard = exchange.suspend().await;
    let mut session = FlashSession::new(region, &guard);
    f(&mut session)
}

/// Control-core state machine
pub struct Controller<'a, M: RawMutex, R: StorageRegion> {
    exchange: &'a Exchange<M>,
    region: R,
    settings: Settings,
    autosave: AutosaveLog,
    channels: ChannelTable,
    pending_save: bool,
    quiet_ticks: u8,
}

impl<'a, M: RawMutex, R: StorageRegion> Controller<'a, M, R> {
    /// Restore the autosaved settings and publish them
    pub fn new(exchange: &'a Exchange<M>, mut region: R) -> Result<Self, StorageError> {
        let autosave = AutosaveLog::scan(&mut region)?;
        let settings = autosave.restore();
        exchange.apply(settings);
        debug!("controller restored {}", settings);
        Ok(Self {
            exchange,
            region,
            settings,
            autosave,
            channels: ChannelTable,
            pending_save: false,
            quiet_ticks: 0,
        })
    }

    /// Control-side settings
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Latest receiver status
    #[must_use]
    pub fn status(&self) -> Status {
        self.exchange.read_status()
    }

    /// Autosave log state
    #[must_use]
    pub const fn autosave_log(&self) -> &AutosaveLog {
        &self.autosave
    }

    /// Whether a deferred autosave is waiting for tuning to go quiet
    #[must_use]
    pub const fn save_pending(&self) -> bool {
        self.pending_save
    }

    /// The underlying storage region
    pub fn region_mut(&mut self) -> &mut R {
        &mut self.region
    }

    /// Name of channel `index`
    pub fn channel_name(&mut self, index: usize) -> Result<ChannelName, StorageError> {
        self.channels.name(&mut self.region, index)
    }

    /// Handle one command
    pub async fn handle(&mut self, command: Command) -> Result<Response, StorageError> {
        match command {
            Command::Apply(settings) => {
                self.apply(settings);
                self.pending_save = true;
                self.quiet_ticks = 0;
                Ok(Response::Done)
            }
            Command::Tick => {
                if !self.pending_save {
                    return Ok(Response::Done);
                }
                self.quiet_ticks = self.quiet_ticks.saturating_add(1);
                if self.quiet_ticks < AUTOSAVE_QUIET_TICKS {
                    return Ok(Response::Done);
                }
                self.autosave().await.map(Response::Saved)
            }
            Command::Autosave => self.autosave().await.map(Response::Saved),
            Command::StoreChannel { index, name } => {
                let settings = self.settings;
                let channels = self.channels;
                with_session(self.exchange, &mut self.region, |session| {
                    channels.store(session, index, &settings, name)
                })
                .await?;
                Ok(Response::Done)
            }
            Command::DeleteChannel(index) => {
                let channels = self.channels;
                with_session(self.exchange, &mut self.region, |session| channels.delete(session, index)).await?;
                Ok(Response::Done)
            }
            Command::RecallChannel(index) => self.recall(index),
            Command::ScanChannel { from, direction } => {
                match self.channels.next(&mut self.region, from, direction)? {
                    Some(index) => self.recall(index),
                    None => Ok(Response::Channel(None)),
                }
            }
        }
    }

    /// Replace one sector of the channel table
    pub async fn write_channel_sector(
        &mut self,
        sector: usize,
        words: &[u32; SECTOR_SIZE / 4],
    ) -> Result<(), StorageError> {
        let channels = self.channels;
        with_session(self.exchange, &mut self.region, |session| {
            channels.write_sector(session, sector, words)
        })
        .await
    }

    fn apply(&mut self, settings: Settings) {
        self.settings = settings.clamped().with_suspend(false);
        self.exchange.apply(self.settings);
    }

    fn recall(&mut self, index: usize) -> Result<Response, StorageError> {
        match self.channels.recall(&mut self.region, index, &self.settings)? {
            Some(settings) => {
                self.apply(settings);
                self.pending_save = true;
                self.quiet_ticks = 0;
                Ok(Response::Channel(Some(index)))
            }
            None => {
                warn!("channel {} is empty", index);
                Ok(Response::Channel(None))
            }
        }
    }

    /// Save the current settings; the save stays pending until it succeeds
    async fn autosave(&mut self) -> Result<SavePlan, StorageError> {
        self.quiet_ticks = 0;
        let plan = self.autosave.plan(&self.settings);
        if plan.writes() {
            let settings = self.settings;
            let log = &mut self.autosave;
            with_session(self.exchange, &mut self.region, |session| log.save(session, &settings)).await?;
        }
        self.pending_save = false;
        Ok(plan)
    }
}
