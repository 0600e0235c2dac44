//! Memory upload protocol
//!
//! Loads the channel table over a serial link, one hex word per line:
//!
//! ```text
//! > sector 0 channel 0 location 0>
//! < 0x0012b128
//! > sector 0 channel 0 location 1>
//! < 0
//! ...
//! < q
//! ```
//!
//! A line starting with `q` or `Q` ends the upload; that location and all
//! remaining ones are filled with all-ones. Words are collected a sector at
//! a time and each complete sector is erased and programmed.

use core::fmt::{self, Write as _};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embedded_io_async::{Read, Write};
use heapless::{String, Vec};

use crate::config::flash::{RECORD_WORDS, SECTOR_SIZE};
use crate::config::UPLOAD_LINE_LEN;
use crate::log::{info, warn};
use crate::radio::control::Controller;
use crate::storage::{ChannelTable, StorageError, StorageRegion, ERASED_WORD};

/// Words in one channel-table sector
pub const SECTOR_WORDS: usize = SECTOR_SIZE / 4;

/// Longest prompt line
pub const PROMPT_LEN: usize = 48;

/// Rejected input line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadError {
    /// Not a hex word or quit
    Malformed,
    /// Line longer than [`UPLOAD_LINE_LEN`]
    LineTooLong,
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => f.write_str("expected a hex word or q"),
            Self::LineTooLong => f.write_str("line too long"),
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for UploadError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Malformed => defmt::write!(f, "Malformed"),
            Self::LineTooLong => defmt::write!(f, "LineTooLong"),
        }
    }
}

/// One parsed input line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Line {
    /// A data word
    Word(u32),
    /// End of upload
    Quit,
}

/// Parse one line without its terminator
///
/// Leading whitespace and a `0x` prefix are accepted. Anything after the
/// hex digits is ignored.
pub fn parse_line(line: &[u8]) -> Result<Line, UploadError> {
    if matches!(line.first(), Some(b'q' | b'Q')) {
        return Ok(Line::Quit);
    }

    let text = core::str::from_utf8(line).map_err(|_| UploadError::Malformed)?;
    let text = text.trim_start();
    let text = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    let digits = text.bytes().take_while(u8::is_ascii_hexdigit).count();
    if digits == 0 {
        return Err(UploadError::Malformed);
    }
    u32::from_str_radix(&text[..digits], 16)
        .map(Line::Word)
        .map_err(|_| UploadError::Malformed)
}

/// Collects bytes into lines
///
/// `\r` and `\n` both end a line; empty lines are skipped, so CRLF input
/// yields one line.
pub struct LineAssembler {
    buffer: Vec<u8, UPLOAD_LINE_LEN>,
    overflow: bool,
}

impl LineAssembler {
    /// Create an empty assembler
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            overflow: false,
        }
    }

    /// Feed one byte; returns the parsed line when one completes
    pub fn feed(&mut self, byte: u8) -> Option<Result<Line, UploadError>> {
        if byte == b'\r' || byte == b'\n' {
            if self.buffer.is_empty() && !self.overflow {
                return None;
            }
            let result = if self.overflow {
                Err(UploadError::LineTooLong)
            } else {
                parse_line(&self.buffer)
            };
            self.clear();
            Some(result)
        } else {
            if self.buffer.push(byte).is_err() {
                self.overflow = true;
            }
            None
        }
    }

    /// Drop any partial line
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.overflow = false;
    }
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the next word lands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position {
    /// Table sector
    pub sector: usize,
    /// Channel within the sector
    pub channel: usize,
    /// Word within the channel record
    pub location: usize,
}

/// What the upload needs next
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    /// Waiting for more lines
    Continue,
    /// Sector is complete and must be written
    SectorReady(usize),
    /// Every sector has been written
    Finished,
}

/// Upload state: the sector being assembled and the write position
pub struct Upload {
    sector: usize,
    index: usize,
    done: bool,
    words: [u32; SECTOR_WORDS],
}

impl Upload {
    /// Start at sector 0, location 0
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sector: 0,
            index: 0,
            done: false,
            words: [ERASED_WORD; SECTOR_WORDS],
        }
    }

    /// Position of the next word
    #[must_use]
    pub const fn position(&self) -> Position {
        Position {
            sector: self.sector,
            channel: self.index / RECORD_WORDS,
            location: self.index % RECORD_WORDS,
        }
    }

    /// Whether a quit line has been received
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// Prompt for the next word
    #[must_use]
    pub fn prompt(&self) -> String<PROMPT_LEN> {
        let position = self.position();
        let mut text = String::new();
        let _ = writeln!(
            text,
            "sector {} channel {} location {}>",
            position.sector, position.channel, position.location
        );
        text
    }

    /// Take one parsed line
    pub fn accept(&mut self, line: Line) -> Progress {
        match line {
            Line::Word(word) => {
                if let Some(slot) = self.words.get_mut(self.index) {
                    *slot = word;
                    self.index += 1;
                }
            }
            Line::Quit => {
                self.words[self.index.min(SECTOR_WORDS)..].fill(ERASED_WORD);
                self.index = SECTOR_WORDS;
                self.done = true;
            }
        }
        if self.index >= SECTOR_WORDS {
            Progress::SectorReady(self.sector)
        } else {
            Progress::Continue
        }
    }

    /// Words of the sector being assembled
    #[must_use]
    pub const fn sector_words(&self) -> &[u32; SECTOR_WORDS] {
        &self.words
    }

    /// Move on once the current sector has been written
    ///
    /// After a quit every remaining sector is ready at once, filled with
    /// all-ones.
    pub fn next_sector(&mut self) -> Progress {
        if self.sector + 1 >= ChannelTable::SECTORS {
            return Progress::Finished;
        }
        self.sector += 1;
        self.words = [ERASED_WORD; SECTOR_WORDS];
        if self.done {
            self.index = SECTOR_WORDS;
            Progress::SectorReady(self.sector)
        } else {
            self.index = 0;
            Progress::Continue
        }
    }
}

impl Default for Upload {
    fn default() -> Self {
        Self::new()
    }
}

/// Upload session failure
#[derive(Debug)]
pub enum TransferError<E> {
    /// The serial link failed
    Io(E),
    /// The link closed before the upload finished
    Closed,
    /// Writing a sector failed
    Storage(StorageError),
}

impl<E> From<StorageError> for TransferError<E> {
    fn from(error: StorageError) -> Self {
        Self::Storage(error)
    }
}

/// Destination for completed channel-table sectors
#[allow(async_fn_in_trait)]
pub trait SectorWriter {
    /// Erase and program one sector of the channel table
    async fn write_sector(&mut self, sector: usize, words: &[u32; SECTOR_WORDS]) -> Result<(), StorageError>;
}

impl<M: RawMutex, R: StorageRegion> SectorWriter for Controller<'_, M, R> {
    async fn write_sector(&mut self, sector: usize, words: &[u32; SECTOR_WORDS]) -> Result<(), StorageError> {
        self.write_channel_sector(sector, words).await
    }
}

/// A shared controller is locked for one sector at a time, so commands
/// keep flowing while the host types
impl<RM, M, R> SectorWriter for &Mutex<RM, Controller<'_, M, R>>
where
    RM: RawMutex,
    M: RawMutex,
    R: StorageRegion,
{
    async fn write_sector(&mut self, sector: usize, words: &[u32; SECTOR_WORDS]) -> Result<(), StorageError> {
        self.lock().await.write_channel_sector(sector, words).await
    }
}

/// Run a complete upload over `io`, writing sectors through `writer`
pub async fn run_upload<T, W>(io: &mut T, writer: &mut W) -> Result<(), TransferError<T::Error>>
where
    T: Read + Write,
    W: SectorWriter,
{
    let mut upload = Upload::new();
    let mut assembler = LineAssembler::new();
    let mut buf = [0u8; 64];

    io.write_all(upload.prompt().as_bytes()).await.map_err(TransferError::Io)?;
    loop {
        let n = io.read(&mut buf).await.map_err(TransferError::Io)?;
        if n == 0 {
            return Err(TransferError::Closed);
        }

        for &byte in &buf[..n] {
            let Some(line) = assembler.feed(byte) else {
                continue;
            };

            let mut progress = match line {
                Ok(line) => upload.accept(line),
                Err(error) => {
                    warn!("upload: {}", error);
                    let mut text: String<PROMPT_LEN> = String::new();
                    let _ = writeln!(text, "error: {error}");
                    io.write_all(text.as_bytes()).await.map_err(TransferError::Io)?;
                    Progress::Continue
                }
            };

            while let Progress::SectorReady(sector) = progress {
                writer.write_sector(sector, upload.sector_words()).await?;
                info!("upload: sector {} written", sector);
                progress = upload.next_sector();
            }

            if progress == Progress::Finished {
                io.write_all(b"done\n").await.map_err(TransferError::Io)?;
                io.flush().await.map_err(TransferError::Io)?;
                return Ok(());
            }
            io.write_all(upload.prompt().as_bytes()).await.map_err(TransferError::Io)?;
        }
    }
}
