//! Receiver status record
//!
//! Written only by the receiver, once per block, and read by the control
//! core as a whole-record copy.

use crate::config::SPECTRUM_BINS;
use crate::dsp::spectrum::FLOOR_DB;
use crate::types::SUnit;

/// Snapshot published after every processed block
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Status {
    /// Smoothed signal strength in dBm
    pub signal_strength_dbm: f32,
    /// Raw battery ADC reading (VSYS/3)
    pub battery_raw: u16,
    /// Raw on-die temperature sensor reading
    pub temperature_raw: u16,
    /// Processing time of the last block in microseconds
    pub busy_time_us: u32,
    /// FFT-shifted magnitude spectrum in dB
    pub spectrum: [f32; SPECTRUM_BINS],
    /// Blocks processed since start-up; also the publication generation
    pub blocks: u32,
    /// Squelch is closed
    pub audio_muted: bool,
}

impl Status {
    /// Empty record, spectrum on the floor
    pub const EMPTY: Self = Self {
        signal_strength_dbm: FLOOR_DB,
        battery_raw: 0,
        temperature_raw: 0,
        busy_time_us: 0,
        spectrum: [FLOOR_DB; SPECTRUM_BINS],
        blocks: 0,
        audio_muted: false,
    };

    /// Signal strength on the S-meter scale
    #[must_use]
    pub fn s_unit(&self) -> SUnit {
        SUnit::from_dbm(self.signal_strength_dbm)
    }

    /// Share of the block period spent processing, in percent
    #[must_use]
    pub fn load_percent(&self, block_period_us: u32) -> u8 {
        let percent = u64::from(self.busy_time_us) * 100 / u64::from(block_period_us.max(1));
        u8::try_from(percent.min(100)).unwrap_or(100)
    }

    /// Lowest and highest spectrum levels, for display scaling
    #[must_use]
    pub fn spectrum_range(&self) -> (f32, f32) {
        self.spectrum
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Status {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "#{} {}dBm busy {}us{}",
            self.blocks,
            self.signal_strength_dbm,
            self.busy_time_us,
            if self.audio_muted { " muted" } else { "" }
        );
    }
}
