//! Shared types used across the receiver firmware
//!
//! This module defines domain-specific types that enforce invariants
//! at compile time and provide type safety throughout the codebase.
//! Enumerated settings are tagged variants with a stable persisted index.

use core::fmt;
#[cfg(feature = "embedded")]
use micromath::F32Ext;

use crate::config::calibration::{DB_PER_S_UNIT, S0_DBM, S9_DBM};

/// Frequency in Hertz with validation
///
/// Represents a valid frequency within the receiver's tuning range.
/// The frequency is stored in Hz for precision.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Frequency(u32);

impl Frequency {
    /// Minimum supported frequency
    pub const MIN_HZ: u32 = 0;

    /// Maximum supported frequency (30 MHz, top of HF)
    pub const MAX_HZ: u32 = 30_000_000;

    /// Lowest tunable frequency
    pub const MIN: Self = Self(Self::MIN_HZ);

    /// Highest tunable frequency
    pub const MAX: Self = Self(Self::MAX_HZ);

    /// Create a new Frequency from Hz, returns None if out of range
    #[must_use]
    pub const fn from_hz(hz: u32) -> Option<Self> {
        if hz <= Self::MAX_HZ {
            Some(Self(hz))
        } else {
            None
        }
    }

    /// Create a Frequency, clamping to the supported range
    #[must_use]
    pub const fn saturating_from_hz(hz: u32) -> Self {
        if hz > Self::MAX_HZ {
            Self::MAX
        } else {
            Self(hz)
        }
    }

    /// Create a new Frequency from kHz
    #[must_use]
    pub const fn from_khz(khz: u32) -> Option<Self> {
        match khz.checked_mul(1000) {
            Some(hz) => Self::from_hz(hz),
            None => None,
        }
    }

    /// Get the frequency in Hz
    #[must_use]
    pub const fn as_hz(self) -> u32 {
        self.0
    }

    /// Get the frequency in kHz (truncated)
    #[must_use]
    pub const fn as_khz(self) -> u32 {
        self.0 / 1000
    }

    /// Get the frequency in MHz as floating point
    #[must_use]
    pub fn as_mhz_f32(self) -> f32 {
        self.0 as f32 / 1_000_000.0
    }

    /// Local oscillator frequency for this tuned frequency
    #[must_use]
    pub const fn lo_hz(self) -> u32 {
        self.0.saturating_sub(crate::config::IF_OFFSET_HZ)
    }
}

impl fmt::Debug for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frequency({} Hz)", self.0)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Frequency {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{} Hz", self.0);
    }
}

/// Tuning step size
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TuningStep {
    /// 10 Hz step
    #[default]
    Hz10,
    /// 50 Hz step
    Hz50,
    /// 100 Hz step
    Hz100,
    /// 1 kHz step
    KHz1,
    /// 5 kHz step
    KHz5,
    /// 10 kHz step
    KHz10,
    /// 12.5 kHz step
    KHz12_5,
    /// 25 kHz step
    KHz25,
    /// 50 kHz step
    KHz50,
    /// 100 kHz step
    KHz100,
}

impl TuningStep {
    /// All steps in persisted index order
    pub const ALL: [Self; 10] = [
        Self::Hz10,
        Self::Hz50,
        Self::Hz100,
        Self::KHz1,
        Self::KHz5,
        Self::KHz10,
        Self::KHz12_5,
        Self::KHz25,
        Self::KHz50,
        Self::KHz100,
    ];

    /// Get the step size in Hz
    #[must_use]
    pub const fn as_hz(self) -> u32 {
        match self {
            Self::Hz10 => 10,
            Self::Hz50 => 50,
            Self::Hz100 => 100,
            Self::KHz1 => 1_000,
            Self::KHz5 => 5_000,
            Self::KHz10 => 10_000,
            Self::KHz12_5 => 12_500,
            Self::KHz25 => 25_000,
            Self::KHz50 => 50_000,
            Self::KHz100 => 100_000,
        }
    }

    /// Persisted index
    #[must_use]
    pub const fn index(self) -> u32 {
        self as u32
    }

    /// Look up a step by persisted index
    #[must_use]
    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Display label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Hz10 => "10Hz",
            Self::Hz50 => "50Hz",
            Self::Hz100 => "100Hz",
            Self::KHz1 => "1kHz",
            Self::KHz5 => "5kHz",
            Self::KHz10 => "10kHz",
            Self::KHz12_5 => "12.5kHz",
            Self::KHz25 => "25kHz",
            Self::KHz50 => "50kHz",
            Self::KHz100 => "100kHz",
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for TuningStep {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.label());
    }
}

/// Operating mode for the receiver
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Mode {
    /// Amplitude Modulation
    #[default]
    Am,
    /// Lower Sideband
    Lsb,
    /// Upper Sideband
    Usb,
    /// Frequency Modulation (narrow)
    Fm,
    /// Continuous Wave (Morse code)
    Cw,
}

impl Mode {
    /// All modes in persisted index order
    pub const ALL: [Self; 5] = [Self::Am, Self::Lsb, Self::Usb, Self::Fm, Self::Cw];

    /// Persisted index
    #[must_use]
    pub const fn index(self) -> u32 {
        self as u32
    }

    /// Look up a mode by persisted index
    #[must_use]
    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Display label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Am => "AM",
            Self::Lsb => "LSB",
            Self::Usb => "USB",
            Self::Fm => "FM",
            Self::Cw => "CW",
        }
    }

    /// Whether the auto-notch may run in this mode
    #[must_use]
    pub const fn supports_auto_notch(self) -> bool {
        matches!(self, Self::Am | Self::Lsb | Self::Usb)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Mode {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.label());
    }
}

/// AGC time-constant preset
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AgcSpeed {
    /// Fast attack and release
    Fast,
    /// Default
    #[default]
    Normal,
    /// Slow release for SSB voice
    Slow,
    /// Very slow release for fading signals
    VerySlow,
}

impl AgcSpeed {
    /// All presets in persisted index order
    pub const ALL: [Self; 4] = [Self::Fast, Self::Normal, Self::Slow, Self::VerySlow];

    /// Get attack time in milliseconds
    #[must_use]
    pub const fn attack_ms(self) -> f32 {
        match self {
            Self::Fast => 1.0,
            Self::Normal => 2.0,
            Self::Slow => 5.0,
            Self::VerySlow => 10.0,
        }
    }

    /// Get decay time in milliseconds
    #[must_use]
    pub const fn decay_ms(self) -> f32 {
        match self {
            Self::Fast => 100.0,
            Self::Normal => 400.0,
            Self::Slow => 1500.0,
            Self::VerySlow => 4000.0,
        }
    }

    /// Get hang time in milliseconds
    #[must_use]
    pub const fn hang_ms(self) -> f32 {
        match self {
            Self::Fast => 0.0,
            Self::Normal => 100.0,
            Self::Slow => 250.0,
            Self::VerySlow => 500.0,
        }
    }

    /// Persisted index
    #[must_use]
    pub const fn index(self) -> u32 {
        self as u32
    }

    /// Look up a preset by persisted index
    #[must_use]
    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Display label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Fast => "Fast",
            Self::Normal => "Normal",
            Self::Slow => "Slow",
            Self::VerySlow => "Very slow",
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for AgcSpeed {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.label());
    }
}

/// Channel filter bandwidth
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Bandwidth {
    /// Very narrow
    VeryNarrow,
    /// Narrow
    Narrow,
    /// Default
    #[default]
    Normal,
    /// Wide
    Wide,
    /// Very wide
    VeryWide,
}

impl Bandwidth {
    /// All widths in persisted index order
    pub const ALL: [Self; 5] = [
        Self::VeryNarrow,
        Self::Narrow,
        Self::Normal,
        Self::Wide,
        Self::VeryWide,
    ];

    /// Low-pass cutoff applied to I and Q at baseband
    #[must_use]
    pub const fn cutoff_hz(self, mode: Mode) -> f32 {
        let table: [f32; 5] = match mode {
            Mode::Am | Mode::Fm => [2000.0, 3000.0, 4000.0, 5000.0, 6000.0],
            Mode::Lsb | Mode::Usb => [1500.0, 2000.0, 2500.0, 3000.0, 3500.0],
            Mode::Cw => [100.0, 200.0, 300.0, 500.0, 800.0],
        };
        table[self as usize]
    }

    /// Persisted index
    #[must_use]
    pub const fn index(self) -> u32 {
        self as u32
    }

    /// Look up a width by persisted index
    #[must_use]
    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Display label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::VeryNarrow => "V Narrow",
            Self::Narrow => "Narrow",
            Self::Normal => "Normal",
            Self::Wide => "Wide",
            Self::VeryWide => "Very Wide",
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Bandwidth {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.label());
    }
}

/// Point on the 13-level S-meter scale
///
/// 0..=9 are S0..S9, 10..=12 are S9+10dB..S9+30dB. Also used as the
/// squelch threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct SUnit(u8);

impl SUnit {
    /// Highest level (S9+30dB)
    pub const MAX: Self = Self(12);

    /// S9
    pub const S9: Self = Self(9);

    /// Create from a level index, returns None above S9+30dB
    #[must_use]
    pub const fn new(level: u8) -> Option<Self> {
        if level <= Self::MAX.0 {
            Some(Self(level))
        } else {
            None
        }
    }

    /// Create from a level index, clamping above S9+30dB
    #[must_use]
    pub const fn saturating(level: u32) -> Self {
        if level > Self::MAX.0 as u32 {
            Self::MAX
        } else {
            Self(level as u8)
        }
    }

    /// Map an absolute signal strength to the S-meter scale
    ///
    /// 6 dB per unit from S0 up to S9, then 10 dB per step above S9.
    /// Clamped to S0..=S9+30dB.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_dbm(dbm: f32) -> Self {
        let units = if dbm >= S9_DBM {
            ((dbm - S9_DBM) / 10.0).floor() as i32 + 9
        } else {
            ((dbm - S0_DBM) / DB_PER_S_UNIT).floor() as i32
        };
        Self(units.clamp(0, i32::from(Self::MAX.0)) as u8)
    }

    /// Level index (0..=12)
    #[must_use]
    pub const fn level(self) -> u8 {
        self.0
    }

    /// Display label
    #[must_use]
    pub const fn label(self) -> &'static str {
        const LABELS: [&str; 13] = [
            "S0", "S1", "S2", "S3", "S4", "S5", "S6", "S7", "S8", "S9", "S9+10dB", "S9+20dB",
            "S9+30dB",
        ];
        LABELS[self.0 as usize]
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for SUnit {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.label());
    }
}
