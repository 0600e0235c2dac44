//! Receiver settings record
//!
//! `Settings` is written by the control core and applied by the receiver
//! once per block. Transitions return new instances, and every value that
//! can arrive from flash or a UI edit is clamped on the way in.

use crate::config::{self, calibration::DEFAULT_GAIN_CAL_DB, flash::RECORD_WORDS};
use crate::config::flash::SETTINGS_TO_STORE;
use crate::types::{AgcSpeed, Bandwidth, Frequency, Mode, SUnit, TuningStep};

/// Persisted word indices
pub mod word {
    //! Index of each field in the 16-word persisted form.

    /// Tuned frequency
    pub const FREQUENCY: usize = 0;
    /// Mode
    pub const MODE: usize = 1;
    /// AGC speed
    pub const AGC_SPEED: usize = 2;
    /// Tuning step
    pub const STEP: usize = 3;
    /// Band upper edge
    pub const MAX_FREQUENCY: usize = 4;
    /// Band lower edge
    pub const MIN_FREQUENCY: usize = 5;
    /// Squelch threshold
    pub const SQUELCH: usize = 6;
    /// Volume
    pub const VOLUME: usize = 7;
    /// CW sidetone in units of 100 Hz
    pub const CW_SIDETONE: usize = 8;
    /// Hardware flags
    pub const HW_SETUP: usize = 9;
    /// Gain calibration
    pub const GAIN_CAL: usize = 10;
    /// Bandwidth
    pub const BANDWIDTH: usize = 11;
    /// Display contrast
    pub const CONTRAST: usize = 12;
    /// Receiver feature flags
    pub const RX_FEATURES: usize = 13;
}

/// Highest volume step
pub const MAX_VOLUME: u8 = 9;

/// Sidetone range in units of 100 Hz
pub const CW_SIDETONE_RANGE: core::ops::RangeInclusive<u8> = 1..=30;

/// Gain calibration range in dB
pub const GAIN_CAL_RANGE: core::ops::RangeInclusive<u8> = 1..=100;

/// Highest display contrast
pub const MAX_CONTRAST: u8 = 15;

/// Highest display timeout index
pub const MAX_DISPLAY_TIMEOUT: u8 = 7;

const FLAG_SWAP_IQ: u32 = 1 << 0;
const FLAG_FLIP_DISPLAY: u32 = 1 << 1;
const FLAG_DISPLAY_TYPE: u32 = 1 << 2;
const FLAG_REVERSE_ENCODER: u32 = 1 << 3;
const DISPLAY_TIMEOUT_SHIFT: u32 = 4;
const DISPLAY_TIMEOUT_MASK: u32 = 0b111 << DISPLAY_TIMEOUT_SHIFT;

const FEATURE_AUTO_NOTCH: u32 = 1 << 0;

/// Hardware setup flags (persisted word 9)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct HardwareFlags {
    /// Exchange I and Q ahead of the demodulators
    pub swap_iq: bool,
    /// Rotate the display 180 degrees
    pub flip_display: bool,
    /// Alternate display controller
    pub alternate_display: bool,
    /// Reverse the tuning encoder direction
    pub reverse_encoder: bool,
    /// Display timeout index (0..=7)
    pub display_timeout: u8,
}

impl HardwareFlags {
    /// Pack into a settings word
    #[must_use]
    pub const fn to_word(self) -> u32 {
        let mut word = 0;
        if self.swap_iq {
            word |= FLAG_SWAP_IQ;
        }
        if self.flip_display {
            word |= FLAG_FLIP_DISPLAY;
        }
        if self.alternate_display {
            word |= FLAG_DISPLAY_TYPE;
        }
        if self.reverse_encoder {
            word |= FLAG_REVERSE_ENCODER;
        }
        word | ((self.display_timeout as u32) << DISPLAY_TIMEOUT_SHIFT) & DISPLAY_TIMEOUT_MASK
    }

    /// Unpack from a settings word, ignoring unknown bits
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_word(word: u32) -> Self {
        Self {
            swap_iq: word & FLAG_SWAP_IQ != 0,
            flip_display: word & FLAG_FLIP_DISPLAY != 0,
            alternate_display: word & FLAG_DISPLAY_TYPE != 0,
            reverse_encoder: word & FLAG_REVERSE_ENCODER != 0,
            display_timeout: ((word & DISPLAY_TIMEOUT_MASK) >> DISPLAY_TIMEOUT_SHIFT) as u8,
        }
    }
}

/// Encoder tuning rate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TuningRate {
    /// A tenth of the step
    Slow,
    /// One step
    #[default]
    Normal,
    /// Ten steps
    Fast,
    /// A hundred steps
    VeryFast,
}

impl TuningRate {
    /// Hz moved per encoder detent
    #[must_use]
    pub const fn increment_hz(self, step: TuningStep) -> u32 {
        match self {
            Self::Slow => step.as_hz() / 10,
            Self::Normal => step.as_hz(),
            Self::Fast => step.as_hz() * 10,
            Self::VeryFast => step.as_hz() * 100,
        }
    }
}

/// Band check applied when a frequency is typed in
///
/// When the check fails, the band limits reset to the full tuning range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BandCheck {
    /// Historic check `f > max || f < max`: resets the band unless the
    /// frequency equals the upper edge
    Faithful,
    /// Resets the band only when the frequency lies outside it
    #[default]
    Intended,
}

impl BandCheck {
    /// Whether `frequency` fails the check for the band `min..=max`
    #[must_use]
    pub const fn rejects(self, frequency: u32, min: u32, max: u32) -> bool {
        match self {
            Self::Faithful => frequency > max || frequency < max,
            Self::Intended => frequency > max || frequency < min,
        }
    }
}

/// Complete receiver settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    frequency: Frequency,
    band_min: Frequency,
    band_max: Frequency,
    step: TuningStep,
    mode: Mode,
    volume: u8,
    squelch: SUnit,
    agc_speed: AgcSpeed,
    bandwidth: Bandwidth,
    auto_notch: bool,
    cw_sidetone: u8,
    gain_cal: u8,
    hardware: HardwareFlags,
    contrast: u8,
    suspend: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Settings {
    /// Factory defaults
    pub const DEFAULT: Self = Self {
        frequency: Frequency::saturating_from_hz(config::DEFAULT_FREQUENCY_HZ),
        band_min: Frequency::saturating_from_hz(config::default_band_min_hz()),
        band_max: Frequency::saturating_from_hz(config::default_band_max_hz()),
        step: config::DEFAULT_TUNING_STEP,
        mode: config::DEFAULT_MODE,
        volume: config::DEFAULT_VOLUME,
        squelch: SUnit::saturating(0),
        agc_speed: config::DEFAULT_AGC_SPEED,
        bandwidth: config::DEFAULT_BANDWIDTH,
        auto_notch: false,
        cw_sidetone: config::DEFAULT_CW_SIDETONE,
        gain_cal: DEFAULT_GAIN_CAL_DB,
        hardware: HardwareFlags::from_word(0),
        contrast: MAX_CONTRAST,
        suspend: false,
    };

    /// Tuned frequency
    #[must_use]
    pub const fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Band lower edge
    #[must_use]
    pub const fn band_min(&self) -> Frequency {
        self.band_min
    }

    /// Band upper edge
    #[must_use]
    pub const fn band_max(&self) -> Frequency {
        self.band_max
    }

    /// Tuning step
    #[must_use]
    pub const fn step(&self) -> TuningStep {
        self.step
    }

    /// Demodulation mode
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Volume (0..=9)
    #[must_use]
    pub const fn volume(&self) -> u8 {
        self.volume
    }

    /// Squelch threshold
    #[must_use]
    pub const fn squelch(&self) -> SUnit {
        self.squelch
    }

    /// AGC speed
    #[must_use]
    pub const fn agc_speed(&self) -> AgcSpeed {
        self.agc_speed
    }

    /// Channel bandwidth
    #[must_use]
    pub const fn bandwidth(&self) -> Bandwidth {
        self.bandwidth
    }

    /// Auto-notch enabled
    #[must_use]
    pub const fn auto_notch(&self) -> bool {
        self.auto_notch
    }

    /// CW sidetone in units of 100 Hz
    #[must_use]
    pub const fn cw_sidetone(&self) -> u8 {
        self.cw_sidetone
    }

    /// CW sidetone in Hz
    #[must_use]
    pub fn cw_sidetone_hz(&self) -> f32 {
        f32::from(self.cw_sidetone) * 100.0
    }

    /// Front-end gain calibration in dB
    #[must_use]
    pub const fn gain_cal(&self) -> u8 {
        self.gain_cal
    }

    /// Hardware flags
    #[must_use]
    pub const fn hardware(&self) -> HardwareFlags {
        self.hardware
    }

    /// Swap I and Q ahead of the demodulators
    #[must_use]
    pub const fn swap_iq(&self) -> bool {
        self.hardware.swap_iq
    }

    /// Display contrast (0..=15)
    #[must_use]
    pub const fn contrast(&self) -> u8 {
        self.contrast
    }

    /// Receiver is asked to park at the next block boundary
    #[must_use]
    pub const fn suspend(&self) -> bool {
        self.suspend
    }

    /// Set the tuned frequency, leaving the band alone
    #[must_use]
    pub const fn with_frequency(self, frequency: Frequency) -> Self {
        Self { frequency, ..self }
    }

    /// Set the band lower edge
    ///
    /// The upper edge rises to meet it if needed, and the frequency is
    /// pulled inside the band.
    #[must_use]
    pub fn with_band_min(self, band_min: Frequency) -> Self {
        Self { band_min, ..self }.normalize_band()
    }

    /// Set the band upper edge
    ///
    /// If it falls below the lower edge it is raised to it, and the
    /// frequency is pulled inside the band.
    #[must_use]
    pub fn with_band_max(self, band_max: Frequency) -> Self {
        Self { band_max, ..self }.normalize_band()
    }

    fn normalize_band(self) -> Self {
        let band_max = self.band_max.max(self.band_min);
        let frequency = self.frequency.clamp(self.band_min, band_max);
        Self {
            band_max,
            frequency,
            ..self
        }
    }

    /// Apply a typed-in frequency
    ///
    /// If `check` rejects it against the current band, the band resets to
    /// the full tuning range.
    #[must_use]
    pub fn with_entered_frequency(self, frequency: Frequency, check: BandCheck) -> Self {
        let band_max = self.band_max.max(self.band_min);
        let next = Self {
            frequency,
            band_max,
            ..self
        };
        if check.rejects(frequency.as_hz(), next.band_min.as_hz(), band_max.as_hz()) {
            Self {
                band_min: Frequency::MIN,
                band_max: Frequency::MAX,
                ..next
            }
        } else {
            next
        }
    }

    /// Move the frequency by `detents` encoder clicks
    ///
    /// Wraps to the lower edge above the band and to the upper edge below it.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn tune(self, detents: i32, rate: TuningRate) -> Self {
        let delta = i64::from(detents) * i64::from(rate.increment_hz(self.step));
        let target = i64::from(self.frequency.as_hz()) + delta;
        let frequency = if target > i64::from(self.band_max.as_hz()) {
            self.band_min
        } else if target < i64::from(self.band_min.as_hz()) {
            self.band_max
        } else {
            Frequency::saturating_from_hz(target as u32)
        };
        Self { frequency, ..self }
    }

    /// Set the tuning step
    ///
    /// The frequency is rounded down to a multiple of the new step.
    #[must_use]
    pub const fn with_step(self, step: TuningStep) -> Self {
        let hz = self.frequency.as_hz();
        Self {
            step,
            frequency: Frequency::saturating_from_hz(hz - hz % step.as_hz()),
            ..self
        }
    }

    /// Set the mode
    #[must_use]
    pub const fn with_mode(self, mode: Mode) -> Self {
        Self { mode, ..self }
    }

    /// Set the volume, clamped to 0..=9
    #[must_use]
    pub fn with_volume(self, volume: u8) -> Self {
        Self {
            volume: volume.min(MAX_VOLUME),
            ..self
        }
    }

    /// Set the squelch threshold
    #[must_use]
    pub const fn with_squelch(self, squelch: SUnit) -> Self {
        Self { squelch, ..self }
    }

    /// Set the AGC speed
    #[must_use]
    pub const fn with_agc_speed(self, agc_speed: AgcSpeed) -> Self {
        Self { agc_speed, ..self }
    }

    /// Set the bandwidth
    #[must_use]
    pub const fn with_bandwidth(self, bandwidth: Bandwidth) -> Self {
        Self { bandwidth, ..self }
    }

    /// Enable or disable the auto-notch
    #[must_use]
    pub const fn with_auto_notch(self, auto_notch: bool) -> Self {
        Self { auto_notch, ..self }
    }

    /// Set the CW sidetone in units of 100 Hz, clamped to 1..=30
    #[must_use]
    pub fn with_cw_sidetone(self, cw_sidetone: u8) -> Self {
        Self {
            cw_sidetone: cw_sidetone.clamp(*CW_SIDETONE_RANGE.start(), *CW_SIDETONE_RANGE.end()),
            ..self
        }
    }

    /// Set the gain calibration, clamped to 1..=100 dB
    #[must_use]
    pub fn with_gain_cal(self, gain_cal: u8) -> Self {
        Self {
            gain_cal: gain_cal.clamp(*GAIN_CAL_RANGE.start(), *GAIN_CAL_RANGE.end()),
            ..self
        }
    }

    /// Set the hardware flags
    #[must_use]
    pub fn with_hardware(self, hardware: HardwareFlags) -> Self {
        Self {
            hardware: HardwareFlags {
                display_timeout: hardware.display_timeout.min(MAX_DISPLAY_TIMEOUT),
                ..hardware
            },
            ..self
        }
    }

    /// Set the display contrast, clamped to 0..=15
    #[must_use]
    pub fn with_contrast(self, contrast: u8) -> Self {
        Self {
            contrast: contrast.min(MAX_CONTRAST),
            ..self
        }
    }

    /// Set the suspend request
    #[must_use]
    pub const fn with_suspend(self, suspend: bool) -> Self {
        Self { suspend, ..self }
    }

    /// Coerce every field into range
    #[must_use]
    pub fn clamped(self) -> Self {
        self.with_volume(self.volume)
            .with_cw_sidetone(self.cw_sidetone)
            .with_gain_cal(self.gain_cal)
            .with_hardware(self.hardware)
            .with_contrast(self.contrast)
            .normalize_band()
    }

    /// Persisted form; the suspend flag is never stored
    #[must_use]
    pub fn to_words(&self) -> [u32; RECORD_WORDS] {
        let mut words = [0u32; RECORD_WORDS];
        words[..SETTINGS_TO_STORE].copy_from_slice(&self.stored_words());
        words[word::SQUELCH] = u32::from(self.squelch.level());
        words[word::VOLUME] = u32::from(self.volume);
        words[word::CW_SIDETONE] = u32::from(self.cw_sidetone);
        words[word::HW_SETUP] = self.hardware.to_word();
        words[word::GAIN_CAL] = u32::from(self.gain_cal);
        words[word::BANDWIDTH] = self.bandwidth.index();
        words[word::CONTRAST] = u32::from(self.contrast);
        words[word::RX_FEATURES] = if self.auto_notch { FEATURE_AUTO_NOTCH } else { 0 };
        words
    }

    /// Decode the persisted form, clamping every field
    #[must_use]
    pub fn from_words(words: &[u32; RECORD_WORDS]) -> Self {
        let mut stored = [0u32; SETTINGS_TO_STORE];
        stored.copy_from_slice(&words[..SETTINGS_TO_STORE]);
        Self {
            squelch: SUnit::saturating(words[word::SQUELCH]),
            volume: small(words[word::VOLUME]),
            cw_sidetone: small(words[word::CW_SIDETONE]),
            hardware: HardwareFlags::from_word(words[word::HW_SETUP]),
            gain_cal: small(words[word::GAIN_CAL]),
            bandwidth: Bandwidth::from_index(words[word::BANDWIDTH]).unwrap_or(Bandwidth::ALL[0]),
            contrast: small(words[word::CONTRAST]),
            auto_notch: words[word::RX_FEATURES] & FEATURE_AUTO_NOTCH != 0,
            ..Self::default()
        }
        .with_stored_words(&stored)
    }

    /// The subset kept in a channel record
    #[must_use]
    pub const fn stored_words(&self) -> [u32; SETTINGS_TO_STORE] {
        [
            self.frequency.as_hz(),
            self.mode.index(),
            self.agc_speed.index(),
            self.step.index(),
            self.band_max.as_hz(),
            self.band_min.as_hz(),
        ]
    }

    /// Replace the channel subset, keeping all other fields
    #[must_use]
    pub fn with_stored_words(self, stored: &[u32; SETTINGS_TO_STORE]) -> Self {
        Self {
            frequency: Frequency::saturating_from_hz(stored[word::FREQUENCY]),
            mode: Mode::from_index(stored[word::MODE]).unwrap_or(Mode::ALL[0]),
            agc_speed: AgcSpeed::from_index(stored[word::AGC_SPEED]).unwrap_or(AgcSpeed::ALL[0]),
            step: TuningStep::from_index(stored[word::STEP]).unwrap_or(TuningStep::ALL[0]),
            band_max: Frequency::saturating_from_hz(stored[word::MAX_FREQUENCY]),
            band_min: Frequency::saturating_from_hz(stored[word::MIN_FREQUENCY]),
            ..self
        }
        .clamped()
    }
}

/// Narrow a stored word, saturating at `u8::MAX` before field clamping
#[allow(clippy::cast_possible_truncation)]
fn small(word: u32) -> u8 {
    word.min(u32::from(u8::MAX)) as u8
}

#[cfg(feature = "embedded")]
impl defmt::Format for Settings {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "{} {} {} vol {} sq {} agc {} bw {}",
            self.frequency,
            self.mode,
            self.step,
            self.volume,
            self.squelch,
            self.agc_speed,
            self.bandwidth
        );
    }
}
