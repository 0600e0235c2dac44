//! Automatic Gain Control, signal strength and squelch
//!
//! The AGC runs on the complex baseband ahead of the detectors. Signal
//! strength is measured on the same baseband before the AGC, smoothed once
//! per block, and drives both the S-meter and the squelch gate.

#[cfg(feature = "embedded")]
use micromath::F32Ext;

use super::demod::IqSample;
use crate::config::calibration::{FULL_SCALE_DBM, FULL_SCALE_SIGNAL_STRENGTH};
use crate::types::{AgcSpeed, SUnit};

/// AGC configuration
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgcConfig {
    /// Attack time constant in samples
    pub attack_samples: f32,
    /// Decay time constant in samples
    pub decay_samples: f32,
    /// Hang time in samples (delay before decay starts)
    pub hang_samples: u32,
    /// Target envelope level
    pub target_level: f32,
    /// Maximum gain in dB
    pub max_gain_db: f32,
    /// Minimum gain in dB
    pub min_gain_db: f32,
}

impl AgcConfig {
    /// Time constants for a speed preset at the given sample rate
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn for_speed(speed: AgcSpeed, sample_rate: u32) -> Self {
        let samples_per_ms = sample_rate as f32 / 1000.0;
        Self {
            attack_samples: speed.attack_ms() * samples_per_ms,
            decay_samples: speed.decay_ms() * samples_per_ms,
            hang_samples: (speed.hang_ms() * samples_per_ms) as u32,
            target_level: 0.5,
            max_gain_db: 80.0,
            min_gain_db: -20.0,
        }
    }

    fn coeff(samples: f32) -> f32 {
        if samples <= 0.0 {
            1.0
        } else {
            1.0 - (-1.0 / samples).exp()
        }
    }
}

/// AGC state
#[derive(Clone, Copy, Debug)]
pub struct Agc {
    config: AgcConfig,
    /// Current gain (linear)
    gain: f32,
    /// Envelope follower output
    envelope: f32,
    /// Hang timer (samples remaining)
    hang_counter: u32,
    attack_coeff: f32,
    decay_coeff: f32,
    max_gain: f32,
    min_gain: f32,
}

impl Agc {
    /// Create a new AGC processor
    #[must_use]
    pub fn new(config: AgcConfig) -> Self {
        let mut agc = Self {
            config,
            gain: 1.0,
            envelope: 0.0,
            hang_counter: 0,
            attack_coeff: 1.0,
            decay_coeff: 1.0,
            max_gain: 1.0,
            min_gain: 1.0,
        };
        agc.set_config(config);
        agc
    }

    /// Apply gain to one baseband sample
    pub fn process(&mut self, iq: IqSample) -> IqSample {
        let level = iq.magnitude();

        if level > self.envelope {
            self.envelope += self.attack_coeff * (level - self.envelope);
            self.hang_counter = self.config.hang_samples;
        } else if self.hang_counter > 0 {
            self.hang_counter -= 1;
        } else {
            self.envelope += self.decay_coeff * (level - self.envelope);
        }

        let desired_gain = if self.envelope > 1e-9 {
            self.config.target_level / self.envelope
        } else {
            self.max_gain
        };
        let clamped_gain = desired_gain.clamp(self.min_gain, self.max_gain);

        if clamped_gain < self.gain {
            self.gain += self.attack_coeff * (clamped_gain - self.gain);
        } else {
            self.gain += self.decay_coeff * (clamped_gain - self.gain);
        }

        iq.scale(self.gain)
    }

    /// Get current gain in dB
    #[must_use]
    pub fn gain_db(&self) -> f32 {
        20.0 * self.gain.log10()
    }

    /// Get current envelope level
    #[must_use]
    pub fn envelope(&self) -> f32 {
        self.envelope
    }

    /// Reset AGC state
    pub fn reset(&mut self) {
        self.gain = 1.0;
        self.envelope = 0.0;
        self.hang_counter = 0;
    }

    /// Update configuration, keeping the current gain
    pub fn set_config(&mut self, config: AgcConfig) {
        self.config = config;
        self.attack_coeff = AgcConfig::coeff(config.attack_samples);
        self.decay_coeff = AgcConfig::coeff(config.decay_samples);
        self.max_gain = db_to_linear(config.max_gain_db);
        self.min_gain = db_to_linear(config.min_gain_db);
    }

    /// Current configuration
    #[must_use]
    pub const fn config(&self) -> &AgcConfig {
        &self.config
    }
}

fn db_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Convert a CIC-scale signal magnitude to dBm
///
/// `gain_cal_db` is the total front-end gain ahead of the ADC.
#[must_use]
pub fn magnitude_to_dbm(magnitude: f32, gain_cal_db: u8) -> f32 {
    let relative = magnitude.max(1e-3) / FULL_SCALE_SIGNAL_STRENGTH;
    20.0 * relative.log10() + FULL_SCALE_DBM - f32::from(gain_cal_db)
}

/// Smoothing per block for the signal strength estimate
const STRENGTH_ALPHA: f32 = 0.25;

/// Smoothed signal strength in CIC output units
#[derive(Clone, Copy, Debug, Default)]
pub struct SignalStrength {
    smoothed: f32,
    primed: bool,
}

impl SignalStrength {
    /// Create an estimator with no history
    #[must_use]
    pub const fn new() -> Self {
        Self {
            smoothed: 0.0,
            primed: false,
        }
    }

    /// Fold in one block's RMS magnitude
    pub fn update(&mut self, block_rms: f32) {
        if self.primed {
            self.smoothed += STRENGTH_ALPHA * (block_rms - self.smoothed);
        } else {
            self.smoothed = block_rms;
            self.primed = true;
        }
    }

    /// Smoothed magnitude
    #[must_use]
    pub const fn magnitude(&self) -> f32 {
        self.smoothed
    }

    /// Smoothed strength in dBm
    #[must_use]
    pub fn dbm(&self, gain_cal_db: u8) -> f32 {
        magnitude_to_dbm(self.smoothed, gain_cal_db)
    }

    /// Smoothed strength on the S-meter scale
    #[must_use]
    pub fn s_unit(&self, gain_cal_db: u8) -> SUnit {
        SUnit::from_dbm(self.dbm(gain_cal_db))
    }

    /// Discard history
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Audio gate driven by the smoothed S-meter reading
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Squelch {
    open: bool,
}

impl Squelch {
    /// Create a closed squelch
    #[must_use]
    pub const fn new() -> Self {
        Self { open: false }
    }

    /// Open when `strength` reaches `threshold`; a threshold of S0 never mutes
    pub fn update(&mut self, strength: SUnit, threshold: SUnit) -> bool {
        self.open = strength >= threshold;
        self.open
    }

    /// Whether audio currently passes
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for SignalStrength {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{} (mag {})", self.s_unit(crate::config::calibration::DEFAULT_GAIN_CAL_DB), self.smoothed);
    }
}
