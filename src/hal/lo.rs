//! Local Oscillator
//!
//! A square-wave LO from one PWM slice. The divider is 8.4 fixed point and
//! the counter top is kept as small as the divider range allows, which
//! gives the finest frequency resolution.

use embassy_rp::pwm::{Config, Pwm};
use fixed::types::extra::U4;
use fixed::FixedU16;

use crate::config::SYSTEM_CLOCK_HZ;
use crate::log::debug;

/// Largest divider in sixteenths (255 + 15/16)
const MAX_DIVIDER_16THS: u64 = 4095;

/// Divider and counter settings for one LO frequency
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoPlan {
    /// Counter top (period is `top + 1` counts)
    pub top: u16,
    /// Clock divider in sixteenths
    pub divider_16ths: u16,
}

impl LoPlan {
    /// Plan for `lo_hz` from `clock_hz`; `None` if out of reach
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn for_frequency(lo_hz: u32, clock_hz: u32) -> Option<Self> {
        if lo_hz == 0 {
            return None;
        }
        let total = u64::from(clock_hz) * 16 / u64::from(lo_hz);
        let counts = total.div_ceil(MAX_DIVIDER_16THS).max(2);
        let divider = (total + counts / 2) / counts;
        if counts > u64::from(u16::MAX) + 1 || !(16..=MAX_DIVIDER_16THS).contains(&divider) {
            return None;
        }
        Some(Self {
            top: (counts - 1) as u16,
            divider_16ths: divider as u16,
        })
    }

    /// Frequency actually produced
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn frequency(&self, clock_hz: u32) -> u32 {
        let period = (u64::from(self.top) + 1) * u64::from(self.divider_16ths);
        (u64::from(clock_hz) * 16 / period.max(1)) as u32
    }
}

impl defmt::Format for LoPlan {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "top {} div {}/16", self.top, self.divider_16ths);
    }
}

/// PWM-driven local oscillator
pub struct LocalOscillator<'d> {
    pwm: Pwm<'d>,
    config: Config,
}

impl<'d> LocalOscillator<'d> {
    /// Wrap a PWM slice configured for output A
    #[must_use]
    pub fn new(pwm: Pwm<'d>) -> Self {
        let mut config = Config::default();
        config.enable = false;
        Self { pwm, config }
    }

    /// Retune; out-of-reach frequencies leave the LO unchanged
    pub fn set_frequency(&mut self, lo_hz: u32) {
        let Some(plan) = LoPlan::for_frequency(lo_hz, SYSTEM_CLOCK_HZ) else {
            debug!("lo: {} Hz out of range", lo_hz);
            return;
        };
        self.config.top = plan.top;
        self.config.divider = FixedU16::<U4>::from_bits(plan.divider_16ths);
        self.config.compare_a = plan.top / 2 + 1;
        self.config.enable = true;
        self.pwm.set_config(&self.config);
        debug!("lo: {} ({} Hz)", plan, plan.frequency(SYSTEM_CLOCK_HZ));
    }

    /// Start or stop the output
    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enable = enabled;
        self.pwm.set_config(&self.config);
    }
}
