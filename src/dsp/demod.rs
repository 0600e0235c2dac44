//! Demodulators
//!
//! Each detector turns one complex baseband sample into one audio sample.
//! [`DemodulatorBank`] holds one of each and dispatches on [`Mode`]; the
//! receiver only changes its mode between blocks.

use core::f32::consts::PI;
#[cfg(feature = "embedded")]
use micromath::F32Ext;

use super::filter::{hamming, BiquadCoeffs, BiquadFilter, DcBlocker};
use super::oscillator::QuadratureOscillator;
use crate::types::Mode;

/// IQ sample pair
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IqSample {
    /// In-phase component
    pub i: f32,
    /// Quadrature component
    pub q: f32,
}

impl IqSample {
    /// Create a new IQ sample
    #[must_use]
    pub const fn new(i: f32, q: f32) -> Self {
        Self { i, q }
    }

    /// Get magnitude
    #[must_use]
    pub fn magnitude(&self) -> f32 {
        self.magnitude_squared().sqrt()
    }

    /// Get squared magnitude
    #[must_use]
    pub fn magnitude_squared(&self) -> f32 {
        self.i * self.i + self.q * self.q
    }

    /// Complex multiply
    #[must_use]
    pub fn multiply(&self, other: Self) -> Self {
        Self {
            i: self.i * other.i - self.q * other.q,
            q: self.i * other.q + self.q * other.i,
        }
    }

    /// Complex conjugate
    #[must_use]
    pub const fn conjugate(&self) -> Self {
        Self {
            i: self.i,
            q: -self.q,
        }
    }

    /// Scale by a real factor
    #[must_use]
    pub fn scale(&self, factor: f32) -> Self {
        Self {
            i: self.i * factor,
            q: self.q * factor,
        }
    }

    /// Exchange the I and Q components
    #[must_use]
    pub const fn swapped(&self) -> Self {
        Self {
            i: self.q,
            q: self.i,
        }
    }
}

/// Consume one baseband sample, produce one audio sample
pub trait Demodulate {
    /// Demodulate one sample
    fn demodulate(&mut self, iq: IqSample) -> f32;

    /// Clear detector state
    fn reset(&mut self);
}

/// Taps in the Hilbert transformer
pub const HILBERT_TAPS: usize = 63;

/// Group delay of the Hilbert transformer in samples
pub const HILBERT_DELAY: usize = HILBERT_TAPS / 2;

/// Windowed FIR Hilbert transformer (90 degree phase shift)
///
/// Output is delayed by [`HILBERT_DELAY`] samples.
pub struct HilbertTransform {
    coeffs: [f32; HILBERT_TAPS],
    delay: [f32; HILBERT_TAPS],
    pos: usize,
}

impl HilbertTransform {
    /// Design the transformer
    #[must_use]
    pub fn new() -> Self {
        let mut coeffs = [0.0f32; HILBERT_TAPS];
        for (j, c) in coeffs.iter_mut().enumerate() {
            let n = j as i32 - HILBERT_DELAY as i32;
            if n % 2 != 0 {
                *c = 2.0 / (PI * n as f32) * hamming(j, HILBERT_TAPS);
            }
        }
        Self {
            coeffs,
            delay: [0.0; HILBERT_TAPS],
            pos: 0,
        }
    }

    /// Process a sample
    pub fn process(&mut self, input: f32) -> f32 {
        self.delay[self.pos] = input;

        let mut output = 0.0;
        let mut idx = self.pos;
        for &coeff in &self.coeffs {
            output += self.delay[idx] * coeff;
            idx = if idx == 0 { HILBERT_TAPS - 1 } else { idx - 1 };
        }

        self.pos = (self.pos + 1) % HILBERT_TAPS;
        output
    }

    /// Reset transform state
    pub fn reset(&mut self) {
        self.delay.fill(0.0);
        self.pos = 0;
    }
}

impl Default for HilbertTransform {
    fn default() -> Self {
        Self::new()
    }
}

/// AM demodulator using envelope detection
#[derive(Clone, Copy, Debug, Default)]
pub struct AmDemodulator {
    dc_blocker: DcBlocker,
}

impl Demodulate for AmDemodulator {
    fn demodulate(&mut self, iq: IqSample) -> f32 {
        self.dc_blocker.process(iq.magnitude())
    }

    fn reset(&mut self) {
        self.dc_blocker.reset();
    }
}

/// SSB product detector using the phasing method
///
/// USB is `I - H{Q}` and LSB is `I + H{Q}`, with I delayed to match the
/// Hilbert transformer.
pub struct SsbDemodulator {
    hilbert: HilbertTransform,
    i_delay: [f32; HILBERT_DELAY],
    pos: usize,
    usb: bool,
}

impl SsbDemodulator {
    /// Create a detector for the upper (`usb`) or lower sideband
    #[must_use]
    pub fn new(usb: bool) -> Self {
        Self {
            hilbert: HilbertTransform::new(),
            i_delay: [0.0; HILBERT_DELAY],
            pos: 0,
            usb,
        }
    }

    /// Select the sideband
    pub fn set_usb(&mut self, usb: bool) {
        self.usb = usb;
    }
}

impl Demodulate for SsbDemodulator {
    fn demodulate(&mut self, iq: IqSample) -> f32 {
        let delayed_i = self.i_delay[self.pos];
        self.i_delay[self.pos] = iq.i;
        self.pos = (self.pos + 1) % HILBERT_DELAY;

        let shifted_q = self.hilbert.process(iq.q);
        let sum = if self.usb {
            delayed_i - shifted_q
        } else {
            delayed_i + shifted_q
        };
        0.5 * sum
    }

    fn reset(&mut self) {
        self.hilbert.reset();
        self.i_delay.fill(0.0);
        self.pos = 0;
    }
}

/// FM deviation that maps to unity audio
const FM_DEVIATION_HZ: f32 = 5000.0;

/// De-emphasis time constant
const FM_DEEMPHASIS_TAU: f32 = 75e-6;

/// FM demodulator using arctan differentiation
pub struct FmDemodulator {
    prev_iq: IqSample,
    dc_blocker: DcBlocker,
    deemph: BiquadFilter,
    deviation_scale: f32,
}

impl FmDemodulator {
    /// Create a new FM demodulator
    #[must_use]
    pub fn new(sample_rate: f32) -> Self {
        let cutoff = 1.0 / (2.0 * PI * FM_DEEMPHASIS_TAU * sample_rate);
        Self {
            prev_iq: IqSample::default(),
            dc_blocker: DcBlocker::default(),
            deemph: BiquadFilter::with_coeffs(BiquadCoeffs::lowpass(cutoff, 0.707)),
            deviation_scale: sample_rate / (2.0 * PI * FM_DEVIATION_HZ),
        }
    }
}

impl Demodulate for FmDemodulator {
    fn demodulate(&mut self, iq: IqSample) -> f32 {
        // Conjugate multiply with previous sample
        let product = iq.multiply(self.prev_iq.conjugate());
        self.prev_iq = iq;

        let phase_diff = product.q.atan2(product.i);
        let deemph = self.deemph.process(phase_diff * self.deviation_scale);
        self.dc_blocker.process(deemph)
    }

    fn reset(&mut self) {
        self.prev_iq = IqSample::default();
        self.dc_blocker.reset();
        self.deemph.reset();
    }
}

/// CW product detector
///
/// Mixes the narrowband baseband with a local oscillator at the sidetone
/// pitch, so a zero-beat carrier is heard as a tone at that pitch.
pub struct CwDemodulator {
    bfo: QuadratureOscillator,
    sample_rate: f32,
    sidetone_hz: f32,
}

impl CwDemodulator {
    /// Create a detector with the given sidetone pitch
    #[must_use]
    pub fn new(sample_rate: f32, sidetone_hz: f32) -> Self {
        let mut demod = Self {
            bfo: QuadratureOscillator::new(),
            sample_rate,
            sidetone_hz: 0.0,
        };
        demod.set_sidetone(sidetone_hz);
        demod
    }

    /// Change the sidetone pitch
    pub fn set_sidetone(&mut self, sidetone_hz: f32) {
        if (sidetone_hz - self.sidetone_hz).abs() > f32::EPSILON {
            self.sidetone_hz = sidetone_hz;
            self.bfo.set_frequency(sidetone_hz, self.sample_rate);
        }
    }

    /// Current sidetone pitch
    #[must_use]
    pub const fn sidetone(&self) -> f32 {
        self.sidetone_hz
    }
}

impl Demodulate for CwDemodulator {
    fn demodulate(&mut self, iq: IqSample) -> f32 {
        let (cos, sin) = self.bfo.next();
        iq.i * cos - iq.q * sin
    }

    fn reset(&mut self) {
        self.bfo.reset();
    }
}

/// One detector per mode, dispatched on the applied [`Mode`]
pub struct DemodulatorBank {
    am: AmDemodulator,
    ssb: SsbDemodulator,
    fm: FmDemodulator,
    cw: CwDemodulator,
    mode: Mode,
}

impl DemodulatorBank {
    /// Create the bank at the baseband sample rate
    #[must_use]
    pub fn new(sample_rate: f32, mode: Mode, sidetone_hz: f32) -> Self {
        let mut bank = Self {
            am: AmDemodulator::default(),
            ssb: SsbDemodulator::new(true),
            fm: FmDemodulator::new(sample_rate),
            cw: CwDemodulator::new(sample_rate, sidetone_hz),
            mode,
        };
        bank.set_mode(mode);
        bank
    }

    /// Select the detector; the new detector starts from a clean state
    pub fn set_mode(&mut self, mode: Mode) {
        let changed = mode != self.mode;
        self.mode = mode;
        self.ssb.set_usb(mode != Mode::Lsb);
        if changed {
            self.active().reset();
        }
    }

    /// Active mode
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Change the CW sidetone pitch
    pub fn set_sidetone(&mut self, sidetone_hz: f32) {
        self.cw.set_sidetone(sidetone_hz);
    }

    fn active(&mut self) -> &mut dyn Demodulate {
        match self.mode {
            Mode::Am => &mut self.am,
            Mode::Lsb | Mode::Usb => &mut self.ssb,
            Mode::Fm => &mut self.fm,
            Mode::Cw => &mut self.cw,
        }
    }

    /// Demodulate one sample with the active detector
    pub fn process(&mut self, iq: IqSample) -> f32 {
        self.active().demodulate(iq)
    }

    /// Reset all detectors
    pub fn reset(&mut self) {
        self.am.reset();
        self.ssb.reset();
        self.fm.reset();
        self.cw.reset();
    }
}
