//! Digital Filters
//!
//! Fixed-point FIR decimation for the baseband stage and floating point
//! biquads for the bandwidth filter and audio DC removal.

use fixed::types::I1F15;
#[cfg(feature = "embedded")]
use micromath::F32Ext;

use core::f32::consts::PI;

/// Fixed-point sample type (Q1.15 format)
pub type Sample = I1F15;

/// Convert f32 to fixed-point sample
#[must_use]
pub fn to_sample(value: f32) -> Sample {
    Sample::from_num(value.clamp(-1.0, 0.99997))
}

/// Convert fixed-point sample to f32
#[must_use]
pub fn from_sample(sample: Sample) -> f32 {
    sample.to_num::<f32>()
}

/// FIR filter coefficients
#[derive(Clone)]
pub struct FirCoefficients<const N: usize> {
    taps: [Sample; N],
}

impl<const N: usize> FirCoefficients<N> {
    /// Create coefficients from f32 array
    #[must_use]
    pub fn from_f32(coeffs: &[f32; N]) -> Self {
        let mut taps = [Sample::ZERO; N];
        for (tap, &c) in taps.iter_mut().zip(coeffs) {
            *tap = to_sample(c);
        }
        Self { taps }
    }

    /// Get coefficient at index
    #[must_use]
    pub fn get(&self, index: usize) -> Sample {
        self.taps.get(index).copied().unwrap_or(Sample::ZERO)
    }

    /// Hamming-windowed sinc lowpass with unity DC gain
    ///
    /// `cutoff_normalized` is relative to the sample rate (0.0 to 0.5).
    #[must_use]
    pub fn lowpass(cutoff_normalized: f32) -> Self {
        let mut coeffs = [0.0f32; N];
        let m = (N - 1) as f32;
        let fc = cutoff_normalized.clamp(0.0, 0.5);

        for (i, c) in coeffs.iter_mut().enumerate() {
            let n = i as f32 - m / 2.0;
            *c = if n.abs() < 0.0001 {
                2.0 * fc
            } else {
                (2.0 * PI * fc * n).sin() / (PI * n)
            };
            *c *= hamming(i, N);
        }

        let sum: f32 = coeffs.iter().sum();
        if sum.abs() > 0.0001 {
            for c in &mut coeffs {
                *c /= sum;
            }
        }

        Self::from_f32(&coeffs)
    }
}

/// Hamming window value for tap `i` of `len`
#[must_use]
pub fn hamming(i: usize, len: usize) -> f32 {
    if len < 2 {
        return 1.0;
    }
    0.54 - 0.46 * (2.0 * PI * i as f32 / (len - 1) as f32).cos()
}

/// FIR filter state
///
/// Products accumulate at double width and are rounded once per output,
/// so the result carries a single LSB of quantization error.
pub struct FirFilter<const N: usize> {
    coeffs: FirCoefficients<N>,
    /// Delay line (circular buffer)
    delay: [Sample; N],
    /// Slot for the next input
    pos: usize,
}

impl<const N: usize> FirFilter<N> {
    /// Create a new FIR filter with given coefficients
    #[must_use]
    pub fn new(coeffs: FirCoefficients<N>) -> Self {
        Self {
            coeffs,
            delay: [Sample::ZERO; N],
            pos: 0,
        }
    }

    /// Shift one sample into the delay line without computing an output
    pub fn push(&mut self, input: Sample) {
        self.delay[self.pos] = input;
        self.pos = (self.pos + 1) % N;
    }

    /// Convolution over the current delay line
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn output(&self) -> Sample {
        let mut acc: i64 = 0;
        let mut idx = self.pos;
        for i in 0..N {
            idx = if idx == 0 { N - 1 } else { idx - 1 };
            acc += i64::from(self.delay[idx].to_bits()) * i64::from(self.coeffs.get(i).to_bits());
        }
        let rounded = (acc + (1 << 14)) >> 15;
        Sample::from_bits(rounded.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16)
    }

    /// Process a single sample
    pub fn process(&mut self, input: Sample) -> Sample {
        self.push(input);
        self.output()
    }

    /// Reset filter state
    pub fn reset(&mut self) {
        self.delay.fill(Sample::ZERO);
        self.pos = 0;
    }
}

/// Taps in the baseband decimation filter
pub const HALF_BAND_TAPS: usize = 31;

/// Lowpass FIR decimating by two
///
/// Every input is shifted in; an output is computed only on every second
/// input.
pub struct HalfBandDecimator {
    fir: FirFilter<HALF_BAND_TAPS>,
    odd: bool,
}

impl HalfBandDecimator {
    /// Create the decimator with its cutoff at a quarter of the input rate
    #[must_use]
    pub fn new() -> Self {
        Self {
            fir: FirFilter::new(FirCoefficients::lowpass(0.25)),
            odd: false,
        }
    }

    /// Feed one input sample, returning an output every second call
    pub fn process(&mut self, input: Sample) -> Option<Sample> {
        self.fir.push(input);
        self.odd = !self.odd;
        if self.odd {
            None
        } else {
            Some(self.fir.output())
        }
    }

    /// Reset filter state
    pub fn reset(&mut self) {
        self.fir.reset();
        self.odd = false;
    }
}

impl Default for HalfBandDecimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Biquad (second-order IIR) filter coefficients
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiquadCoeffs {
    /// Numerator coefficients (b0, b1, b2)
    b: [f32; 3],
    /// Denominator coefficients (a1, a2) - a0 is always 1
    a: [f32; 2],
}

impl BiquadCoeffs {
    /// Create lowpass biquad filter
    #[must_use]
    pub fn lowpass(freq_normalized: f32, q: f32) -> Self {
        let w0 = 2.0 * PI * freq_normalized;
        let (sin_w0, cos_w0) = (w0.sin(), w0.cos());
        let alpha = sin_w0 / (2.0 * q);

        let b0 = (1.0 - cos_w0) / 2.0;
        let b1 = 1.0 - cos_w0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        Self {
            b: [b0 / a0, b1 / a0, b0 / a0],
            a: [a1 / a0, a2 / a0],
        }
    }
}

/// Biquad filter state
#[derive(Clone, Copy, Debug, Default)]
pub struct BiquadFilter {
    coeffs: Option<BiquadCoeffs>,
    /// State variables (Direct Form II Transposed)
    z: [f32; 2],
}

impl BiquadFilter {
    /// Create a pass-through biquad
    #[must_use]
    pub const fn new() -> Self {
        Self {
            coeffs: None,
            z: [0.0; 2],
        }
    }

    /// Create with coefficients
    #[must_use]
    pub fn with_coeffs(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs: Some(coeffs),
            z: [0.0; 2],
        }
    }

    /// Set coefficients, keeping state
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = Some(coeffs);
    }

    /// Process a single sample
    pub fn process(&mut self, input: f32) -> f32 {
        let Some(c) = &self.coeffs else {
            return input;
        };

        let output = c.b[0] * input + self.z[0];
        self.z[0] = c.b[1] * input - c.a[0] * output + self.z[1];
        self.z[1] = c.b[2] * input - c.a[1] * output;

        output
    }

    /// Reset filter state
    pub fn reset(&mut self) {
        self.z = [0.0; 2];
    }
}

/// Section Q values of a 4th-order Butterworth response
const BUTTERWORTH_Q: [f32; 2] = [0.541_196_1, 1.306_563];

/// Fourth-order Butterworth lowpass built from two biquads
#[derive(Clone, Copy, Debug, Default)]
pub struct ButterworthLowpass {
    sections: [BiquadFilter; 2],
    cutoff_normalized: f32,
}

impl ButterworthLowpass {
    /// Create a lowpass with the given normalized cutoff
    #[must_use]
    pub fn new(cutoff_normalized: f32) -> Self {
        let mut filter = Self::default();
        filter.set_cutoff(cutoff_normalized);
        filter
    }

    /// Redesign for a new cutoff if it changed
    pub fn set_cutoff(&mut self, cutoff_normalized: f32) {
        if (cutoff_normalized - self.cutoff_normalized).abs() < f32::EPSILON {
            return;
        }
        self.cutoff_normalized = cutoff_normalized;
        for (section, q) in self.sections.iter_mut().zip(BUTTERWORTH_Q) {
            section.set_coeffs(BiquadCoeffs::lowpass(cutoff_normalized, q));
        }
    }

    /// Current normalized cutoff
    #[must_use]
    pub const fn cutoff(&self) -> f32 {
        self.cutoff_normalized
    }

    /// Process a single sample
    pub fn process(&mut self, input: f32) -> f32 {
        let stage = self.sections[0].process(input);
        self.sections[1].process(stage)
    }

    /// Reset filter state
    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }
}

/// DC blocking filter (simple IIR highpass)
#[derive(Clone, Copy, Debug)]
pub struct DcBlocker {
    x_prev: f32,
    y_prev: f32,
    /// Pole position (0.99 typical)
    alpha: f32,
}

impl DcBlocker {
    /// Create a new DC blocker
    #[must_use]
    pub const fn new(alpha: f32) -> Self {
        Self {
            x_prev: 0.0,
            y_prev: 0.0,
            alpha,
        }
    }

    /// Process a single sample
    pub fn process(&mut self, input: f32) -> f32 {
        let output = input - self.x_prev + self.alpha * self.y_prev;
        self.x_prev = input;
        self.y_prev = output;
        output
    }

    /// Reset filter state
    pub fn reset(&mut self) {
        self.x_prev = 0.0;
        self.y_prev = 0.0;
    }
}

impl Default for DcBlocker {
    fn default() -> Self {
        Self::new(0.995)
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn fir_dc_gain_is_unity() {
        let mut fir = FirFilter::new(FirCoefficients::<31>::lowpass(0.25));
        let input = to_sample(0.25);
        let mut out = Sample::ZERO;
        for _ in 0..40 {
            out = fir.process(input);
        }
        assert!((from_sample(out) - 0.25).abs() < 0.002, "got {}", from_sample(out));
    }

    #[test]
    fn half_band_emits_every_second_sample() {
        let mut hb = HalfBandDecimator::new();
        let outputs = (0..10).filter_map(|_| hb.process(Sample::ZERO)).count();
        assert_eq!(outputs, 5);
    }

    #[test]
    fn butterworth_passes_dc() {
        let mut lp = ButterworthLowpass::new(0.1);
        let mut out = 0.0;
        for _ in 0..500 {
            out = lp.process(1.0);
        }
        assert!((out - 1.0).abs() < 1e-3);
    }
}
