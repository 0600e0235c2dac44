//! Digital Oscillators
//!
//! A table-driven fixed-point NCO for the frequency shift stage and a
//! rotating-phasor oscillator for the CW sidetone beat.

use core::f32::consts::PI;
#[cfg(feature = "embedded")]
use micromath::F32Ext;

/// log2 of the sine table length
const TABLE_BITS: u32 = 10;

/// Sine table length
pub const TABLE_LEN: usize = 1 << TABLE_BITS;

/// Full-cycle Q15 sine table
///
/// Built once at start-up; the receiver never calls `sin` per sample.
#[derive(Clone)]
pub struct SineTable {
    table: [i16; TABLE_LEN],
}

impl SineTable {
    /// Compute the table
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new() -> Self {
        let mut table = [0i16; TABLE_LEN];
        for (i, entry) in table.iter_mut().enumerate() {
            let radians = 2.0 * PI * i as f32 / TABLE_LEN as f32;
            *entry = (radians.sin() * 32767.0).round() as i16;
        }
        Self { table }
    }

    /// `(cos, sin)` at a 32-bit phase
    #[must_use]
    pub fn lookup(&self, phase: u32) -> (i16, i16) {
        let index = (phase >> (32 - TABLE_BITS)) as usize;
        let cos_index = (index + TABLE_LEN / 4) & (TABLE_LEN - 1);
        (self.table[cos_index], self.table[index])
    }
}

impl Default for SineTable {
    fn default() -> Self {
        Self::new()
    }
}

/// NCO (Numerically Controlled Oscillator) with phase accumulator
///
/// Produces Q15 quadrature samples from a [`SineTable`].
#[derive(Clone)]
pub struct Nco {
    table: SineTable,
    /// Phase accumulator
    phase: u32,
    /// Phase increment per sample
    phase_inc: u32,
}

impl Nco {
    /// Create an NCO at `freq_hz` for the given sample rate
    #[must_use]
    pub fn new(freq_hz: u32, sample_rate: u32) -> Self {
        let mut nco = Self {
            table: SineTable::new(),
            phase: 0,
            phase_inc: 0,
        };
        nco.set_frequency(freq_hz, sample_rate);
        nco
    }

    /// Set frequency (integer Hz at given sample rate)
    #[allow(clippy::cast_possible_truncation)]
    pub fn set_frequency(&mut self, freq_hz: u32, sample_rate: u32) {
        // phase_inc = freq * 2^32 / sample_rate
        self.phase_inc = ((u64::from(freq_hz) << 32) / u64::from(sample_rate.max(1))) as u32;
    }

    /// Next `(cos, sin)` pair in Q15
    pub fn next_q15(&mut self) -> (i16, i16) {
        let out = self.table.lookup(self.phase);
        self.phase = self.phase.wrapping_add(self.phase_inc);
        out
    }

    /// Phase increment per sample
    #[must_use]
    pub const fn phase_increment(&self) -> u32 {
        self.phase_inc
    }

    /// Reset phase
    pub fn reset(&mut self) {
        self.phase = 0;
    }
}

/// Quadrature oscillator (I/Q generation)
///
/// Generates sine and cosine simultaneously by rotating a unit phasor.
#[derive(Clone, Copy, Debug)]
pub struct QuadratureOscillator {
    /// Sine state (imaginary part)
    sin_state: f32,
    /// Cosine state (real part)
    cos_state: f32,
    sin_inc: f32,
    cos_inc: f32,
}

impl QuadratureOscillator {
    /// Create a stopped oscillator at phase zero
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sin_state: 0.0,
            cos_state: 1.0,
            sin_inc: 0.0,
            cos_inc: 1.0,
        }
    }

    /// Set frequency
    pub fn set_frequency(&mut self, freq_hz: f32, sample_rate: f32) {
        let phase_inc = 2.0 * PI * freq_hz / sample_rate;
        self.sin_inc = phase_inc.sin();
        self.cos_inc = phase_inc.cos();
    }

    /// Generate next `(cos, sin)` pair
    pub fn next(&mut self) -> (f32, f32) {
        let i = self.cos_state;
        let q = self.sin_state;

        let new_cos = self.cos_state * self.cos_inc - self.sin_state * self.sin_inc;
        let new_sin = self.sin_state * self.cos_inc + self.cos_state * self.sin_inc;

        self.cos_state = new_cos;
        self.sin_state = new_sin;

        // Renormalize to stop amplitude drift
        let mag_sq = new_cos * new_cos + new_sin * new_sin;
        if (mag_sq - 1.0).abs() > 0.0001 {
            let mag = mag_sq.sqrt();
            self.cos_state /= mag;
            self.sin_state /= mag;
        }

        (i, q)
    }

    /// Reset to initial state
    pub fn reset(&mut self) {
        self.sin_state = 0.0;
        self.cos_state = 1.0;
    }
}

impl Default for QuadratureOscillator {
    fn default() -> Self {
        Self::new()
    }
}
