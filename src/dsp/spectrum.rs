//! Spectrum Analysis Module
//!
//! Once per block the 128 complex CIC outputs are windowed, transformed
//! with a radix-2 FFT and stored FFT-shifted as dB magnitudes, so bin 64
//! sits on the tuned frequency.

#[cfg(feature = "embedded")]
use micromath::F32Ext;

use core::f32::consts::PI;

use super::demod::IqSample;
use crate::config::SPECTRUM_BINS;

const N: usize = SPECTRUM_BINS;
const LOG2_N: u32 = N.trailing_zeros();

const _: () = assert!(N.is_power_of_two());

/// Magnitude floor in dB
pub const FLOOR_DB: f32 = -120.0;

/// 128-point windowed FFT magnitude estimator
#[derive(Clone)]
pub struct SpectrumEstimator {
    window: [f32; N],
    /// `(cos, sin)` of `2*pi*m/N` for `m < N/2`
    twiddles: [(f32, f32); N / 2],
    re: [f32; N],
    im: [f32; N],
}

impl SpectrumEstimator {
    /// Precompute window and twiddles
    #[must_use]
    pub fn new() -> Self {
        let mut window = [0.0f32; N];
        for (n, w) in window.iter_mut().enumerate() {
            *w = 0.5 - 0.5 * (2.0 * PI * n as f32 / N as f32).cos();
        }
        let mut twiddles = [(0.0f32, 0.0f32); N / 2];
        for (m, t) in twiddles.iter_mut().enumerate() {
            let angle = 2.0 * PI * m as f32 / N as f32;
            *t = (angle.cos(), angle.sin());
        }
        Self {
            window,
            twiddles,
            re: [0.0; N],
            im: [0.0; N],
        }
    }

    /// Transform one block of samples into `bins`
    ///
    /// Missing samples are treated as zero.
    pub fn process(&mut self, samples: &[IqSample], bins: &mut [f32; N]) {
        for n in 0..N {
            let target = (n as u32).reverse_bits() >> (32 - LOG2_N);
            let sample = samples.get(n).copied().unwrap_or_default();
            self.re[target as usize] = sample.i * self.window[n];
            self.im[target as usize] = sample.q * self.window[n];
        }

        self.butterflies();

        let scale = 1.0 / N as f32;
        for (k, bin) in bins.iter_mut().enumerate() {
            let source = (k + N / 2) % N;
            let magnitude = IqSample::new(self.re[source], self.im[source]).magnitude() * scale;
            *bin = if magnitude > 0.0 {
                (20.0 * magnitude.log10()).max(FLOOR_DB)
            } else {
                FLOOR_DB
            };
        }
    }

    fn butterflies(&mut self) {
        let mut len = 2;
        while len <= N {
            let half = len / 2;
            let stride = N / len;
            for start in (0..N).step_by(len) {
                for k in 0..half {
                    let (c, s) = self.twiddles[k * stride];
                    let top = start + k;
                    let bottom = top + half;
                    let (br, bi) = (self.re[bottom], self.im[bottom]);
                    // bottom * e^{-j theta}
                    let tr = br * c + bi * s;
                    let ti = bi * c - br * s;
                    self.re[bottom] = self.re[top] - tr;
                    self.im[bottom] = self.im[top] - ti;
                    self.re[top] += tr;
                    self.im[top] += ti;
                }
            }
            len *= 2;
        }
    }
}

impl Default for SpectrumEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Frequency offset of a shifted bin from the tuned frequency
#[must_use]
#[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
pub fn bin_offset_hz(bin: usize, sample_rate: u32) -> i32 {
    let width = sample_rate as f32 / N as f32;
    ((bin as i32 - (N / 2) as i32) as f32 * width) as i32
}

/// Strongest bin and its level
#[must_use]
pub fn peak_bin(bins: &[f32]) -> Option<(usize, f32)> {
    bins.iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, level)| match best {
            Some((_, top)) if top >= level => best,
            _ => Some((i, level)),
        })
}
