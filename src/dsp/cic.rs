//! Cascaded Integrator-Comb Filters
//!
//! Multiplier-free decimation and interpolation for the fixed receiver
//! chain. Integrators and combs run in wrapping `i32` arithmetic: the
//! intermediate registers may overflow, but the filter output is exact
//! modulo 2^32 and the design keeps the true output well inside `i32`.
//!
//! The raw CIC output carries a gain of `rate^order` (decimator) or
//! `rate^(order-1)` (interpolator). [`CicScaling`] removes that gain with a
//! shift, a single Q15 correction multiply and a bias term, all derived
//! once when the filter is constructed.

/// Fractional bits of the gain correction multiplier
const CORRECTION_BITS: u32 = 15;

/// Bits kept below the output LSB before the correction multiply
const GUARD_BITS: u32 = 2;

/// `rate^order`
#[must_use]
pub const fn rate_power(order: usize, rate: usize) -> u64 {
    let mut power = 1u64;
    let mut i = 0;
    while i < order {
        power *= rate as u64;
        i += 1;
    }
    power
}

/// `ceil(order * log2(rate))`, the bits of growth through the filter
#[must_use]
pub const fn bit_growth(order: usize, rate: usize) -> u32 {
    ceil_log2(rate_power(order, rate))
}

const fn ceil_log2(value: u64) -> u32 {
    let mut bits = 0;
    while (1u64 << bits) < value {
        bits += 1;
    }
    bits
}

/// Output scaling for a CIC filter
///
/// Maps a raw output `y` to `y * 2^extra_bits / gain`, rounded to nearest:
///
/// ```text
/// out = ((y >> pre_shift) * correction + bias) >> post_shift
/// ```
///
/// `bias` restores the half-LSB lost by the pre-shift, adds half an output
/// LSB for rounding, and optionally cancels the mean error of a truncating
/// stage feeding the filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CicScaling {
    bit_growth: u32,
    pre_shift: u32,
    correction: i64,
    bias: i64,
    post_shift: u32,
}

impl CicScaling {
    /// Derive the scaling for a filter with DC gain `gain`
    ///
    /// `truncated_input` compensates an input produced by a flooring shift,
    /// whose mean error is -0.5 LSB.
    #[must_use]
    pub const fn new(gain: u64, extra_bits: u32, truncated_input: bool) -> Self {
        let bit_growth = ceil_log2(gain);
        let pre_shift = bit_growth.saturating_sub(extra_bits + GUARD_BITS);
        let post_shift = CORRECTION_BITS + bit_growth - extra_bits - pre_shift;

        let numerator = 1u64 << (CORRECTION_BITS + bit_growth);
        let correction = ((numerator + gain / 2) / gain) as i64;

        let mut bias = 1i64 << (post_shift - 1);
        if pre_shift > 0 {
            bias += correction / 2;
        }
        if truncated_input {
            // 0.5 LSB at the input is 2^(extra_bits - 1) LSB at the output
            bias += 1i64 << (post_shift + extra_bits - 1);
        }

        Self {
            bit_growth,
            pre_shift,
            correction,
            bias,
            post_shift,
        }
    }

    /// Scaling for an order-`order`, rate-`rate` decimator
    #[must_use]
    pub const fn decimator(order: usize, rate: usize, extra_bits: u32, truncated_input: bool) -> Self {
        Self::new(rate_power(order, rate), extra_bits, truncated_input)
    }

    /// Scaling for an order-`order`, rate-`rate` interpolator
    #[must_use]
    pub const fn interpolator(order: usize, rate: usize) -> Self {
        Self::new(rate_power(order.saturating_sub(1), rate), 0, false)
    }

    /// Bits of growth through the filter
    #[must_use]
    pub const fn bit_growth(&self) -> u32 {
        self.bit_growth
    }

    /// Total bias added before the final shift, in output LSBs
    #[must_use]
    pub fn bias_lsb(&self) -> f32 {
        self.bias as f32 / (1u64 << self.post_shift) as f32
    }

    /// Apply the scaling to a raw filter output
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn apply(&self, raw: i32) -> i32 {
        let scaled = ((raw >> self.pre_shift) as i64) * self.correction + self.bias;
        (scaled >> self.post_shift) as i32
    }
}

/// CIC decimator of order `N`
#[derive(Clone, Debug)]
pub struct CicDecimator<const N: usize> {
    integrators: [i32; N],
    combs: [i32; N],
    rate: usize,
    phase: usize,
    scaling: CicScaling,
}

impl<const N: usize> CicDecimator<N> {
    /// Create a decimator by `rate`, keeping `extra_bits` beyond the input
    /// resolution at the output
    #[must_use]
    pub const fn new(rate: usize, extra_bits: u32, truncated_input: bool) -> Self {
        Self::with_scaling(rate, CicScaling::decimator(N, rate, extra_bits, truncated_input))
    }

    /// Create a decimator by `rate` with precomputed output scaling
    #[must_use]
    pub const fn with_scaling(rate: usize, scaling: CicScaling) -> Self {
        Self {
            integrators: [0; N],
            combs: [0; N],
            rate,
            phase: 0,
            scaling,
        }
    }

    /// Feed one input sample, returning a scaled output every `rate` inputs
    pub fn process(&mut self, input: i32) -> Option<i32> {
        let mut acc = input;
        for state in &mut self.integrators {
            *state = state.wrapping_add(acc);
            acc = *state;
        }

        self.phase += 1;
        if self.phase < self.rate {
            return None;
        }
        self.phase = 0;

        for delayed in &mut self.combs {
            let previous = *delayed;
            *delayed = acc;
            acc = acc.wrapping_sub(previous);
        }

        Some(self.scaling.apply(acc))
    }

    /// Output scaling in use
    #[must_use]
    pub const fn scaling(&self) -> &CicScaling {
        &self.scaling
    }

    /// Reset filter state
    pub fn reset(&mut self) {
        self.integrators = [0; N];
        self.combs = [0; N];
        self.phase = 0;
    }
}

/// CIC interpolator of order `N`
#[derive(Clone, Debug)]
pub struct CicInterpolator<const N: usize> {
    combs: [i32; N],
    integrators: [i32; N],
    rate: usize,
    scaling: CicScaling,
}

impl<const N: usize> CicInterpolator<N> {
    /// Create an interpolator by `rate` with unity DC gain
    #[must_use]
    pub const fn new(rate: usize) -> Self {
        Self::with_scaling(rate, CicScaling::interpolator(N, rate))
    }

    /// Create an interpolator by `rate` with precomputed output scaling
    #[must_use]
    pub const fn with_scaling(rate: usize, scaling: CicScaling) -> Self {
        Self {
            combs: [0; N],
            integrators: [0; N],
            rate,
            scaling,
        }
    }

    /// Feed one low-rate sample, writing `rate` high-rate samples to `output`
    ///
    /// Only the first `rate` entries of `output` are written.
    pub fn process(&mut self, input: i32, output: &mut [i32]) {
        let mut acc = input;
        for delayed in &mut self.combs {
            let previous = *delayed;
            *delayed = acc;
            acc = acc.wrapping_sub(previous);
        }

        for (k, out) in output.iter_mut().take(self.rate).enumerate() {
            let mut value = if k == 0 { acc } else { 0 };
            for state in &mut self.integrators {
                *state = state.wrapping_add(value);
                value = *state;
            }
            *out = self.scaling.apply(value);
        }
    }

    /// Interpolation factor
    #[must_use]
    pub const fn rate(&self) -> usize {
        self.rate
    }

    /// Reset filter state
    pub fn reset(&mut self) {
        self.combs = [0; N];
        self.integrators = [0; N];
    }
}
