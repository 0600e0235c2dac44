//! Automatic notch
//!
//! Adaptive line enhancer: a normalized LMS predictor looks at the audio
//! delayed past the correlation time of speech, so it can only learn the
//! periodic part of the signal. Subtracting the prediction removes steady
//! tones such as heterodynes while voice passes through.

/// Predictor taps
const TAPS: usize = 32;

/// Decorrelation delay in samples
const DELAY: usize = 8;

/// Ring length holding the reference window
const HISTORY: usize = TAPS + DELAY;

/// Normalized adaptation step
const DEFAULT_MU: f32 = 0.01;

/// Regularization added to the reference power
const EPSILON: f32 = 1e-6;

/// NLMS auto-notch
#[derive(Clone, Copy, Debug)]
pub struct AutoNotch {
    weights: [f32; TAPS],
    history: [f32; HISTORY],
    pos: usize,
    mu: f32,
}

impl AutoNotch {
    /// Create a notch with adaptation step `mu`
    #[must_use]
    pub fn new(mu: f32) -> Self {
        Self {
            weights: [0.0; TAPS],
            history: [0.0; HISTORY],
            pos: 0,
            mu: mu.clamp(0.0001, 0.5),
        }
    }

    /// Process one audio sample, returning it with tones removed
    pub fn process(&mut self, input: f32) -> f32 {
        let mut prediction = 0.0;
        let mut power = EPSILON;
        for (k, w) in self.weights.iter().enumerate() {
            let r = self.history[(self.pos + HISTORY - DELAY - k) % HISTORY];
            prediction += w * r;
            power += r * r;
        }

        let error = input - prediction;
        let step = self.mu * error / power;
        for (k, w) in self.weights.iter_mut().enumerate() {
            let r = self.history[(self.pos + HISTORY - DELAY - k) % HISTORY];
            *w = (*w + step * r).clamp(-1.0, 1.0);
        }

        self.history[self.pos] = input;
        self.pos = (self.pos + 1) % HISTORY;

        error
    }

    /// Forget the learned tone
    pub fn reset(&mut self) {
        self.weights = [0.0; TAPS];
        self.history = [0.0; HISTORY];
        self.pos = 0;
    }
}

impl Default for AutoNotch {
    fn default() -> Self {
        Self::new(DEFAULT_MU)
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use core::f32::consts::PI;

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn removes_steady_tone() {
        let mut notch = AutoNotch::default();
        let input: Vec<f32> = (0..8000)
            .map(|n| 0.5 * (2.0 * PI * 1000.0 * n as f32 / 15625.0).sin())
            .collect();
        let output: Vec<f32> = input.iter().map(|&x| notch.process(x)).collect();

        let tail = 7000..8000;
        assert!(
            rms(&output[tail.clone()]) < 0.1 * rms(&input[tail]),
            "tone not suppressed"
        );
    }

    #[test]
    fn silence_stays_silent() {
        let mut notch = AutoNotch::default();
        for _ in 0..100 {
            assert!(notch.process(0.0).abs() < f32::EPSILON);
        }
    }
}
