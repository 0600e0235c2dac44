//! Demodulator Tests
//!
//! Tests for the AM, SSB, FM and CW detectors at the baseband rate.
//! Run with: cargo test --features std --test modulation_tests

use std::f32::consts::PI;

use picorx::config::BASEBAND_SAMPLE_RATE;
use picorx::dsp::demod::{
    AmDemodulator, CwDemodulator, Demodulate, DemodulatorBank, FmDemodulator, HilbertTransform, IqSample,
    SsbDemodulator, HILBERT_DELAY,
};
use picorx::types::Mode;

const FS: f32 = BASEBAND_SAMPLE_RATE as f32;

/// Complex tone at `freq` Hz (negative for below the carrier)
fn tone(freq: f32, amplitude: f32, n: usize) -> IqSample {
    let phase = 2.0 * PI * freq * n as f32 / FS;
    IqSample::new(amplitude * phase.cos(), amplitude * phase.sin())
}

/// Peak absolute output over `measure` after `settle` samples
fn peak_output(demod: &mut impl Demodulate, settle: usize, measure: usize, input: impl Fn(usize) -> IqSample) -> f32 {
    let mut peak = 0.0f32;
    for n in 0..settle + measure {
        let y = demod.demodulate(input(n));
        if n >= settle {
            peak = peak.max(y.abs());
        }
    }
    peak
}

fn zero_crossings(samples: &[f32]) -> usize {
    samples.windows(2).filter(|w| (w[0] < 0.0) != (w[1] < 0.0)).count()
}

// =============================================================================
// IQ Sample Tests
// =============================================================================

#[test]
fn test_iq_magnitude() {
    assert!((IqSample::new(3.0, 4.0).magnitude() - 5.0).abs() < 1e-4);
    assert!((IqSample::new(3.0, 4.0).magnitude_squared() - 25.0).abs() < 1e-4);
}

#[test]
fn test_iq_complex_ops() {
    let a = IqSample::new(1.0, 2.0);
    let b = IqSample::new(3.0, -1.0);
    assert_eq!(a.multiply(b), IqSample::new(5.0, 5.0));
    assert_eq!(a.conjugate(), IqSample::new(1.0, -2.0));
    assert_eq!(a.swapped(), IqSample::new(2.0, 1.0));
    assert_eq!(a.scale(2.0), IqSample::new(2.0, 4.0));
}

// =============================================================================
// Hilbert Transform Tests
// =============================================================================

#[test]
fn test_hilbert_turns_cosine_into_delayed_sine() {
    let mut hilbert = HilbertTransform::new();
    let w = 2.0 * PI * 1500.0 / FS;
    let mut worst = 0.0f32;
    for n in 0..600 {
        let y = hilbert.process((w * n as f32).cos());
        if n >= 200 {
            let expected = (w * (n - HILBERT_DELAY) as f32).sin();
            worst = worst.max((y - expected).abs());
        }
    }
    assert!(worst < 0.05, "hilbert error {worst}");
}

// =============================================================================
// AM Tests
// =============================================================================

#[test]
fn test_am_recovers_modulation() {
    let mut am = AmDemodulator::default();
    let peak = peak_output(&mut am, 3000, 1000, |n| {
        let envelope = 1.0 + 0.5 * (2.0 * PI * 1000.0 * n as f32 / FS).cos();
        IqSample::new(envelope * 0.6, envelope * 0.8)
    });
    assert!((peak - 0.5).abs() < 0.05, "am peak {peak}");
}

#[test]
fn test_am_blocks_carrier() {
    let mut am = AmDemodulator::default();
    let peak = peak_output(&mut am, 4000, 500, |n| tone(300.0, 0.8, n));
    assert!(peak < 0.01, "carrier leak {peak}");
}

// =============================================================================
// SSB Tests
// =============================================================================

#[test]
fn test_usb_passes_upper_and_rejects_lower() {
    let mut usb = SsbDemodulator::new(true);
    let wanted = peak_output(&mut usb, 500, 1000, |n| tone(1500.0, 0.5, n));
    usb.reset();
    let unwanted = peak_output(&mut usb, 500, 1000, |n| tone(-1500.0, 0.5, n));

    assert!((wanted - 0.5).abs() < 0.05, "usb wanted {wanted}");
    assert!(unwanted < 0.1 * wanted, "usb opposite sideband {unwanted}");
}

#[test]
fn test_lsb_passes_lower_and_rejects_upper() {
    let mut lsb = SsbDemodulator::new(false);
    let wanted = peak_output(&mut lsb, 500, 1000, |n| tone(-1500.0, 0.5, n));
    lsb.reset();
    let unwanted = peak_output(&mut lsb, 500, 1000, |n| tone(1500.0, 0.5, n));

    assert!((wanted - 0.5).abs() < 0.05, "lsb wanted {wanted}");
    assert!(unwanted < 0.1 * wanted, "lsb opposite sideband {unwanted}");
}

// =============================================================================
// FM Tests
// =============================================================================

#[test]
fn test_fm_recovers_deviation() {
    let mut fm = FmDemodulator::new(FS);
    let deviation = 2500.0;
    let fm_hz = 500.0;
    let peak = peak_output(&mut fm, 4000, 2000, |n| {
        let t = n as f32 / FS;
        let phase = 2.0 * PI * (deviation / fm_hz) * (2.0 * PI * fm_hz * t).sin() / (2.0 * PI);
        IqSample::new(phase.cos(), phase.sin())
    });
    assert!((peak - 0.5).abs() < 0.1, "fm peak {peak}");
}

#[test]
fn test_fm_carrier_is_silent() {
    let mut fm = FmDemodulator::new(FS);
    let peak = peak_output(&mut fm, 4000, 500, |_| IqSample::new(0.7, 0.7));
    assert!(peak < 0.01, "fm carrier {peak}");
}

// =============================================================================
// CW Tests
// =============================================================================

#[test]
fn test_cw_zero_beat_sounds_at_sidetone() {
    let mut cw = CwDemodulator::new(FS, 700.0);
    let out: Vec<f32> = (0..15_625)
        .map(|_| cw.demodulate(IqSample::new(0.5, 0.0)))
        .collect();
    let crossings = zero_crossings(&out);
    assert!((1395..=1405).contains(&crossings), "crossings {crossings}");
    let peak = out.iter().fold(0.0f32, |m, &y| m.max(y.abs()));
    assert!((peak - 0.5).abs() < 0.01);
}

#[test]
fn test_cw_sidetone_change() {
    let mut cw = CwDemodulator::new(FS, 700.0);
    cw.set_sidetone(1000.0);
    assert!((cw.sidetone() - 1000.0).abs() < f32::EPSILON);
    let out: Vec<f32> = (0..15_625)
        .map(|_| cw.demodulate(IqSample::new(0.5, 0.0)))
        .collect();
    let crossings = zero_crossings(&out);
    assert!((1995..=2005).contains(&crossings), "crossings {crossings}");
}

// =============================================================================
// Demodulator Bank Tests
// =============================================================================

#[test]
fn test_bank_follows_mode() {
    let mut bank = DemodulatorBank::new(FS, Mode::Am, 700.0);
    assert_eq!(bank.mode(), Mode::Am);
    for mode in Mode::ALL {
        bank.set_mode(mode);
        assert_eq!(bank.mode(), mode);
    }
}

#[test]
fn test_bank_sideband_selection() {
    let mut bank = DemodulatorBank::new(FS, Mode::Lsb, 700.0);
    let mut peak = 0.0f32;
    for n in 0..1500 {
        let y = bank.process(tone(1500.0, 0.5, n));
        if n >= 500 {
            peak = peak.max(y.abs());
        }
    }
    assert!(peak < 0.05, "lsb passed an upper tone: {peak}");

    bank.set_mode(Mode::Usb);
    peak = 0.0;
    for n in 0..1500 {
        let y = bank.process(tone(1500.0, 0.5, n));
        if n >= 500 {
            peak = peak.max(y.abs());
        }
    }
    assert!(peak > 0.45, "usb lost an upper tone: {peak}");
}
