//! Oscillator Tests
//!
//! Tests for the Q15 sine table, the frequency shift NCO and the rotating
//! quadrature oscillator.
//! Run with: cargo test --features std --test oscillator_tests

use picorx::config::{ADC_SAMPLE_RATE, BASEBAND_SAMPLE_RATE, IF_OFFSET_HZ};
use picorx::dsp::oscillator::{Nco, QuadratureOscillator, SineTable, TABLE_LEN};

// =============================================================================
// Sine Table Tests
// =============================================================================

#[test]
fn test_table_quadrature_points() {
    let table = SineTable::new();
    assert_eq!(table.lookup(0), (32767, 0));
    assert_eq!(table.lookup(0x4000_0000), (0, 32767));
    assert_eq!(table.lookup(0x8000_0000), (-32767, 0));
    assert_eq!(table.lookup(0xC000_0000), (0, -32767));
}

#[test]
fn test_table_unit_magnitude() {
    let table = SineTable::new();
    for step in 0..TABLE_LEN as u32 {
        let (c, s) = table.lookup(step << 22);
        let magnitude = (f64::from(c).powi(2) + f64::from(s).powi(2)).sqrt();
        assert!((magnitude - 32767.0).abs() < 2.0, "index {step}: {magnitude}");
    }
}

// =============================================================================
// NCO Tests
// =============================================================================

#[test]
fn test_quarter_rate_shift_sequence() {
    let mut nco = Nco::new(IF_OFFSET_HZ, ADC_SAMPLE_RATE);
    assert_eq!(nco.phase_increment(), 0x4000_0000);
    let expected = [(32767, 0), (0, 32767), (-32767, 0), (0, -32767)];
    for _ in 0..3 {
        for &pair in &expected {
            assert_eq!(nco.next_q15(), pair);
        }
    }
}

#[test]
fn test_nco_phase_increment() {
    let nco = Nco::new(1000, 500_000);
    assert_eq!(nco.phase_increment(), 8_589_934);
}

#[test]
fn test_nco_retune_and_reset() {
    let mut nco = Nco::new(IF_OFFSET_HZ, ADC_SAMPLE_RATE);
    nco.next_q15();
    nco.next_q15();
    nco.reset();
    assert_eq!(nco.next_q15(), (32767, 0));

    nco.set_frequency(ADC_SAMPLE_RATE / 2, ADC_SAMPLE_RATE);
    assert_eq!(nco.phase_increment(), 0x8000_0000);
}

#[test]
fn test_nco_zero_rate_is_safe() {
    let nco = Nco::new(1000, 0);
    assert_eq!(nco.phase_increment(), (1000u64 << 32) as u32);
}

// =============================================================================
// Quadrature Oscillator Tests
// =============================================================================

#[test]
fn test_quadrature_starts_at_zero_phase() {
    let mut osc = QuadratureOscillator::new();
    osc.set_frequency(700.0, BASEBAND_SAMPLE_RATE as f32);
    let (c, s) = osc.next();
    assert!((c - 1.0).abs() < f32::EPSILON);
    assert!(s.abs() < f32::EPSILON);
}

#[test]
fn test_quadrature_amplitude_stable() {
    let mut osc = QuadratureOscillator::new();
    osc.set_frequency(1234.5, BASEBAND_SAMPLE_RATE as f32);
    for _ in 0..200_000 {
        let (c, s) = osc.next();
        assert!((c * c + s * s - 1.0).abs() < 1e-3);
    }
}

#[test]
fn test_quadrature_frequency() {
    let fs = BASEBAND_SAMPLE_RATE as f32;
    let mut osc = QuadratureOscillator::new();
    osc.set_frequency(500.0, fs);
    let samples: Vec<f32> = (0..BASEBAND_SAMPLE_RATE).map(|_| osc.next().1).collect();
    let rising = samples.windows(2).filter(|w| w[0] < 0.0 && w[1] >= 0.0).count();
    assert!((499..=501).contains(&rising), "{rising}");
}

#[test]
fn test_quadrature_sine_leads_cosine() {
    let mut osc = QuadratureOscillator::new();
    osc.set_frequency(BASEBAND_SAMPLE_RATE as f32 / 4.0, BASEBAND_SAMPLE_RATE as f32);
    osc.next();
    let (c, s) = osc.next();
    assert!(c.abs() < 1e-3);
    assert!((s - 1.0).abs() < 1e-3);
    osc.reset();
    assert!((osc.next().0 - 1.0).abs() < f32::EPSILON);
}
