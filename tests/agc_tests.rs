//! AGC Module Tests
//!
//! Tests for automatic gain control, signal strength and squelch.
//! Run with: cargo test --features std --test agc_tests

use picorx::config::calibration::{FULL_SCALE_DBM, FULL_SCALE_SIGNAL_STRENGTH, S9_DBM};
use picorx::config::BASEBAND_SAMPLE_RATE;
use picorx::dsp::agc::{magnitude_to_dbm, Agc, AgcConfig, SignalStrength, Squelch};
use picorx::dsp::demod::IqSample;
use picorx::types::{AgcSpeed, SUnit};

fn normal_agc() -> Agc {
    Agc::new(AgcConfig::for_speed(AgcSpeed::Normal, BASEBAND_SAMPLE_RATE))
}

fn run(agc: &mut Agc, level: f32, samples: usize) -> f32 {
    let mut out = 0.0;
    for _ in 0..samples {
        out = agc.process(IqSample::new(level, 0.0)).magnitude();
    }
    out
}

/// Smoothed magnitude that reads `dbm` at `gain_cal`
fn magnitude_for(dbm: f32, gain_cal: u8) -> f32 {
    FULL_SCALE_SIGNAL_STRENGTH * 10f32.powf((dbm - FULL_SCALE_DBM + f32::from(gain_cal)) / 20.0)
}

// =============================================================================
// AGC Configuration Tests
// =============================================================================

#[test]
fn test_config_for_speed() {
    let config = AgcConfig::for_speed(AgcSpeed::Normal, 15_625);
    assert!((config.attack_samples - 31.25).abs() < 1e-3);
    assert!((config.decay_samples - 6250.0).abs() < 1e-2);
    assert_eq!(config.hang_samples, 1562);
}

#[test]
fn test_fast_preset_has_no_hang() {
    let config = AgcConfig::for_speed(AgcSpeed::Fast, 15_625);
    assert_eq!(config.hang_samples, 0);
}

#[test]
fn test_presets_slow_down() {
    let decays: Vec<f32> = AgcSpeed::ALL
        .iter()
        .map(|&s| AgcConfig::for_speed(s, 15_625).decay_samples)
        .collect();
    assert!(decays.windows(2).all(|w| w[0] < w[1]));
}

// =============================================================================
// AGC Processing Tests
// =============================================================================

#[test]
fn test_agc_starts_at_unity() {
    let agc = normal_agc();
    assert!(agc.gain_db().abs() < 1e-6);
}

#[test]
fn test_agc_boosts_weak_signals() {
    let mut agc = normal_agc();
    let out = run(&mut agc, 0.01, 60_000);
    assert!((out - 0.5).abs() < 0.05, "weak signal levelled to {out}");
}

#[test]
fn test_agc_attenuates_strong_signals_quickly() {
    let mut agc = normal_agc();
    let out = run(&mut agc, 5.0, 1_000);
    assert!((out - 0.5).abs() < 0.05, "strong signal levelled to {out}");
    assert!(agc.gain_db() < -19.0);
}

#[test]
fn test_agc_gain_limited() {
    let mut agc = normal_agc();
    run(&mut agc, 0.0, 200_000);
    assert!(agc.gain_db() <= 80.0 + 1e-3, "{}", agc.gain_db());

    let mut agc = normal_agc();
    run(&mut agc, 1_000.0, 2_000);
    assert!(agc.gain_db() >= -20.0 - 1e-3, "{}", agc.gain_db());
}

#[test]
fn test_agc_hangs_before_decay() {
    let mut agc = normal_agc();
    run(&mut agc, 1.0, 2_000);
    let held = agc.gain_db();
    assert!((held + 6.02).abs() < 0.1, "{held}");

    let hang = AgcConfig::for_speed(AgcSpeed::Normal, BASEBAND_SAMPLE_RATE).hang_samples as usize;
    run(&mut agc, 0.1, hang - 10);
    assert!((agc.gain_db() - held).abs() < 1e-3, "gain moved during hang");

    run(&mut agc, 0.1, 40_000);
    assert!(agc.gain_db() > held + 15.0, "gain did not recover: {}", agc.gain_db());
}

#[test]
fn test_agc_reset() {
    let mut agc = normal_agc();
    run(&mut agc, 5.0, 500);
    agc.reset();
    assert!(agc.gain_db().abs() < 1e-6);
    assert!(agc.envelope().abs() < f32::EPSILON);
}

#[test]
fn test_agc_set_config_keeps_gain() {
    let mut agc = normal_agc();
    run(&mut agc, 5.0, 1_000);
    let before = agc.gain_db();
    agc.set_config(AgcConfig::for_speed(AgcSpeed::Slow, BASEBAND_SAMPLE_RATE));
    assert!((agc.gain_db() - before).abs() < f32::EPSILON);
    assert_eq!(agc.config().hang_samples, 3906);
}

// =============================================================================
// Signal Strength Tests
// =============================================================================

#[test]
fn test_dbm_scale() {
    assert!((magnitude_to_dbm(FULL_SCALE_SIGNAL_STRENGTH, 0) - FULL_SCALE_DBM).abs() < 1e-3);
    let ten_times = magnitude_to_dbm(FULL_SCALE_SIGNAL_STRENGTH / 10.0, 0);
    assert!((ten_times - (FULL_SCALE_DBM - 20.0)).abs() < 1e-3);
    let calibrated = magnitude_to_dbm(FULL_SCALE_SIGNAL_STRENGTH, 62);
    assert!((calibrated - (FULL_SCALE_DBM - 62.0)).abs() < 1e-3);
}

#[test]
fn test_s_meter_s9() {
    let mut strength = SignalStrength::new();
    strength.update(magnitude_for(S9_DBM, 62) * 1.01);
    assert_eq!(strength.s_unit(62), SUnit::S9);
}

#[test]
fn test_s_meter_s9_plus_10() {
    let mut strength = SignalStrength::new();
    strength.update(magnitude_for(S9_DBM + 10.0, 62) * 1.01);
    assert_eq!(strength.s_unit(62).level(), 10);
}

#[test]
fn test_s_meter_floor() {
    let mut strength = SignalStrength::new();
    strength.update(0.0);
    assert_eq!(strength.s_unit(62).level(), 0);
    assert!(strength.dbm(62) < -170.0);
}

#[test]
fn test_strength_smoothing() {
    let mut strength = SignalStrength::new();
    strength.update(1000.0);
    for _ in 0..50 {
        strength.update(100.0);
    }
    assert!((strength.magnitude() - 100.0).abs() < 0.1);
    strength.reset();
    assert!(strength.magnitude().abs() < f32::EPSILON);
}

// =============================================================================
// Squelch Tests
// =============================================================================

#[test]
fn test_squelch_zero_never_mutes() {
    let mut squelch = Squelch::new();
    assert!(squelch.update(SUnit::new(0).unwrap(), SUnit::new(0).unwrap()));
}

#[test]
fn test_squelch_threshold() {
    let mut squelch = Squelch::new();
    let threshold = SUnit::new(5).unwrap();
    assert!(!squelch.update(SUnit::new(4).unwrap(), threshold));
    assert!(!squelch.is_open());
    assert!(squelch.update(SUnit::new(5).unwrap(), threshold));
    assert!(squelch.update(SUnit::S9, threshold));
}
