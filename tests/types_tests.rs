//! Shared Types Tests
//!
//! Tests for frequencies, enumerated settings and the S-meter scale.
//! Run with: cargo test --features std --test types_tests

use picorx::config::calibration::{S0_DBM, S9_DBM, S9_10_DBM};
use picorx::types::{AgcSpeed, Bandwidth, Frequency, Mode, SUnit, TuningStep};

// =============================================================================
// Frequency Tests
// =============================================================================

#[test]
fn test_frequency_range() {
    assert_eq!(Frequency::from_hz(0).map(Frequency::as_hz), Some(0));
    assert_eq!(Frequency::from_hz(30_000_000).map(Frequency::as_hz), Some(30_000_000));
    assert!(Frequency::from_hz(30_000_001).is_none());
}

#[test]
fn test_frequency_saturating() {
    assert_eq!(Frequency::saturating_from_hz(u32::MAX), Frequency::MAX);
    assert_eq!(Frequency::saturating_from_hz(7_074_000).as_hz(), 7_074_000);
}

#[test]
fn test_frequency_from_khz() {
    assert_eq!(Frequency::from_khz(7_074).map(Frequency::as_hz), Some(7_074_000));
    assert!(Frequency::from_khz(u32::MAX).is_none());
    assert!(Frequency::from_khz(30_001).is_none());
}

#[test]
fn test_frequency_units() {
    let f = Frequency::from_hz(14_074_500).unwrap();
    assert_eq!(f.as_khz(), 14_074);
    assert!((f.as_mhz_f32() - 14.0745).abs() < 1e-4);
}

#[test]
fn test_lo_sits_below_tuned_frequency() {
    let f = Frequency::from_hz(1_215_000).unwrap();
    assert_eq!(f.lo_hz(), 1_090_000);
}

#[test]
fn test_lo_never_negative() {
    assert_eq!(Frequency::from_hz(100_000).unwrap().lo_hz(), 0);
}

// =============================================================================
// Enumerated Setting Tests
// =============================================================================

#[test]
fn test_tuning_step_indices_round_trip() {
    for (i, step) in TuningStep::ALL.iter().enumerate() {
        assert_eq!(step.index() as usize, i);
        assert_eq!(TuningStep::from_index(step.index()), Some(*step));
    }
    assert_eq!(TuningStep::from_index(10), None);
}

#[test]
fn test_tuning_step_sizes() {
    assert_eq!(TuningStep::Hz10.as_hz(), 10);
    assert_eq!(TuningStep::KHz12_5.as_hz(), 12_500);
    assert_eq!(TuningStep::KHz100.as_hz(), 100_000);
    assert_eq!(TuningStep::KHz12_5.label(), "12.5kHz");
}

#[test]
fn test_tuning_steps_ascend() {
    assert!(TuningStep::ALL.windows(2).all(|w| w[0].as_hz() < w[1].as_hz()));
}

#[test]
fn test_mode_indices() {
    assert_eq!(Mode::Am.index(), 0);
    assert_eq!(Mode::Lsb.index(), 1);
    assert_eq!(Mode::Usb.index(), 2);
    assert_eq!(Mode::Fm.index(), 3);
    assert_eq!(Mode::Cw.index(), 4);
    assert_eq!(Mode::from_index(5), None);
}

#[test]
fn test_auto_notch_modes() {
    assert!(Mode::Am.supports_auto_notch());
    assert!(Mode::Usb.supports_auto_notch());
    assert!(Mode::Lsb.supports_auto_notch());
    assert!(!Mode::Fm.supports_auto_notch());
    assert!(!Mode::Cw.supports_auto_notch());
}

#[test]
fn test_agc_speed_fast_attack_slow_decay() {
    for speed in AgcSpeed::ALL {
        assert!(speed.attack_ms() < speed.decay_ms(), "{speed:?}");
    }
    assert!(AgcSpeed::Fast.decay_ms() < AgcSpeed::VerySlow.decay_ms());
}

#[test]
fn test_agc_speed_indices() {
    for speed in AgcSpeed::ALL {
        assert_eq!(AgcSpeed::from_index(speed.index()), Some(speed));
    }
    assert_eq!(AgcSpeed::from_index(4), None);
}

#[test]
fn test_bandwidth_cutoffs_widen() {
    for mode in Mode::ALL {
        let cutoffs: Vec<f32> = Bandwidth::ALL.iter().map(|b| b.cutoff_hz(mode)).collect();
        assert!(cutoffs.windows(2).all(|w| w[0] < w[1]), "{mode:?}");
    }
}

#[test]
fn test_bandwidth_cutoff_table() {
    assert!((Bandwidth::Normal.cutoff_hz(Mode::Am) - 4000.0).abs() < f32::EPSILON);
    assert!((Bandwidth::Normal.cutoff_hz(Mode::Usb) - 2500.0).abs() < f32::EPSILON);
    assert!((Bandwidth::VeryNarrow.cutoff_hz(Mode::Cw) - 100.0).abs() < f32::EPSILON);
}

// =============================================================================
// S-Meter Tests
// =============================================================================

#[test]
fn test_s_unit_bounds() {
    assert_eq!(SUnit::new(12), Some(SUnit::MAX));
    assert_eq!(SUnit::new(13), None);
    assert_eq!(SUnit::saturating(200), SUnit::MAX);
}

#[test]
fn test_s_unit_reference_levels() {
    assert_eq!(SUnit::from_dbm(S0_DBM).level(), 0);
    assert_eq!(SUnit::from_dbm(S9_DBM), SUnit::S9);
    assert_eq!(SUnit::from_dbm(S9_10_DBM).level(), 10);
}

#[test]
fn test_s_unit_six_db_per_unit_below_s9() {
    assert_eq!(SUnit::from_dbm(-121.0).level(), 1);
    assert_eq!(SUnit::from_dbm(-74.0).level(), 8);
    assert_eq!(SUnit::from_dbm(-97.0).level(), 5);
}

#[test]
fn test_s_unit_clamps() {
    assert_eq!(SUnit::from_dbm(-200.0).level(), 0);
    assert_eq!(SUnit::from_dbm(0.0), SUnit::MAX);
}

#[test]
fn test_s_unit_labels() {
    assert_eq!(SUnit::S9.label(), "S9");
    assert_eq!(SUnit::MAX.label(), "S9+30dB");
    assert_eq!(SUnit::new(10).unwrap().label(), "S9+10dB");
}
