//! Digital Signal Processing
//!
//! The fixed receiver chain, leaf to root:
//! - CIC decimation and interpolation
//! - Half-band decimation and Butterworth bandwidth filters
//! - Demodulators for AM, SSB, FM and CW
//! - AGC, signal strength, squelch and the automatic notch
//! - 128-bin spectrum estimate

pub mod agc;
pub mod cic;
pub mod demod;
pub mod filter;
pub mod notch;
pub mod oscillator;
pub mod spectrum;
