//! Hardware Abstraction Layer
//!
//! RP2040 adapters behind the receiver's `Frontend` and `AudioSink` traits
//! and the store's `StorageRegion`. Register-level DMA setup lives here,
//! so this is the one module allowed `unsafe`.

#![allow(unsafe_code)]

pub mod adc;
pub mod flash;
pub mod lo;
pub mod pwm;

pub use adc::AdcFrontend;
pub use flash::FlashRegion;
pub use lo::LocalOscillator;
pub use pwm::PwmAudioSink;
