//! PicoRX Receiver Firmware Library
//!
//! This library provides the core functionality for an RP2040-based
//! direct-sampling SDR receiver. The ADC samples a mixed-down IF at
//! 500 kHz; everything after that is software.
//!
//! # Architecture
//!
//! The firmware is split across the two cores:
//!
//! ```text
//! ┌──────────────────────────────┐        ┌──────────────────────────────┐
//! │           CORE 0             │        │           CORE 1             │
//! │  Controller  │  USB upload   │        │  Receiver pipeline           │
//! │  autosave    │  channels     │        │  ADC → CIC → HBF → demod     │
//! ├──────────────────────────────┤        │  → AGC → notch → PWM audio   │
//! │  Flash store (FlashSession)  │        │                              │
//! └──────────────┬───────────────┘        └──────────────┬───────────────┘
//!                │        settings / status / spectrum   │
//!                └──────────────► Exchange ◄─────────────┘
//!                          suspend/park rendezvous
//! ```
//!
//! # Design Principles
//!
//! - **Type-driven design**: Custom types enforce invariants at compile time
//! - **No unsafe in application code**: All unsafe isolated in the HAL layer
//! - **Functional core, imperative shell**: The DSP chain, store and protocol
//!   are hardware independent and tested on the host
//! - **Explicit error handling**: All fallible operations return `Result`

#![cfg_attr(feature = "embedded", no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export dependencies needed by applications (only in embedded mode)
#[cfg(feature = "embedded")]
pub use embassy_executor;
#[cfg(feature = "embedded")]
pub use embassy_rp;
pub use embassy_sync;
pub use embassy_time;
#[cfg(feature = "embedded")]
pub use embassy_usb;

mod log;

/// Hardware Abstraction Layer
///
/// RP2040 sampler, audio PWM, local oscillator and flash.
#[cfg(feature = "embedded")]
pub mod hal;

/// Digital Signal Processing
///
/// Decimation, filters, demodulators, AGC and spectrum.
pub mod dsp;

/// Radio Control Logic
///
/// Settings, status, the cross-core exchange, receiver and controller.
pub mod radio;

/// Persistent Store
///
/// Autosave log and channel table in flash.
pub mod storage;

/// Power Readings
///
/// Battery voltage and die temperature.
pub mod power;

/// USB Subsystem
///
/// CDC ACM serial port for memory upload.
#[cfg(feature = "embedded")]
pub mod usb;

/// Communication Protocols
///
/// Line-oriented memory upload.
pub mod protocol;

/// Shared types used across modules
pub mod types;

/// System configuration and constants
pub mod config;

/// Prelude module for common imports
pub mod prelude {
    //! Convenient re-exports for common types and traits.

    pub use crate::config::*;
    pub use crate::types::*;

    pub use crate::radio::{Command, Controller, Exchange, Receiver, Settings, Status};
    pub use crate::storage::{StorageError, StorageRegion};

    // Embassy
    pub use embassy_time::{Duration, Instant, Timer};

    // Error handling
    pub use core::result::Result;

    // Logging
    #[cfg(feature = "embedded")]
    pub use defmt::{debug, error, info, trace, warn};
}
