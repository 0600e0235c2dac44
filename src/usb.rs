//! USB Subsystem
//!
//! CDC ACM serial port used for the memory upload protocol.

pub mod cdc;

pub use cdc::{CdcState, CdcStream, UsbDeviceInfo, UsbStrings};
