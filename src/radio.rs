//! Radio Control Logic
//!
//! The settings and status records, the cross-core exchange that carries
//! them, the receiver pipeline on the real-time core and the command
//! dispatcher on the control core.

pub mod control;
pub mod exchange;
pub mod receiver;
pub mod settings;
pub mod status;

pub use control::{Command, Controller, Response};
pub use exchange::{Access, Exchange, SuspendGuard};
pub use receiver::{AudioSink, Frontend, Housekeeping, Receiver};
pub use settings::{BandCheck, HardwareFlags, Settings, TuningRate};
pub use status::Status;
