//! Logging macros
//!
//! Forward to `defmt` on the target. On the host they expand to nothing, so
//! the sample path and the tests carry no logger.

macro_rules! info {
    ($($arg:tt)*) => {{
        #[cfg(feature = "embedded")]
        ::defmt::info!($($arg)*);
    }};
}

macro_rules! log_warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "embedded")]
        ::defmt::warn!($($arg)*);
    }};
}

macro_rules! debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "embedded")]
        ::defmt::debug!($($arg)*);
    }};
}

pub(crate) use {debug, info};
pub(crate) use log_warn as warn;
