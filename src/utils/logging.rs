//! Switchable logging macros for chatty modules (sensor listeners fire every
//! few milliseconds).
//!
//! A module opts in by declaring the flag and importing the macros, which are
//! exported at the crate root:
//! ```ignore
//! const ENABLE_LOGS: bool = false;
//!
//! use crate::{log_debug, log_warn};
//!
//! log_debug!("accelerometer sample {:?}", sample);
//! ```

/// Debug-level log gated on the caller's `ENABLE_LOGS` const.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

/// Info-level log gated on the caller's `ENABLE_LOGS` const.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Warn-level log gated on the caller's `ENABLE_LOGS` const.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}
