//! Conditional logging macros gated on a module-level `ENABLE_LOGS` flag.
//!
//! Chatty modules (the capture loop logs every skipped tick) define the flag
//! once and route everything through these, so a whole module's noise can be
//! silenced with one const flip:
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_info, log_warn, log_error};
//!
//! log_info!("tick accepted {} product(s)", 2);
//! ```

/// Info-level logging, active only when the calling module sets
/// `const ENABLE_LOGS: bool = true`.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Warn-level counterpart of [`log_info!`]; same `ENABLE_LOGS` gate.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Error-level counterpart of [`log_info!`]; same `ENABLE_LOGS` gate.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
