//! Logging macros gated by a module-level `ENABLE_LOGS` flag.
//!
//! Diary modules that talk to storage log every load and save; a module can
//! silence itself without touching the global `RUST_LOG` filter:
//! ```rust,ignore
//! const ENABLE_LOGS: bool = false;
//!
//! use crate::{log_info, log_warn};
//!
//! log_info!("loaded {} BP entries", entries.len());
//! ```

/// Info-level log line, emitted only when the calling module's
/// `ENABLE_LOGS` is `true`.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Debug-level variant. Health values are only ever logged through this one.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
