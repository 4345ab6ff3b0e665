//! Conditional logging macros gated by a module-level `ENABLE_LOGS` flag,
//! so the chatty loop workers can be silenced per module without touching
//! the global filter.
//!
//! Each module using these must define `const ENABLE_LOGS: bool` and import
//! the macros from the crate root.

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
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
