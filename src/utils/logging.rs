//! Logging macros that can be silenced per module.
//!
//! The timer drivers fire every second; each driver module declares
//! `const ENABLE_LOGS: bool` so its chatter can be switched off without
//! touching `RUST_LOG`:
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//! use crate::{log_debug, log_warn};
//!
//! log_warn!("reconciliation fetch failed: {err}");
//! ```
//!
//! Records carry the calling module as their target, so `RUST_LOG` filters
//! such as `goaltimer_lib::sync=debug` still apply. Arguments are only
//! formatted when the module switch is on and the level is enabled.

#[macro_export]
macro_rules! log_gated {
    ($level:expr, $($arg:tt)*) => {{
        let level: log::Level = $level;
        if ENABLE_LOGS && log::log_enabled!(target: module_path!(), level) {
            log::log!(target: module_path!(), level, $($arg)*);
        }
    }};
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => { $crate::log_gated!(log::Level::Debug, $($arg)*) };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { $crate::log_gated!(log::Level::Info, $($arg)*) };
}

/// Warnings are where clamped or orphaned sessions surface.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { $crate::log_gated!(log::Level::Warn, $($arg)*) };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => { $crate::log_gated!(log::Level::Error, $($arg)*) };
}
