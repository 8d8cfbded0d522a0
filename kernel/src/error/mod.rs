//! Fault reporting
//!
//! Recoverable failures travel as [`nos_api::Error`]. Programming errors
//! (an out-of-range PID, an unknown CPU id, freeing a live process) go
//! through [`bug_on!`], which logs and halts. [`warn_on!`] logs a suspicious
//! condition and hands it back to the call site.

pub use nos_api::{Error, KernelError, Result};

/// Halt on an invariant violation
///
/// Logs at `error` level, then panics with the same message.
#[macro_export]
macro_rules! bug_on {
    ($cond:expr, $($arg:tt)+) => {
        if $cond {
            $crate::log::error!("BUG: {}", format_args!($($arg)+));
            panic!("BUG: {}", format_args!($($arg)+));
        }
    };
}

/// Log a suspicious condition and evaluate to it
#[macro_export]
macro_rules! warn_on {
    ($cond:expr, $($arg:tt)+) => {{
        let cond: bool = $cond;
        if cond {
            $crate::log::warn!("WARNING: {}", format_args!($($arg)+));
        }
        cond
    }};
}
