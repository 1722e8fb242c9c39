//! Level-gated logging to stderr. Stdout is reserved for command output
//! (piped documents, new documents, `index --json`).
//!
//!   derive_level(-v count, -q)  ->  init_logging(level)
//!   log_error! / log_info! / log_debug! / log_trace!

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum LogLevel {
    Error = 0,
    Info = 1,
    Debug = 2,
    Trace = 3,
}

impl LogLevel {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Error,
            1 => LogLevel::Info,
            2 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Error => "error",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        })
    }
}

static LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

pub fn init_logging(level: LogLevel) {
    LEVEL.store(level as u8, Ordering::Relaxed);
}

/// `-q` wins over any number of `-v`.
pub fn derive_level(verbose: u8, quiet: bool) -> LogLevel {
    if quiet {
        return LogLevel::Error;
    }
    LogLevel::from_u8(verbose.saturating_add(1))
}

pub fn enabled(level: LogLevel) -> bool {
    level <= LogLevel::from_u8(LEVEL.load(Ordering::Relaxed))
}

/// Backend of the `log_*!` macros. Formatting is skipped for disabled levels.
pub fn log(level: LogLevel, args: fmt::Arguments<'_>) {
    if enabled(level) {
        eprintln!("shellpipe[{level}]: {args}");
    }
}

#[macro_export]
macro_rules! log_error {
    ($($t:tt)*) => { $crate::utils::log($crate::utils::LogLevel::Error, format_args!($($t)*)) };
}
#[macro_export]
macro_rules! log_info {
    ($($t:tt)*) => { $crate::utils::log($crate::utils::LogLevel::Info, format_args!($($t)*)) };
}
#[macro_export]
macro_rules! log_debug {
    ($($t:tt)*) => { $crate::utils::log($crate::utils::LogLevel::Debug, format_args!($($t)*)) };
}
#[macro_export]
macro_rules! log_trace {
    ($($t:tt)*) => { $crate::utils::log($crate::utils::LogLevel::Trace, format_args!($($t)*)) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_overrides_verbose() {
        assert_eq!(derive_level(3, true), LogLevel::Error);
    }

    #[test]
    fn verbosity_steps() {
        assert_eq!(derive_level(0, false), LogLevel::Info);
        assert_eq!(derive_level(1, false), LogLevel::Debug);
        assert_eq!(derive_level(5, false), LogLevel::Trace);
        assert_eq!(derive_level(u8::MAX, false), LogLevel::Trace);
    }

    #[test]
    fn levels_order_and_names() {
        assert!(LogLevel::Error < LogLevel::Info);
        assert!(LogLevel::Debug < LogLevel::Trace);
        assert_eq!(LogLevel::Debug.to_string(), "debug");
    }
}
