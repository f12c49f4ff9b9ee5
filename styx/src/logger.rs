//! Pluggable logging for the engines.
//!
//! The engines never log on their own account at anything above trace
//! level; a logger is injected so embedding applications decide where
//! protocol traces go.  [`NullLogger`] discards everything and is the
//! default.

use std::io::Write;
use std::sync::Arc;

/// Severity, in ascending order.
#[derive(Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Debug)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Error,
}

pub trait Logger {
    /// The lowest level this logger wants to see.
    fn level(&self) -> LogLevel;
    fn error(&self, msg: &str);
    fn info(&self, msg: &str);
    fn debug(&self, msg: &str);
    fn trace(&self, msg: &str);
}

impl<T: Logger> Logger for Arc<T> {
    fn level(&self) -> LogLevel {
        self.as_ref().level()
    }

    fn error(&self, msg: &str) {
        self.as_ref().error(msg);
    }

    fn info(&self, msg: &str) {
        self.as_ref().info(msg);
    }

    fn debug(&self, msg: &str) {
        self.as_ref().debug(msg);
    }

    fn trace(&self, msg: &str) {
        self.as_ref().trace(msg);
    }
}

/// Discards every message.
pub struct NullLogger;

impl Logger for NullLogger {
    fn level(&self) -> LogLevel {
        LogLevel::Error
    }

    fn error(&self, _msg: &str) {}
    fn info(&self, _msg: &str) {}
    fn debug(&self, _msg: &str) {}
    fn trace(&self, _msg: &str) {}
}

/// Writes one line per message to standard error.
pub struct StderrLogger {
    level: LogLevel,
}

impl StderrLogger {
    pub fn new(level: LogLevel) -> Self {
        Self { level }
    }

    fn write(&self, prefix: &str, msg: &str) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}: {}", prefix, msg);
    }
}

impl Logger for StderrLogger {
    fn level(&self) -> LogLevel {
        self.level
    }

    fn error(&self, msg: &str) {
        self.write("error", msg);
    }

    fn info(&self, msg: &str) {
        self.write("info", msg);
    }

    fn debug(&self, msg: &str) {
        self.write("debug", msg);
    }

    fn trace(&self, msg: &str) {
        self.write("trace", msg);
    }
}

#[macro_export]
macro_rules! trace {
    ($logger:expr, $($args : tt) *) => {
        {
            use $crate::logger::{Logger, LogLevel};
            if $logger.level() <= LogLevel::Trace {
                $logger.trace(&format!($($args)*));
            }
        }
    }
}

#[macro_export]
macro_rules! debug {
    ($logger:expr, $($args : tt) *) => {
        {
            use $crate::logger::{Logger, LogLevel};
            if $logger.level() <= LogLevel::Debug {
                $logger.debug(&format!($($args)*));
            }
        }
    }
}

#[macro_export]
macro_rules! error {
    ($logger:expr, $($args : tt) *) => {
        {
            use $crate::logger::{Logger, LogLevel};
            if $logger.level() <= LogLevel::Error {
                $logger.error(&format!($($args)*));
            }
        }
    }
}
