//! Structured logging, configured the way each binary's `main` configures it: a small
//! `serdeconv`-parsed `sloggers` config, built once at startup and cloned (cheap - `slog::Logger`
//! is an `Arc` under the hood) into every thread and subsystem that needs to log.

pub use slog::{debug, error, info, o, trace, warn, Discard, Logger};

use serde_derive::{Deserialize, Serialize};
use sloggers::terminal::{Destination, TerminalLoggerBuilder};
use sloggers::types::Severity;
use sloggers::Build;

/// On-disk configuration for a component's logger. Deserialized from the same JSON config file
/// as the rest of that component's settings.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
}

impl From<LogLevel> for Severity {
    fn from(level: LogLevel) -> Severity {
        match level {
            LogLevel::Trace => Severity::Trace,
            LogLevel::Debug => Severity::Debug,
            LogLevel::Info => Severity::Info,
            LogLevel::Warning => Severity::Warning,
            LogLevel::Error => Severity::Error,
        }
    }
}

/// Builds the root logger for a component. `component` is attached as a permanent key-value pair
/// on every record, so multiple components' logs can be interleaved in one terminal/file and
/// still be told apart.
pub fn init(component: &'static str, level: LogLevel) -> Logger {
    let mut builder = TerminalLoggerBuilder::new();
    builder.level(level.into());
    builder.destination(Destination::Stderr);

    let drain = builder.build().expect("failed to build terminal logger");

    Logger::root(drain, o!("component" => component))
}

/// A logger that discards everything. Used in tests and in constructors that accept an
/// `Into<Option<&Logger>>` convenience parameter.
pub fn discard() -> Logger {
    Logger::root(Discard, o!())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discard_logger_does_not_panic() {
        let log = discard();
        info!(log, "test message"; "field" => 1);
    }
}
