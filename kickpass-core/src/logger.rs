//! Forwarding of `log` records to a host logger.

use std::sync::{Arc, OnceLock};

/// Receives log records from the kickpass crates.
///
/// Register an implementation once with [`set_logger`].
///
/// ```rust
/// use kickpass_core::logger::{LogLevel, Logger};
///
/// struct Stderr;
///
/// impl Logger for Stderr {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("[{level:?}] {message}");
///     }
/// }
/// ```
#[uniffi::export(with_foreign)]
pub trait Logger: Sync + Send {
    /// Handles one record.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum LogLevel {
    /// Very detailed tracing.
    Trace,
    /// Debugging information.
    Debug,
    /// Normal progress, such as a safe being created or deleted.
    Info,
    /// Something unexpected that did not fail the operation.
    Warn,
    /// A failed operation.
    Error,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug => Self::Debug,
            log::Level::Trace => Self::Trace,
        }
    }
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Self::Error,
            LogLevel::Warn => Self::Warn,
            LogLevel::Info => Self::Info,
            LogLevel::Debug => Self::Debug,
            LogLevel::Trace => Self::Trace,
        }
    }
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

static FOREIGN_LOGGER: ForeignLogger = ForeignLogger;

struct ForeignLogger;

/// Debug and trace records from dependencies are noise for the host.
fn is_forwarded(metadata: &log::Metadata<'_>) -> bool {
    metadata.level() <= log::Level::Info || metadata.target().starts_with("kickpass")
}

impl log::Log for ForeignLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        is_forwarded(metadata)
    }

    fn log(&self, record: &log::Record<'_>) {
        if !is_forwarded(record.metadata()) {
            return;
        }
        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(record.level().into(), record.args().to_string());
        }
    }

    fn flush(&self) {}
}

/// Installs the host logger.
///
/// Only the first call installs a logger; later calls are ignored.
#[uniffi::export]
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        log::warn!("kickpass logger already set");
        return;
    }

    if let Err(err) = log::set_logger(&FOREIGN_LOGGER) {
        eprintln!("kickpass: cannot install logger: {err}");
        return;
    }
    log::set_max_level(log::LevelFilter::Debug);
}

/// Changes the most verbose level forwarded to the host logger.
#[uniffi::export]
pub fn set_log_level(level: LogLevel) {
    log::set_max_level(level.into());
}
