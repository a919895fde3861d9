//! Logging backend that routes engine logs to the host application
//!
//! The engine logs through the `log` facade. Hosts that have no logger of
//! their own can install this backend and attach a [`LogSink`]; without a
//! sink the records are dropped.

use std::sync::{Arc, OnceLock, RwLock};

use log::{Level, Log, Metadata, Record, SetLoggerError};

/// Receives formatted log records
pub trait LogSink: Send + Sync {
    fn on_log(&self, level: Level, target: &str, message: &str);
}

static BACKUP_LOGGER: OnceLock<BackupLogger> = OnceLock::new();

struct BackupLogger {
    sink: RwLock<Option<Arc<dyn LogSink>>>,
    max_level: RwLock<Level>,
}

impl BackupLogger {
    fn new(max_level: Level) -> Self {
        Self {
            sink: RwLock::new(None),
            max_level: RwLock::new(max_level),
        }
    }

    fn set_sink(&self, sink: Option<Arc<dyn LogSink>>) {
        if let Ok(mut guard) = self.sink.write() {
            *guard = sink;
        }
    }

    fn set_max_level(&self, level: Level) {
        if let Ok(mut guard) = self.max_level.write() {
            *guard = level;
        }
    }

    fn max_level(&self) -> Level {
        self.max_level.read().map(|l| *l).unwrap_or(Level::Info)
    }
}

impl Log for BackupLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level()
            && self.sink.read().ok().is_some_and(|sink| sink.is_some())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if let Ok(guard) = self.sink.read()
            && let Some(sink) = guard.as_ref()
        {
            let message = record.args().to_string();
            sink.on_log(record.level(), record.target(), &message);
        }
    }

    fn flush(&self) {}
}

/// Install the backend as the global logger
///
/// Fails if another logger (e.g. `env_logger`) is already installed.
pub fn init_backup_logger(max_level: Level) -> Result<(), SetLoggerError> {
    let logger = BACKUP_LOGGER.get_or_init(|| BackupLogger::new(max_level));
    log::set_logger(logger)?;
    log::set_max_level(max_level.to_level_filter());
    Ok(())
}

/// Attach or detach the sink; safe to call from any thread
pub fn set_log_sink(sink: Option<Arc<dyn LogSink>>) {
    if let Some(logger) = BACKUP_LOGGER.get() {
        logger.set_sink(sink);
    }
}

pub fn set_log_level(level: Level) {
    if let Some(logger) = BACKUP_LOGGER.get() {
        logger.set_max_level(level);
        log::set_max_level(level.to_level_filter());
    }
}
