//! Asynchronous file logger.
//!
//! Records are printed on the caller's thread and queued for one background
//! writer, which appends them to `<base>_<YYYYMMDD><ext>`, moves a full file
//! aside as `<base>_<YYYYMMDD>_<HHMMSSfff><ext>`, switches files at local
//! midnight and deletes files older than the retention window.

mod bridge;
mod cleaner;
pub mod clock;
mod compress;
pub mod config;
mod console;
pub mod level;
mod log_writer;
pub mod logger;
pub mod naming;
pub mod record;

use anyhow::{bail, Context, Result};
use once_cell::sync::OnceCell;

pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::LogConfig;
pub use crate::level::{Level, LevelMask};
pub use crate::logger::Logger;
pub use crate::record::LogRecord;

static LOGGER: OnceCell<Logger> = OnceCell::new();

/// Starts the process-wide logger and routes the `log` macros to it.
///
/// Nothing global changes on error: if another `log` logger is already
/// installed, the file logger is shut down again and `init` can be retried
/// once that is resolved.
pub fn init(config: LogConfig) -> Result<&'static Logger> {
    if LOGGER.get().is_some() {
        bail!("logger is already initialized");
    }
    let logger = Logger::start(config)?;
    let bridge = bridge::Bridge::new();
    let max_level = bridge.max_level();
    log::set_boxed_logger(Box::new(bridge)).context("another log logger is installed")?;
    log::set_max_level(max_level);
    // set_boxed_logger succeeds once per process, so this is the only set
    if LOGGER.set(logger).is_err() {
        bail!("logger is already initialized");
    }
    LOGGER.get().context("logger is not initialized")
}

pub fn get() -> Option<&'static Logger> {
    LOGGER.get()
}

fn emit(level: Level, msg: &str) {
    match LOGGER.get() {
        Some(logger) => logger.log(level, msg),
        None => {
            let record = LogRecord::format(level, msg, &chrono::Local::now());
            console::Console::new(true).echo(level, &record);
        }
    }
}

pub fn debug(msg: &str) {
    emit(Level::Debug, msg)
}

pub fn info(msg: &str) {
    emit(Level::Info, msg)
}

pub fn warning(msg: &str) {
    emit(Level::Warning, msg)
}

pub fn error(msg: &str) {
    emit(Level::Error, msg)
}

pub fn flush() {
    if let Some(logger) = LOGGER.get() {
        logger.flush();
    }
}

/// Drains and closes the process-wide logger. Call before exit; statics are
/// never dropped.
pub fn shutdown() {
    if let Some(logger) = LOGGER.get() {
        logger.shutdown();
    }
}
