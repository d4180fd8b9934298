use chrono::{DateTime, Local};
use colored::Colorize;
use std::io::Write;

use crate::level::Level;
use crate::record::LogRecord;

/// Synchronous stdout output used by producers and by the writer's own
/// error reports.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Console {
    colored: bool,
}

impl Console {
    pub fn new(colored: bool) -> Console {
        Console { colored }
    }

    pub fn echo(&self, level: Level, record: &LogRecord) {
        let line = String::from_utf8_lossy(record.bytes());
        let mut stdout = std::io::stdout().lock();
        let _ = match (self.colored, level) {
            (true, Level::Error) => write!(stdout, "{}", line.red()),
            (true, Level::Warning) => write!(stdout, "{}", line.yellow()),
            _ => stdout.write_all(record.bytes()),
        };
    }

    /// Writer diagnostics never go through the queue they report on.
    pub fn report(&self, now: &DateTime<Local>, msg: &str) {
        self.echo(Level::Error, &LogRecord::format(Level::Error, msg, now));
    }
}
