use env_logger::{Builder, Env};
use log::{Log, Metadata, Record};

use crate::level::Level;
use crate::logger::Logger;

const FILTER_ENV: &str = "RUST_LOG";

/// Feeds the `log` macros into the process-wide [`Logger`]. `RUST_LOG`
/// narrows by target; the logger's level mask still applies on top.
/// Records are dropped until the logger is published.
pub(crate) struct Bridge {
    inner: env_logger::Logger,
}

impl Bridge {
    pub fn new() -> Bridge {
        let mut builder = Builder::from_env(Env::new().filter_or(FILTER_ENV, "trace"));
        Bridge {
            inner: builder.build(),
        }
    }

    fn logger(&self) -> Option<&'static Logger> {
        crate::get()
    }

    pub fn max_level(&self) -> log::LevelFilter {
        self.inner.filter()
    }
}

impl Log for Bridge {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.inner.enabled(metadata)
            && self
                .logger()
                .map(|l| l.enabled(metadata.level().into()))
                .unwrap_or(false)
    }

    fn log(&self, record: &Record) {
        let Some(logger) = self.logger() else {
            return;
        };
        if self.enabled(record.metadata()) {
            let level = Level::from(record.level());
            match record.args().as_str() {
                Some(msg) => logger.log(level, msg),
                None => logger.log(level, &record.args().to_string()),
            }
        }
    }

    fn flush(&self) {
        if let Some(logger) = self.logger() {
            logger.flush();
        }
    }
}
