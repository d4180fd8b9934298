use anyhow::{Context, Result};
use crossbeam::channel::{self, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::clock::{Clock, SystemClock};
use crate::config::LogConfig;
use crate::console::Console;
use crate::level::{Level, LevelMask};
use crate::log_writer::{LogWriter, Message};
use crate::record::LogRecord;

/// Handle of a running log pipeline.
///
/// Emitting formats the record on the calling thread, prints it to stdout
/// and queues it for the `log writer` thread. The queue is bounded; when it
/// is full the caller blocks until the writer catches up.
///
/// Each caller's lines reach stdout in the same order as the file, but
/// lines of different threads may interleave differently on stdout than in
/// the file.
pub struct Logger {
    levels: LevelMask,
    console: Console,
    clock: Arc<dyn Clock>,
    tx: Option<Sender<Message>>,
    accepting: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("levels", &self.levels)
            .field("console", &self.console)
            .finish_non_exhaustive()
    }
}

impl Logger {
    pub fn start(config: LogConfig) -> Result<Logger> {
        Self::start_with_clock(config, Arc::new(SystemClock))
    }

    /// Fails when the log directory cannot be created.
    pub fn start_with_clock(config: LogConfig, clock: Arc<dyn Clock>) -> Result<Logger> {
        let console = Console::new(config.colored);
        if config.console_only {
            return Ok(Logger {
                levels: config.levels,
                console,
                clock,
                tx: None,
                accepting: AtomicBool::new(false),
                worker: Mutex::new(None),
            });
        }
        let dir = config.resolve_dir()?;
        let (tx, rx) = channel::bounded(config.queue_capacity.max(1));
        let worker = LogWriter::new(&config, dir, clock.clone())
            .spawn(rx)
            .context("error to start log writer")?;
        Ok(Logger {
            levels: config.levels,
            console,
            clock,
            tx: Some(tx),
            accepting: AtomicBool::new(true),
            worker: Mutex::new(Some(worker)),
        })
    }

    #[inline]
    pub fn enabled(&self, level: Level) -> bool {
        self.levels.contains(level)
    }

    pub fn log(&self, level: Level, msg: &str) {
        if !self.enabled(level) {
            return;
        }
        let record = LogRecord::format(level, msg, &self.clock.now());
        self.console.echo(level, &record);
        if !self.accepting.load(Ordering::Acquire) {
            return;
        }
        if let Some(tx) = &self.tx {
            // the writer is gone only after shutdown
            let _ = tx.send(Message::Record(record));
        }
    }

    pub fn debug(&self, msg: &str) {
        self.log(Level::Debug, msg)
    }

    pub fn info(&self, msg: &str) {
        self.log(Level::Info, msg)
    }

    pub fn warning(&self, msg: &str) {
        self.log(Level::Warning, msg)
    }

    pub fn error(&self, msg: &str) {
        self.log(Level::Error, msg)
    }

    /// Records waiting for the writer.
    pub fn pending(&self) -> usize {
        self.tx.as_ref().map(|tx| tx.len()).unwrap_or(0)
    }

    /// Blocks until every record queued before this call is in the file.
    pub fn flush(&self) {
        self.request(Message::Flush);
    }

    /// Stops file output, writes what is still queued, closes the file and
    /// waits for the writer thread. Later calls only reach the console.
    pub fn shutdown(&self) {
        if !self.accepting.swap(false, Ordering::AcqRel) {
            return;
        }
        self.request(Message::Shutdown);
        let worker = match self.worker.lock() {
            Ok(mut worker) => worker.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(worker) = worker {
            let _ = worker.join();
        }
    }

    fn request(&self, msg: fn(Sender<()>) -> Message) {
        if let Some(tx) = &self.tx {
            let (ack_tx, ack_rx) = channel::bounded(1);
            if tx.send(msg(ack_tx)).is_ok() {
                let _ = ack_rx.recv();
            }
        }
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.shutdown();
    }
}
