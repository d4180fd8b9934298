use anyhow::{Context, Result};
use byte_unit::Byte;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::level::LevelMask;

pub const DEFAULT_FILE_NAME: &str = "out";
pub const DEFAULT_EXT: &str = ".log";
pub const DEFAULT_MAX_SIZE: u64 = 5 * 1024 * 1024;
pub const DEFAULT_RETENTION_DAYS: u32 = 30;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[cfg(windows)]
pub const DEFAULT_DIR: &str = r"c:\log";
#[cfg(not(windows))]
pub const DEFAULT_DIR: &str = "/var/log";

/// Settings of a [`Logger`](crate::Logger).
///
/// The writer takes its own copy at start, so changing a config after
/// `Logger::start` has no effect on the running logger.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Base name of the log files.
    pub file_name: String,
    /// Directory of the log files. `None` selects [`DEFAULT_DIR`].
    pub dir: Option<PathBuf>,
    pub ext: String,
    /// Size limit of a single file in bytes. 0 disables size rotation.
    pub max_size: u64,
    /// Days a file is kept. 0 disables the daily cleanup.
    pub retention_days: u32,
    pub levels: LevelMask,
    /// Print to stdout only; nothing is written to files.
    pub console_only: bool,
    pub colored: bool,
    /// Compress size-rotated backups with zstd.
    pub compress: bool,
    pub queue_capacity: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            file_name: DEFAULT_FILE_NAME.to_owned(),
            dir: None,
            ext: DEFAULT_EXT.to_owned(),
            max_size: DEFAULT_MAX_SIZE,
            retention_days: DEFAULT_RETENTION_DAYS,
            levels: LevelMask::ALL,
            console_only: false,
            colored: true,
            compress: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl LogConfig {
    /// Defaults overridden by `LOG_DIR`, `LOG_FILE`, `LOG_EXT`,
    /// `LOG_MAX_SIZE` (`5MiB`, `100KB`, `1024`...), `LOG_RETENTION_DAYS`,
    /// `LOG_LEVEL`, `LOG_CONSOLE_ONLY`, `LOG_COMPRESS` and
    /// `LOG_QUEUE_CAPACITY`.
    pub fn from_env() -> Result<LogConfig> {
        let mut config = LogConfig::default();
        if let Ok(dir) = env::var("LOG_DIR") {
            config.dir = Some(PathBuf::from(dir));
        }
        if let Ok(file_name) = env::var("LOG_FILE") {
            config.file_name = file_name;
        }
        if let Ok(ext) = env::var("LOG_EXT") {
            config.ext = ext;
        }
        if let Ok(size) = env::var("LOG_MAX_SIZE") {
            config.max_size = Byte::from_str(&size)
                .map_err(|e| anyhow::anyhow!("{:?}", e))
                .with_context(|| format!("LOG_MAX_SIZE has an error: {}", size))?
                .get_bytes();
        }
        if let Ok(days) = env::var("LOG_RETENTION_DAYS") {
            config.retention_days = days
                .parse()
                .with_context(|| format!("LOG_RETENTION_DAYS has an error: {}", days))?;
        }
        if let Ok(levels) = env::var("LOG_LEVEL") {
            config.levels = levels
                .parse()
                .with_context(|| format!("LOG_LEVEL has an error: {}", levels))?;
        }
        if let Ok(v) = env::var("LOG_CONSOLE_ONLY") {
            config.console_only = parse_flag(&v);
        }
        if let Ok(v) = env::var("LOG_COMPRESS") {
            config.compress = parse_flag(&v);
        }
        if let Ok(capacity) = env::var("LOG_QUEUE_CAPACITY") {
            config.queue_capacity = capacity
                .parse()
                .with_context(|| format!("LOG_QUEUE_CAPACITY has an error: {}", capacity))?;
        }
        Ok(config)
    }

    pub fn log_dir(&self) -> &Path {
        self.dir
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_DIR))
    }

    /// Makes sure the log directory exists, creating it recursively.
    pub fn resolve_dir(&self) -> Result<PathBuf> {
        let dir = self.log_dir().to_owned();
        create_dir(&dir).with_context(|| format!("error to create log path: {}", dir.display()))?;
        Ok(dir)
    }
}

pub(crate) fn create_dir(dir: &Path) -> std::io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o777);
    }
    builder.create(dir)
}

fn parse_flag(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
