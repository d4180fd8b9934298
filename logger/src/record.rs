use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Local};

use crate::level::Level;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// A formatted line, ready for the console and the log file.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct LogRecord {
    bytes: Bytes,
}

impl LogRecord {
    /// `YYYY-MM-DD HH:MM:SS.ssssss [LEVEL] message\n`
    ///
    /// A message that already ends with a newline is not given a second one.
    pub fn format(level: Level, msg: &str, now: &DateTime<Local>) -> LogRecord {
        let timestamp = now.format(TIMESTAMP_FORMAT).to_string();
        let tag = level.tag();
        let mut buf = BytesMut::with_capacity(timestamp.len() + tag.len() + msg.len() + 3);
        buf.put(timestamp.as_bytes());
        buf.put_u8(b' ');
        buf.put(tag.as_bytes());
        buf.put_u8(b' ');
        buf.put(msg.as_bytes());
        if !msg.ends_with('\n') {
            buf.put_u8(b'\n');
        }
        LogRecord {
            bytes: buf.freeze(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Bytes> for LogRecord {
    fn from(bytes: Bytes) -> Self {
        LogRecord { bytes }
    }
}
