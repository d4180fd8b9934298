use anyhow::{bail, Error, Result};
use serde::Deserialize;
use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
#[repr(u8)]
pub enum Level {
    Debug = 1,
    Warning = 2,
    Info = 4,
    Error = 8,
}

impl Level {
    pub fn tag(&self) -> &'static str {
        match self {
            Level::Debug => "[DEBUG]",
            Level::Warning => "[WARNING]",
            Level::Info => "[INFO]",
            Level::Error => "[ERROR]",
        }
    }

    pub fn bit(&self) -> u8 {
        *self as u8
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warning,
            log::Level::Info => Level::Info,
            log::Level::Debug | log::Level::Trace => Level::Debug,
        }
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Level::Debug,
            "warning" | "warn" => Level::Warning,
            "info" => Level::Info,
            "error" => Level::Error,
            other => bail!("unknown log level: {}", other),
        })
    }
}

/// Set of enabled levels.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
#[serde(try_from = "MaskRepr")]
pub struct LevelMask(u8);

/// A mask is written either as a raw bitmask or as level names.
#[derive(Deserialize)]
#[serde(untagged)]
enum MaskRepr {
    Bits(u8),
    Names(String),
}

impl LevelMask {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(15);

    #[inline]
    pub fn contains(&self, level: Level) -> bool {
        self.0 & level.bit() > 0
    }
}

impl Default for LevelMask {
    fn default() -> Self {
        Self::ALL
    }
}

impl From<Level> for LevelMask {
    fn from(level: Level) -> Self {
        Self(level.bit())
    }
}

impl BitOr for LevelMask {
    type Output = LevelMask;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOr<Level> for LevelMask {
    type Output = LevelMask;

    fn bitor(self, rhs: Level) -> Self {
        Self(self.0 | rhs.bit())
    }
}

impl BitOr for Level {
    type Output = LevelMask;

    fn bitor(self, rhs: Self) -> LevelMask {
        LevelMask(self.bit() | rhs.bit())
    }
}

/// Accepts `all`, `none`, a raw bitmask such as `12`, or a comma
/// separated list of level names.
impl FromStr for LevelMask {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::ALL);
        }
        if s.is_empty() || s.eq_ignore_ascii_case("none") {
            return Ok(Self::NONE);
        }
        if let Ok(bits) = s.parse::<u8>() {
            return Self::try_from(bits);
        }
        s.split(',')
            .filter(|v| !v.trim().is_empty())
            .try_fold(Self::NONE, |mask, v| -> Result<Self> {
                Ok(mask | v.parse::<Level>()?)
            })
    }
}

impl TryFrom<u8> for LevelMask {
    type Error = Error;

    fn try_from(bits: u8) -> Result<Self> {
        if bits > Self::ALL.0 {
            bail!("log level mask out of range: {}", bits);
        }
        Ok(Self(bits))
    }
}

impl TryFrom<MaskRepr> for LevelMask {
    type Error = Error;

    fn try_from(value: MaskRepr) -> Result<Self> {
        match value {
            MaskRepr::Bits(bits) => Self::try_from(bits),
            MaskRepr::Names(names) => names.parse(),
        }
    }
}

impl fmt::Display for LevelMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [Level::Debug, Level::Warning, Level::Info, Level::Error]
            .iter()
            .filter(|l| self.contains(**l))
            .map(|l| l.tag().trim_matches(|c| c == '[' || c == ']'))
            .collect();
        write!(f, "{}", names.join(","))
    }
}
