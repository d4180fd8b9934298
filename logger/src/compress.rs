use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use zstd::Encoder;

use crate::naming::compressed_path;

const LEVEL: i32 = 1;

/// Replaces `path` with `<path>.zst`.
pub(crate) fn compress_file(path: &Path) -> Result<PathBuf> {
    let target = compressed_path(path);
    let mut input = File::open(path)?;
    let output = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
        .with_context(|| format!("archive exists: {}", target.display()))?;
    let mut enc = Encoder::new(output, LEVEL)?;
    io::copy(&mut input, &mut enc)?;
    enc.finish()?.sync_all()?;
    fs::remove_file(path)?;
    Ok(target)
}
