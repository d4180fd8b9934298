use chrono::NaiveDate;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::naming::FileNamer;

#[derive(Default, Debug)]
pub(crate) struct Sweep {
    pub failed: Vec<(PathBuf, io::Error)>,
}

/// Deletes every file of the stream whose date is `retention_days` or more
/// calendar days before `today`. Names that carry no date are left alone,
/// and a failed delete does not stop the sweep.
pub(crate) fn sweep(
    dir: &Path,
    namer: &FileNamer,
    retention_days: u32,
    today: NaiveDate,
) -> io::Result<Sweep> {
    sweep_with(dir, namer, retention_days, today, |path| fs::remove_file(path))
}

fn sweep_with(
    dir: &Path,
    namer: &FileNamer,
    retention_days: u32,
    today: NaiveDate,
    mut remove: impl FnMut(&Path) -> io::Result<()>,
) -> io::Result<Sweep> {
    let mut result = Sweep::default();
    if retention_days == 0 {
        return Ok(result);
    }
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => continue,
        };
        match entry.file_type() {
            Ok(t) if t.is_file() => {}
            _ => continue,
        }
        let file_name = entry.file_name();
        let Some(date) = file_name.to_str().and_then(|n| namer.date_of(n)) else {
            continue;
        };
        let age = today.signed_duration_since(date).num_days();
        if age >= i64::from(retention_days) {
            let path = entry.path();
            if let Err(e) = remove(&path) {
                result.failed.push((path, e));
            }
        }
    }
    Ok(result)
}
