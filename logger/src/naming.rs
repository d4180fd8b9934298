use chrono::{DateTime, Local, NaiveDate};
use regex::Regex;
use std::path::{Path, PathBuf};

const DATE_FORMAT: &str = "%Y%m%d";
const STAMP_FORMAT: &str = "%H%M%S%3f";

/// File names of one log stream.
///
/// canonical: `<base>_<YYYYMMDD><ext>`
/// backup:    `<base>_<YYYYMMDD>_<HHMMSSfff><ext>`
#[derive(Clone, Debug)]
pub struct FileNamer {
    base: String,
    ext: String,
    date_re: Regex,
}

impl FileNamer {
    pub fn new(base: &str, ext: &str) -> FileNamer {
        let ext = normalize_ext(ext);
        let date_re = Regex::new(&format!(r"^{}_(\d{{8}})(?:[_.]|$)", regex::escape(base)))
            .expect("escaped pattern is valid");
        FileNamer {
            base: base.to_owned(),
            ext,
            date_re,
        }
    }

    pub fn ext(&self) -> &str {
        &self.ext
    }

    pub fn date_token(date: NaiveDate) -> String {
        date.format(DATE_FORMAT).to_string()
    }

    pub fn canonical(&self, date: NaiveDate) -> String {
        format!("{}_{}{}", self.base, Self::date_token(date), self.ext)
    }

    pub fn backup(&self, now: &DateTime<Local>) -> String {
        format!(
            "{}_{}_{}{}",
            self.base,
            Self::date_token(now.date_naive()),
            now.format(STAMP_FORMAT),
            self.ext
        )
    }

    /// A backup path in `dir` that is free both as itself and as its
    /// compressed `.zst` form.
    pub fn free_backup_path(&self, dir: &Path, now: &DateTime<Local>) -> PathBuf {
        let path = dir.join(self.backup(now));
        if !is_taken(&path) {
            return path;
        }
        let stem = format!(
            "{}_{}_{}",
            self.base,
            Self::date_token(now.date_naive()),
            now.format(STAMP_FORMAT)
        );
        let mut n = 1;
        loop {
            let path = dir.join(format!("{}_{}{}", stem, n, self.ext));
            if !is_taken(&path) {
                return path;
            }
            n += 1;
        }
    }

    /// The date a file belongs to: the 8 digits right after `<base>_`.
    /// The extension is not checked, so renamed extensions and compressed
    /// backups are still recognised.
    pub fn date_of(&self, file_name: &str) -> Option<NaiveDate> {
        let caps = self.date_re.captures(file_name)?;
        NaiveDate::parse_from_str(caps.get(1)?.as_str(), DATE_FORMAT).ok()
    }

    pub fn is_dated(&self, file_name: &str, date: NaiveDate) -> bool {
        file_name.contains(&format!("_{}", Self::date_token(date)))
    }
}

fn is_taken(path: &Path) -> bool {
    path.exists() || compressed_path(path).exists()
}

pub(crate) fn compressed_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".zst");
    path.with_file_name(name)
}

fn normalize_ext(ext: &str) -> String {
    if ext.is_empty() || ext.starts_with('.') {
        ext.to_owned()
    } else {
        format!(".{}", ext)
    }
}
