use chrono::{DateTime, Local, NaiveDate};
use crossbeam::channel::{self, Receiver, Sender};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::cleaner;
use crate::clock::{until_next_midnight, Clock};
use crate::compress::compress_file;
use crate::config::{create_dir, LogConfig};
use crate::console::Console;
use crate::naming::FileNamer;
use crate::record::LogRecord;

pub(crate) enum Message {
    Record(LogRecord),
    Flush(Sender<()>),
    Shutdown(Sender<()>),
}

enum FileState {
    Closed,
    Open {
        file: File,
        path: PathBuf,
        date: NaiveDate,
        len: u64,
    },
}

/// Sole owner of the log file. Everything here runs on the `log writer`
/// thread; producers only reach it through the queue.
pub(crate) struct LogWriter {
    dir: PathBuf,
    namer: FileNamer,
    max_size: u64,
    retention_days: u32,
    compress: bool,
    clock: Arc<dyn Clock>,
    console: Console,
    state: FileState,
    cleaning: Option<JoinHandle<()>>,
    compressing: Vec<JoinHandle<()>>,
}

impl LogWriter {
    pub fn new(config: &LogConfig, dir: PathBuf, clock: Arc<dyn Clock>) -> LogWriter {
        LogWriter {
            dir,
            namer: FileNamer::new(&config.file_name, &config.ext),
            max_size: config.max_size,
            retention_days: config.retention_days,
            compress: config.compress,
            clock,
            console: Console::new(config.colored),
            state: FileState::Closed,
            cleaning: None,
            compressing: Vec::new(),
        }
    }

    pub fn spawn(self, rx: Receiver<Message>) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("log writer".to_string())
            .spawn(move || self.run(rx))
    }

    fn run(mut self, rx: Receiver<Message>) {
        let mut midnight = self.next_midnight();
        loop {
            channel::select! {
                recv(rx) -> msg => match msg {
                    Ok(Message::Record(record)) => self.write(&record),
                    Ok(Message::Flush(ack)) => {
                        self.flush();
                        let _ = ack.send(());
                    }
                    Ok(Message::Shutdown(ack)) => {
                        self.drain(&rx);
                        let _ = ack.send(());
                        return;
                    }
                    Err(_) => {
                        self.close_all();
                        return;
                    }
                },
                recv(channel::at(midnight)) -> _ => {
                    self.on_midnight();
                    midnight = self.next_midnight();
                }
            }
        }
    }

    fn next_midnight(&self) -> Instant {
        Instant::now() + until_next_midnight(&self.clock.now())
    }

    /// Appends one record, rotating first when no file is open, the date
    /// has changed or the record would push the file past `max_size`.
    pub fn write(&mut self, record: &LogRecord) {
        let now = self.clock.now();
        let rotate = match &self.state {
            FileState::Closed => true,
            FileState::Open { date, len, .. } => {
                *date != now.date_naive()
                    || (self.max_size > 0 && len + record.len() > self.max_size)
            }
        };
        if rotate {
            self.rotate(&now, record.len());
        }
        if let FileState::Open { file, path, len, .. } = &mut self.state {
            match file.write_all(record.bytes()) {
                Ok(_) => *len += record.len(),
                Err(e) => self.console.report(
                    &now,
                    &format!("error to write log file {}: {}", path.display(), e),
                ),
            }
        }
    }

    fn rotate(&mut self, now: &DateTime<Local>, incoming: u64) {
        self.close();
        if let Err(e) = create_dir(&self.dir) {
            self.console.report(
                now,
                &format!("error to create log path {}: {}", self.dir.display(), e),
            );
            return;
        }
        let date = now.date_naive();
        let path = self.dir.join(self.namer.canonical(date));
        let mut len = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        if self.max_size > 0 && len > 0 && len + incoming > self.max_size {
            let backup = self.namer.free_backup_path(&self.dir, now);
            match fs::rename(&path, &backup) {
                Ok(_) => {
                    len = 0;
                    if self.compress {
                        self.start_compress(backup);
                    }
                }
                Err(e) => self.console.report(
                    now,
                    &format!("error to rename log file {}: {}", path.display(), e),
                ),
            }
        }
        match open(&path) {
            Ok(file) => {
                self.state = FileState::Open {
                    file,
                    path,
                    date,
                    len,
                }
            }
            Err(e) => self.console.report(
                now,
                &format!("error to open new log file {}: {}", path.display(), e),
            ),
        }
    }

    /// Daily tick: drops a handle left over from a previous day and starts
    /// a retention sweep unless the last one is still running.
    pub fn on_midnight(&mut self) {
        let today = self.clock.now().date_naive();
        let stale = match &self.state {
            FileState::Open { path, .. } => !path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| self.namer.is_dated(n, today))
                .unwrap_or(false),
            FileState::Closed => false,
        };
        if stale {
            self.close();
        }
        self.start_cleanup(today);
    }

    fn start_cleanup(&mut self, today: NaiveDate) {
        if let Some(handle) = &self.cleaning {
            if !handle.is_finished() {
                return;
            }
        }
        if let Some(handle) = self.cleaning.take() {
            let _ = handle.join();
        }
        if self.retention_days == 0 {
            return;
        }
        let dir = self.dir.clone();
        let namer = self.namer.clone();
        let retention_days = self.retention_days;
        let console = self.console;
        let clock = self.clock.clone();
        let spawned = thread::Builder::new()
            .name("log cleaner".to_string())
            .spawn(move || {
                match cleaner::sweep(&dir, &namer, retention_days, today) {
                    Ok(sweep) => {
                        for (path, e) in sweep.failed {
                            console.report(
                                &clock.now(),
                                &format!("error to delete old log {}: {}", path.display(), e),
                            );
                        }
                    }
                    Err(e) => console.report(
                        &clock.now(),
                        &format!("error to open log path {}: {}", dir.display(), e),
                    ),
                }
            });
        match spawned {
            Ok(handle) => self.cleaning = Some(handle),
            Err(e) => self
                .console
                .report(&self.clock.now(), &format!("error to start log cleaner: {}", e)),
        }
    }

    fn start_compress(&mut self, backup: PathBuf) {
        self.compressing.retain(|h| !h.is_finished());
        let console = self.console;
        let clock = self.clock.clone();
        let spawned = thread::Builder::new()
            .name("log compressor".to_string())
            .spawn(move || {
                if let Err(e) = compress_file(&backup) {
                    console.report(
                        &clock.now(),
                        &format!("error to compress log file {}: {}", backup.display(), e),
                    );
                }
            });
        match spawned {
            Ok(handle) => self.compressing.push(handle),
            Err(e) => self
                .console
                .report(&self.clock.now(), &format!("error to start log compressor: {}", e)),
        }
    }

    fn flush(&mut self) {
        if let FileState::Open { file, path, .. } = &mut self.state {
            if let Err(e) = file.flush() {
                self.console.report(
                    &self.clock.now(),
                    &format!("error to flush log file {}: {}", path.display(), e),
                );
            }
        }
    }

    fn close(&mut self) {
        if let FileState::Open { file, path, .. } =
            std::mem::replace(&mut self.state, FileState::Closed)
        {
            if let Err(e) = file.sync_all() {
                self.console.report(
                    &self.clock.now(),
                    &format!("error to close exist log file {}: {}", path.display(), e),
                );
            }
        }
    }

    /// Writes whatever is still queued, then closes.
    fn drain(&mut self, rx: &Receiver<Message>) {
        while let Ok(msg) = rx.try_recv() {
            match msg {
                Message::Record(record) => self.write(&record),
                Message::Flush(ack) | Message::Shutdown(ack) => {
                    let _ = ack.send(());
                }
            }
        }
        self.close_all();
    }

    fn close_all(&mut self) {
        self.close();
        if let Some(handle) = self.cleaning.take() {
            let _ = handle.join();
        }
        for handle in self.compressing.drain(..) {
            let _ = handle.join();
        }
    }

    #[cfg(test)]
    fn current_path(&self) -> Option<&Path> {
        match &self.state {
            FileState::Open { path, .. } => Some(path),
            FileState::Closed => None,
        }
    }

    #[cfg(test)]
    fn current_len(&self) -> Option<u64> {
        match &self.state {
            FileState::Open { len, .. } => Some(*len),
            FileState::Closed => None,
        }
    }
}

fn open(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true).append(true).read(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o666);
    }
    options.open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use bytes::Bytes;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, mi, s).unwrap()
    }

    /// A record of exactly 30 bytes.
    fn rec(n: u32) -> LogRecord {
        let line = format!("record {:02} {}\n", n, "x".repeat(19));
        assert_eq!(line.len(), 30);
        LogRecord::from(Bytes::from(line))
    }

    fn writer(dir: &Path, max_size: u64, clock: Arc<ManualClock>) -> LogWriter {
        let config = LogConfig {
            dir: Some(dir.to_owned()),
            max_size,
            colored: false,
            ..Default::default()
        };
        LogWriter::new(&config, dir.to_owned(), clock)
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn size_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(at(2026, 10, 17, 10, 0, 0)));
        let mut w = writer(dir.path(), 100, clock);
        for n in 1..=5 {
            w.write(&rec(n));
        }
        assert_eq!(w.current_len(), Some(60));
        w.close_all();

        assert_eq!(
            file_names(dir.path()),
            vec!["out_20261017.log", "out_20261017_100000000.log"]
        );
        let backup = read(&dir.path().join("out_20261017_100000000.log"));
        let expected: String = (1..=3).map(|n| read_rec(&rec(n))).collect();
        assert_eq!(backup, expected);
        let canonical = read(&dir.path().join("out_20261017.log"));
        let expected: String = (4..=5).map(|n| read_rec(&rec(n))).collect();
        assert_eq!(canonical, expected);
    }

    fn read_rec(record: &LogRecord) -> String {
        String::from_utf8(record.bytes().to_vec()).unwrap()
    }

    #[test]
    fn repeated_rotation_keeps_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(at(2026, 10, 17, 10, 0, 0)));
        let mut w = writer(dir.path(), 60, clock);
        for n in 1..=7 {
            w.write(&rec(n));
        }
        w.close_all();
        let names = file_names(dir.path());
        assert_eq!(names.len(), 4);
        let total: String = names.iter().map(|n| read(&dir.path().join(n))).collect();
        for n in 1..=7 {
            assert_eq!(total.matches(&read_rec(&rec(n))).count(), 1);
        }
    }

    #[test]
    fn unbounded_size() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(at(2026, 10, 17, 10, 0, 0)));
        let mut w = writer(dir.path(), 0, clock);
        for n in 1..=20 {
            w.write(&rec(n));
        }
        assert_eq!(w.current_len(), Some(600));
        w.close_all();
        assert_eq!(file_names(dir.path()), vec!["out_20261017.log"]);
    }

    #[test]
    fn continues_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("out_20261017.log"), "y".repeat(50)).unwrap();
        let clock = Arc::new(ManualClock::new(at(2026, 10, 17, 10, 0, 0)));
        let mut w = writer(dir.path(), 100, clock);
        w.write(&rec(1));
        assert_eq!(w.current_len(), Some(80));
        w.write(&rec(2));
        assert_eq!(w.current_len(), Some(30));
        w.close_all();
        assert_eq!(file_names(dir.path()).len(), 2);
    }

    #[test]
    fn oversized_existing_file_is_rotated_on_first_write() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("out_20261017.log"), "y".repeat(90)).unwrap();
        let clock = Arc::new(ManualClock::new(at(2026, 10, 17, 10, 0, 0)));
        let mut w = writer(dir.path(), 100, clock);
        w.write(&rec(1));
        assert_eq!(w.current_len(), Some(30));
        w.close_all();
        assert_eq!(read(&dir.path().join("out_20261017.log")), read_rec(&rec(1)));
        assert_eq!(
            read(&dir.path().join("out_20261017_100000000.log")),
            "y".repeat(90)
        );
    }

    #[test]
    fn rollover_on_midnight() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(at(2026, 10, 17, 23, 59, 59)));
        let mut w = writer(dir.path(), 100, clock.clone());
        w.write(&rec(1));
        assert_eq!(
            w.current_path(),
            Some(dir.path().join("out_20261017.log").as_path())
        );

        clock.set(at(2026, 10, 18, 0, 0, 1));
        w.on_midnight();
        assert!(w.current_path().is_none());

        w.write(&rec(2));
        assert_eq!(
            w.current_path(),
            Some(dir.path().join("out_20261018.log").as_path())
        );
        w.close_all();
        assert_eq!(read(&dir.path().join("out_20261017.log")), read_rec(&rec(1)));
        assert_eq!(read(&dir.path().join("out_20261018.log")), read_rec(&rec(2)));
    }

    #[test]
    fn midnight_keeps_current_file() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(at(2026, 10, 18, 0, 0, 1)));
        let mut w = writer(dir.path(), 100, clock);
        w.write(&rec(1));
        w.on_midnight();
        assert!(w.current_path().is_some());
        w.close_all();
    }

    #[test]
    fn rollover_before_timer() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(at(2026, 10, 17, 23, 59, 59)));
        let mut w = writer(dir.path(), 0, clock.clone());
        w.write(&rec(1));
        clock.advance(chrono::Duration::seconds(2));
        w.write(&rec(2));
        w.close_all();
        assert_eq!(
            file_names(dir.path()),
            vec!["out_20261017.log", "out_20261018.log"]
        );
    }

    #[test]
    fn midnight_sweeps_expired_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("out_20260901.log"), "old").unwrap();
        fs::write(dir.path().join("out_20261010.log"), "recent").unwrap();
        let clock = Arc::new(ManualClock::new(at(2026, 10, 18, 0, 0, 1)));
        let mut w = writer(dir.path(), 100, clock);
        w.on_midnight();
        w.close_all();
        assert_eq!(file_names(dir.path()), vec!["out_20261010.log"]);
    }

    #[test]
    fn recovers_after_open_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("logs");
        fs::write(&dir, b"not a directory").unwrap();
        let clock = Arc::new(ManualClock::new(at(2026, 10, 17, 10, 0, 0)));
        let mut w = writer(&dir, 100, clock);
        w.write(&rec(1));
        assert!(w.current_path().is_none());

        fs::remove_file(&dir).unwrap();
        w.write(&rec(2));
        assert!(w.current_path().is_some());
        w.close_all();
        assert_eq!(read(&dir.join("out_20261017.log")), read_rec(&rec(2)));
    }

    #[test]
    fn compressed_backups_within_one_millisecond_keep_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(at(2026, 10, 17, 10, 0, 0)));
        let config = LogConfig {
            max_size: 60,
            colored: false,
            compress: true,
            ..Default::default()
        };
        let mut w = LogWriter::new(&config, dir.path().to_owned(), clock);
        for n in 1..=7 {
            w.write(&rec(n));
            for handle in w.compressing.drain(..) {
                handle.join().unwrap();
            }
        }
        w.close_all();

        let names = file_names(dir.path());
        assert_eq!(names.len(), 4);
        let total: String = names
            .iter()
            .map(|n| {
                let path = dir.path().join(n);
                if n.ends_with(".zst") {
                    let raw = zstd::stream::decode_all(File::open(&path).unwrap()).unwrap();
                    String::from_utf8(raw).unwrap()
                } else {
                    read(&path)
                }
            })
            .collect();
        for n in 1..=7 {
            assert_eq!(total.matches(&read_rec(&rec(n))).count(), 1, "record {}", n);
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_append_keeps_length() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(at(2026, 10, 17, 10, 0, 0)));
        let mut w = writer(dir.path(), 100, clock.clone());
        let full = PathBuf::from("/dev/full");
        w.state = FileState::Open {
            file: open(&full).unwrap(),
            path: full,
            date: clock.now().date_naive(),
            len: 40,
        };
        w.write(&rec(1));
        assert_eq!(w.current_len(), Some(40));
        assert_eq!(w.current_path(), Some(Path::new("/dev/full")));
        w.write(&rec(2));
        assert_eq!(w.current_len(), Some(40));
    }

    #[test]
    fn compresses_backups() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(at(2026, 10, 17, 10, 0, 0)));
        let config = LogConfig {
            max_size: 100,
            colored: false,
            compress: true,
            ..Default::default()
        };
        let mut w = LogWriter::new(&config, dir.path().to_owned(), clock);
        for n in 1..=5 {
            w.write(&rec(n));
        }
        w.close_all();
        assert_eq!(
            file_names(dir.path()),
            vec!["out_20261017.log", "out_20261017_100000000.log.zst"]
        );
    }
}
