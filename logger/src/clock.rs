use chrono::{DateTime, Days, Local, NaiveTime};
use std::sync::Mutex;
use std::time::Duration;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Clone, Copy, Default, Debug)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock(Mutex<DateTime<Local>>);

impl ManualClock {
    pub fn new(now: DateTime<Local>) -> ManualClock {
        ManualClock(Mutex::new(now))
    }

    pub fn set(&self, now: DateTime<Local>) {
        if let Ok(mut v) = self.0.lock() {
            *v = now;
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut v) = self.0.lock() {
            *v += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        match self.0.lock() {
            Ok(v) => *v,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Time left until the next local midnight.
///
/// Recomputed from the calendar each time, so DST days of 23 or 25 hours
/// are handled. If midnight does not exist locally, the first valid
/// instant after it is used.
pub fn until_next_midnight(now: &DateTime<Local>) -> Duration {
    let tomorrow = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .unwrap_or(now.date_naive());
    let next = (0..4)
        .filter_map(|h| {
            tomorrow
                .and_time(NaiveTime::from_hms_opt(h, 0, 0)?)
                .and_local_timezone(Local)
                .earliest()
        })
        .next();
    match next {
        Some(next) if next > *now => (next - *now).to_std().unwrap_or(Duration::ZERO),
        _ => Duration::from_secs(60 * 60),
    }
}
