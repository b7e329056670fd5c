//! Time source.

use chrono::{DateTime, NaiveDate, Utc};

/// Abstraction over "now" so periods can be computed against a pinned date.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current UTC date.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// System clock using the OS time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub struct FixedClock {
    now: DateTime<Utc>,
}

#[cfg(test)]
impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// Midnight UTC of the given date.
    pub fn at(year: i32, month: u32, day: u32) -> Self {
        let now = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|date| date.and_utc())
            .unwrap_or_default();
        Self::new(now)
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}
