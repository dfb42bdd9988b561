use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;

use crate::{CoreError, CoreResult};

/// Source of "now" and "today". Injected everywhere so that generation and
/// planning stay deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar date in the configured timezone.
    fn today(&self) -> NaiveDate;
}

/// Wall clock bound to a configured timezone.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn from_name(name: &str) -> CoreResult<Self> {
        let tz = name
            .parse::<Tz>()
            .map_err(|_| CoreError::UnknownTimezone(name.to_string()))?;
        Ok(Self::new(tz))
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }
}

/// Clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime<Utc>,
    tz: Tz,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>, tz: Tz) -> Self {
        Self { now, tz }
    }

    /// Midnight of `date` in `tz`.
    pub fn at_start_of_day(date: NaiveDate, tz: Tz) -> Self {
        let midnight = date.and_time(NaiveTime::MIN);
        let now = midnight
            .and_local_timezone(tz)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            // Midnight only goes missing on a DST gap day
            .unwrap_or_else(|| midnight.and_utc());
        Self::new(now, tz)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn today(&self) -> NaiveDate {
        self.now.with_timezone(&self.tz).date_naive()
    }
}
