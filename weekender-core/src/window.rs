use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;

/// Canonical identity of a travel window: `WAW-LIS-2026-01-16-2026-01-18`.
pub fn window_key(origin: &str, destination: &str, depart_date: NaiveDate, return_date: NaiveDate) -> String {
    format!(
        "{}-{}-{}-{}",
        origin,
        destination,
        depart_date.format("%Y-%m-%d"),
        return_date.format("%Y-%m-%d")
    )
}

/// A single origin/destination/date-pair trip shape to investigate.
///
/// Fields are private: a window can only exist in its validated form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CandidateWindow {
    origin: String,
    destination: String,
    depart_date: NaiveDate,
    return_date: NaiveDate,
    window_key: String,
}

impl CandidateWindow {
    pub fn new(
        origin: impl Into<String>,
        destination: impl Into<String>,
        depart_date: NaiveDate,
        return_date: NaiveDate,
    ) -> Result<Self, WindowError> {
        let origin = origin.into();
        let destination = destination.into();

        if origin.trim().is_empty() {
            return Err(WindowError::MissingField("origin"));
        }
        if destination.trim().is_empty() {
            return Err(WindowError::MissingField("destination"));
        }
        if return_date <= depart_date {
            return Err(WindowError::ReturnNotAfterDepart { depart_date, return_date });
        }

        let full_days = (return_date - depart_date).num_days() - 1;
        if full_days < 1 {
            return Err(WindowError::TooShort { full_days });
        }

        let window_key = window_key(&origin, &destination, depart_date, return_date);
        Ok(Self {
            origin,
            destination,
            depart_date,
            return_date,
            window_key,
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn depart_date(&self) -> NaiveDate {
        self.depart_date
    }

    pub fn return_date(&self) -> NaiveDate {
        self.return_date
    }

    pub fn window_key(&self) -> &str {
        &self.window_key
    }

    /// Calendar days between the travel days, exclusive of both.
    pub fn full_days(&self) -> u32 {
        ((self.return_date - self.depart_date).num_days() - 1) as u32
    }

    /// True when a Saturday falls strictly between departure and return.
    pub fn has_saturday_in_middle(&self) -> bool {
        self.depart_date
            .iter_days()
            .skip(1)
            .take_while(|day| *day < self.return_date)
            .any(|day| day.weekday() == Weekday::Sat)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("Missing window field: {0}")]
    MissingField(&'static str),

    #[error("Return date {return_date} must be after depart date {depart_date}")]
    ReturnNotAfterDepart {
        depart_date: NaiveDate,
        return_date: NaiveDate,
    },

    #[error("Window must span at least one full day, got {full_days}")]
    TooShort { full_days: i64 },
}
