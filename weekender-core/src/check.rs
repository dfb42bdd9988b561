use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::window::CandidateWindow;

/// Recheck history for one window at one provider, as read from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowCheck {
    pub id: i64,
    pub provider: String,
    pub origin: String,
    pub destination: String,
    pub depart_date: NaiveDate,
    pub return_date: NaiveDate,
    pub window_key: String,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub check_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WindowCheck {
    /// A record without a timestamp counts as never checked.
    pub fn was_checked(&self) -> bool {
        self.last_checked_at.is_some()
    }
}

/// Write command for the recheck history, upserted by `(provider, window_key)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowCheckUpsert {
    pub provider: String,
    pub origin: String,
    pub destination: String,
    pub depart_date: NaiveDate,
    pub return_date: NaiveDate,
    pub window_key: String,
    pub last_checked_at: DateTime<Utc>,
    pub check_count: i32,
}

impl WindowCheckUpsert {
    pub fn first_check(provider: &str, window: &CandidateWindow, now: DateTime<Utc>) -> Self {
        Self {
            provider: provider.to_string(),
            origin: window.origin().to_string(),
            destination: window.destination().to_string(),
            depart_date: window.depart_date(),
            return_date: window.return_date(),
            window_key: window.window_key().to_string(),
            last_checked_at: now,
            check_count: 1,
        }
    }

    pub fn recheck(existing: &WindowCheck, now: DateTime<Utc>) -> Self {
        Self {
            provider: existing.provider.clone(),
            origin: existing.origin.clone(),
            destination: existing.destination.clone(),
            depart_date: existing.depart_date,
            return_date: existing.return_date,
            window_key: existing.window_key.clone(),
            last_checked_at: now,
            check_count: existing.check_count + 1,
        }
    }
}

/// Outcome of one planning call. `selected` is in priority order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannerResult {
    selected: Vec<CandidateWindow>,
    total_candidates: usize,
    skipped_recently_checked: usize,
    skipped_budget: usize,
}

impl PlannerResult {
    pub fn new(
        selected: Vec<CandidateWindow>,
        total_candidates: usize,
        skipped_recently_checked: usize,
        skipped_budget: usize,
    ) -> Self {
        Self {
            selected,
            total_candidates,
            skipped_recently_checked,
            skipped_budget,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), 0, 0, 0)
    }

    pub fn selected(&self) -> &[CandidateWindow] {
        &self.selected
    }

    pub fn total_candidates(&self) -> usize {
        self.total_candidates
    }

    pub fn skipped_recently_checked(&self) -> usize {
        self.skipped_recently_checked
    }

    pub fn skipped_budget(&self) -> usize {
        self.skipped_budget
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    pub fn eligible_count(&self) -> usize {
        self.selected.len() + self.skipped_budget
    }
}
