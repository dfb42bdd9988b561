use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};
use weekender_core::{
    CandidateWindow, Clock, PlannerResult, RepositoryError, WindowCheck, WindowCheckRepository,
    WindowCheckUpsert,
};

/// Decides which candidate windows a provider is queried for today.
///
/// Windows checked within the recheck interval are skipped; the rest are
/// ranked (never checked first, then nearest departure, then fewest checks,
/// then window key) and cut at the daily budget. The selection is recorded in
/// the recheck history before it is returned.
pub struct WindowCheckPlanner {
    clock: Arc<dyn Clock>,
    min_recheck_interval: Duration,
    daily_budget_per_provider: usize,
    repository: Arc<dyn WindowCheckRepository>,
    provider_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl WindowCheckPlanner {
    pub fn new(
        clock: Arc<dyn Clock>,
        min_recheck_interval_hours: u32,
        daily_budget_per_provider: usize,
        repository: Arc<dyn WindowCheckRepository>,
    ) -> Self {
        Self {
            clock,
            min_recheck_interval: Duration::hours(i64::from(min_recheck_interval_hours)),
            daily_budget_per_provider,
            repository,
            provider_locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn plan(
        &self,
        provider: &str,
        candidates: &[CandidateWindow],
    ) -> Result<PlannerResult, PlannerError> {
        if candidates.is_empty() {
            return Ok(PlannerResult::empty());
        }

        // Read, rank and write back as one unit per provider
        let provider_lock = self.provider_lock(provider).await;
        let _guard = provider_lock.lock().await;

        let now = self.clock.now();
        let today = self.clock.today();

        let window_keys: Vec<String> = candidates
            .iter()
            .map(|c| c.window_key().to_string())
            .collect();

        let existing_checks = self
            .repository
            .find_by_provider_and_window_keys(provider, &window_keys)
            .await
            .map_err(|source| PlannerError::HistoryRead {
                provider: provider.to_string(),
                source,
            })?;
        let checks_by_key: HashMap<&str, &WindowCheck> = existing_checks
            .iter()
            .map(|check| (check.window_key.as_str(), check))
            .collect();

        let mut skipped_recently_checked = 0;
        let mut eligible: Vec<&CandidateWindow> = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let last_checked_at = checks_by_key
                .get(candidate.window_key())
                .and_then(|check| check.last_checked_at);

            if let Some(last_checked_at) = last_checked_at {
                if last_checked_at + self.min_recheck_interval > now {
                    debug!(
                        "Skipping {} for {}: checked at {}",
                        candidate.window_key(),
                        provider,
                        last_checked_at
                    );
                    skipped_recently_checked += 1;
                    continue;
                }
            }

            eligible.push(candidate);
        }

        eligible.sort_by_cached_key(|candidate| {
            let check = checks_by_key.get(candidate.window_key());
            (
                check.is_some_and(|c| c.was_checked()),
                (candidate.depart_date() - today).num_days(),
                check.map_or(0, |c| c.check_count),
                candidate.window_key().to_string(),
            )
        });

        let eligible_count = eligible.len();
        let skipped_budget = eligible_count.saturating_sub(self.daily_budget_per_provider);
        eligible.truncate(self.daily_budget_per_provider);

        let upserts: Vec<WindowCheckUpsert> = eligible
            .iter()
            .map(|candidate| match checks_by_key.get(candidate.window_key()) {
                Some(existing) => WindowCheckUpsert::recheck(existing, now),
                None => WindowCheckUpsert::first_check(provider, candidate, now),
            })
            .collect();

        if !upserts.is_empty() {
            self.repository
                .save_all(&upserts)
                .await
                .map_err(|source| PlannerError::HistoryWrite {
                    provider: provider.to_string(),
                    source,
                })?;
        }

        info!(
            "WindowCheckPlanner: provider={}, candidates={}, eligible={}, selected={}, skippedRecent={}, skippedBudget={}",
            provider,
            candidates.len(),
            eligible_count,
            eligible.len(),
            skipped_recently_checked,
            skipped_budget
        );

        Ok(PlannerResult::new(
            eligible.into_iter().cloned().collect(),
            candidates.len(),
            skipped_recently_checked,
            skipped_budget,
        ))
    }

    async fn provider_lock(&self, provider: &str) -> Arc<Mutex<()>> {
        let mut locks = self.provider_locks.lock().await;
        locks.entry(provider.to_string()).or_default().clone()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("Failed to read recheck history for {provider}: {source}")]
    HistoryRead {
        provider: String,
        #[source]
        source: RepositoryError,
    },

    #[error("Failed to write recheck history for {provider}: {source}")]
    HistoryWrite {
        provider: String,
        #[source]
        source: RepositoryError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use weekender_core::FixedClock;

    const PROVIDER: &str = "TestProvider";

    /// Keeps history in memory, records every call, can be told to fail.
    #[derive(Default)]
    struct StubRepository {
        checks: Mutex<HashMap<String, WindowCheck>>,
        saved_batches: Mutex<Vec<Vec<WindowCheckUpsert>>>,
        find_calls: AtomicUsize,
        fail_reads: bool,
        fail_writes: bool,
    }

    impl StubRepository {
        fn with_checks(checks: Vec<WindowCheck>) -> Self {
            let repo = Self::default();
            {
                let mut map = repo.checks.try_lock().unwrap();
                for check in checks {
                    map.insert(check.window_key.clone(), check);
                }
            }
            repo
        }

        async fn saved(&self) -> Vec<WindowCheckUpsert> {
            self.saved_batches.lock().await.concat()
        }
    }

    #[async_trait]
    impl WindowCheckRepository for StubRepository {
        async fn find_by_provider_and_window_keys(
            &self,
            provider: &str,
            window_keys: &[String],
        ) -> Result<Vec<WindowCheck>, RepositoryError> {
            self.find_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads {
                return Err("connection refused".into());
            }
            let checks = self.checks.lock().await;
            Ok(window_keys
                .iter()
                .filter_map(|key| checks.get(key))
                .filter(|check| check.provider == provider)
                .cloned()
                .collect())
        }

        async fn save_all(&self, upserts: &[WindowCheckUpsert]) -> Result<(), RepositoryError> {
            // Give a concurrent planning call the chance to interleave
            tokio::task::yield_now().await;
            if self.fail_writes {
                return Err("deadlock detected".into());
            }
            let mut checks = self.checks.lock().await;
            for upsert in upserts {
                let next_id = checks.len() as i64 + 1;
                let entry = checks.entry(upsert.window_key.clone()).or_insert_with(|| WindowCheck {
                    id: next_id,
                    provider: upsert.provider.clone(),
                    origin: upsert.origin.clone(),
                    destination: upsert.destination.clone(),
                    depart_date: upsert.depart_date,
                    return_date: upsert.return_date,
                    window_key: upsert.window_key.clone(),
                    last_checked_at: None,
                    check_count: 0,
                    created_at: upsert.last_checked_at,
                    updated_at: upsert.last_checked_at,
                });
                entry.last_checked_at = Some(upsert.last_checked_at);
                entry.check_count = upsert.check_count;
                entry.updated_at = upsert.last_checked_at;
            }
            self.saved_batches.lock().await.push(upserts.to_vec());
            Ok(())
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 14).unwrap()
    }

    fn clock() -> FixedClock {
        FixedClock::at_start_of_day(today(), chrono_tz::Europe::Warsaw)
    }

    fn now() -> DateTime<Utc> {
        clock().now()
    }

    fn candidate(destination: &str, depart_in: i64, return_in: i64) -> CandidateWindow {
        CandidateWindow::new(
            "WAW",
            destination,
            today() + Duration::days(depart_in),
            today() + Duration::days(return_in),
        )
        .unwrap()
    }

    fn history(window: &CandidateWindow, last_checked_at: Option<DateTime<Utc>>, check_count: i32) -> WindowCheck {
        WindowCheck {
            id: 1,
            provider: PROVIDER.to_string(),
            origin: window.origin().to_string(),
            destination: window.destination().to_string(),
            depart_date: window.depart_date(),
            return_date: window.return_date(),
            window_key: window.window_key().to_string(),
            last_checked_at,
            check_count,
            created_at: now() - Duration::days(30),
            updated_at: now() - Duration::days(30),
        }
    }

    fn planner(repo: Arc<StubRepository>, recheck_hours: u32, budget: usize) -> WindowCheckPlanner {
        WindowCheckPlanner::new(Arc::new(clock()), recheck_hours, budget, repo)
    }

    fn keys(result: &PlannerResult) -> Vec<&str> {
        result.selected().iter().map(|c| c.window_key()).collect()
    }

    #[tokio::test]
    async fn test_never_checked_windows_come_first() {
        let new_window = candidate("LIS", 2, 4);
        let checked_window = candidate("BCN", 2, 4);
        let repo = Arc::new(StubRepository::with_checks(vec![history(
            &checked_window,
            Some(now() - Duration::hours(20)),
            5,
        )]));

        let result = planner(repo, 12, 10)
            .plan(PROVIDER, &[checked_window.clone(), new_window.clone()])
            .await
            .unwrap();

        assert_eq!(result.selected_count(), 2);
        assert_eq!(keys(&result), vec![new_window.window_key(), checked_window.window_key()]);
    }

    #[tokio::test]
    async fn test_recently_checked_windows_are_skipped() {
        let recent = candidate("LIS", 2, 4);
        let stale = candidate("BCN", 2, 4);
        let repo = Arc::new(StubRepository::with_checks(vec![
            history(&recent, Some(now() - Duration::hours(2)), 1),
            history(&stale, Some(now() - Duration::hours(20)), 1),
        ]));

        let result = planner(repo, 12, 10)
            .plan(PROVIDER, &[recent, stale.clone()])
            .await
            .unwrap();

        assert_eq!(result.selected_count(), 1);
        assert_eq!(result.skipped_recently_checked(), 1);
        assert_eq!(keys(&result), vec![stale.window_key()]);
    }

    #[tokio::test]
    async fn test_throttle_boundary_is_eligible() {
        let exactly_due = candidate("LIS", 2, 4);
        let repo = Arc::new(StubRepository::with_checks(vec![history(
            &exactly_due,
            Some(now() - Duration::hours(12)),
            1,
        )]));

        let result = planner(repo, 12, 10).plan(PROVIDER, &[exactly_due]).await.unwrap();

        assert_eq!(result.selected_count(), 1);
        assert_eq!(result.skipped_recently_checked(), 0);
    }

    #[tokio::test]
    async fn test_closer_departures_first() {
        let far = candidate("LIS", 10, 12);
        let close = candidate("BCN", 2, 4);
        let repo = Arc::new(StubRepository::default());

        let result = planner(repo, 12, 10)
            .plan(PROVIDER, &[far.clone(), close.clone()])
            .await
            .unwrap();

        assert_eq!(keys(&result), vec![close.window_key(), far.window_key()]);
    }

    #[tokio::test]
    async fn test_less_checked_windows_first() {
        let many_checks = candidate("LIS", 2, 4);
        let few_checks = candidate("BCN", 2, 4);
        let day_ago = Some(now() - Duration::hours(24));
        let repo = Arc::new(StubRepository::with_checks(vec![
            history(&many_checks, day_ago, 10),
            history(&few_checks, day_ago, 2),
        ]));

        let result = planner(repo, 12, 10)
            .plan(PROVIDER, &[many_checks.clone(), few_checks.clone()])
            .await
            .unwrap();

        assert_eq!(keys(&result), vec![few_checks.window_key(), many_checks.window_key()]);
    }

    #[tokio::test]
    async fn test_window_key_breaks_ties() {
        let c = candidate("CCC", 2, 4);
        let a = candidate("AAA", 2, 4);
        let b = candidate("BBB", 2, 4);
        let repo = Arc::new(StubRepository::default());

        let result = planner(repo, 12, 10)
            .plan(PROVIDER, &[c.clone(), a.clone(), b.clone()])
            .await
            .unwrap();

        assert_eq!(keys(&result), vec![a.window_key(), b.window_key(), c.window_key()]);
    }

    #[tokio::test]
    async fn test_daily_budget() {
        let candidates = vec![
            candidate("LIS", 2, 4),
            candidate("BCN", 3, 5),
            candidate("MAD", 4, 6),
            candidate("FCO", 5, 7),
        ];
        let repo = Arc::new(StubRepository::default());

        let result = planner(repo.clone(), 12, 2).plan(PROVIDER, &candidates).await.unwrap();

        assert_eq!(result.selected_count(), 2);
        assert_eq!(result.selected().len(), 2);
        assert_eq!(result.skipped_budget(), 2);
        assert_eq!(result.total_candidates(), 4);
        assert_eq!(
            result.selected_count() + result.skipped_budget() + result.skipped_recently_checked(),
            result.total_candidates()
        );
        // Only the selected windows are recorded
        assert_eq!(repo.saved().await.len(), 2);
    }

    #[tokio::test]
    async fn test_persists_new_and_existing_checks() {
        let new_window = candidate("LIS", 2, 4);
        let existing_window = candidate("BCN", 3, 5);
        let repo = Arc::new(StubRepository::with_checks(vec![history(
            &existing_window,
            Some(now() - Duration::hours(24)),
            3,
        )]));

        planner(repo.clone(), 12, 10)
            .plan(PROVIDER, &[new_window.clone(), existing_window.clone()])
            .await
            .unwrap();

        let batches = repo.saved_batches.lock().await;
        assert_eq!(batches.len(), 1, "one batched write per planning call");
        let saved = &batches[0];
        assert_eq!(saved.len(), 2);

        let saved_new = saved.iter().find(|u| u.window_key == new_window.window_key()).unwrap();
        assert_eq!(saved_new.check_count, 1);
        assert_eq!(saved_new.last_checked_at, now());
        assert_eq!(saved_new.provider, PROVIDER);
        assert_eq!(saved_new.origin, "WAW");
        assert_eq!(saved_new.destination, "LIS");

        let saved_existing = saved
            .iter()
            .find(|u| u.window_key == existing_window.window_key())
            .unwrap();
        assert_eq!(saved_existing.check_count, 4);
        assert_eq!(saved_existing.last_checked_at, now());
    }

    #[tokio::test]
    async fn test_uses_clock_for_now() {
        let instant = Utc.with_ymd_and_hms(2026, 1, 14, 10, 30, 0).unwrap();
        let clock = FixedClock::new(instant, chrono_tz::Europe::Warsaw);
        let repo = Arc::new(StubRepository::default());
        let planner = WindowCheckPlanner::new(Arc::new(clock), 12, 10, repo.clone());

        planner.plan(PROVIDER, &[candidate("LIS", 2, 4)]).await.unwrap();

        assert_eq!(repo.saved().await[0].last_checked_at, instant);
    }

    #[tokio::test]
    async fn test_empty_candidates_skip_the_store() {
        let repo = Arc::new(StubRepository::default());

        let result = planner(repo.clone(), 12, 10).plan(PROVIDER, &[]).await.unwrap();

        assert_eq!(result, PlannerResult::empty());
        assert_eq!(repo.find_calls.load(Ordering::SeqCst), 0);
        assert!(repo.saved().await.is_empty());
    }

    #[tokio::test]
    async fn test_record_without_timestamp_counts_as_never_checked() {
        let unchecked = candidate("LIS", 5, 7);
        let checked = candidate("BCN", 2, 4);
        let repo = Arc::new(StubRepository::with_checks(vec![
            history(&unchecked, None, 0),
            history(&checked, Some(now() - Duration::hours(48)), 1),
        ]));

        let result = planner(repo.clone(), 12, 10)
            .plan(PROVIDER, &[checked.clone(), unchecked.clone()])
            .await
            .unwrap();

        assert_eq!(result.skipped_recently_checked(), 0);
        assert_eq!(keys(&result), vec![unchecked.window_key(), checked.window_key()]);
        let saved = repo.saved().await;
        let saved_unchecked = saved.iter().find(|u| u.window_key == unchecked.window_key()).unwrap();
        assert_eq!(saved_unchecked.check_count, 1);
    }

    #[tokio::test]
    async fn test_read_failure_propagates() {
        let repo = Arc::new(StubRepository {
            fail_reads: true,
            ..Default::default()
        });

        let err = planner(repo.clone(), 12, 10)
            .plan(PROVIDER, &[candidate("LIS", 2, 4)])
            .await
            .unwrap_err();

        assert!(matches!(err, PlannerError::HistoryRead { ref provider, .. } if provider == PROVIDER));
        assert!(repo.saved().await.is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_propagates() {
        let repo = Arc::new(StubRepository {
            fail_writes: true,
            ..Default::default()
        });

        let err = planner(repo, 12, 10)
            .plan(PROVIDER, &[candidate("LIS", 2, 4)])
            .await
            .unwrap_err();

        assert!(matches!(err, PlannerError::HistoryWrite { .. }));
        assert!(err.to_string().contains("deadlock detected"));
    }

    #[tokio::test]
    async fn test_concurrent_plans_for_one_provider_do_not_double_count() {
        let candidates = vec![candidate("LIS", 2, 4), candidate("BCN", 3, 5)];
        let repo = Arc::new(StubRepository::default());
        let planner = planner(repo.clone(), 12, 10);

        let (first, second) = tokio::join!(
            planner.plan(PROVIDER, &candidates),
            planner.plan(PROVIDER, &candidates)
        );
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(first.selected_count() + second.selected_count(), 2);
        assert_eq!(
            first.skipped_recently_checked() + second.skipped_recently_checked(),
            2
        );
        let checks = repo.checks.lock().await;
        assert!(checks.values().all(|check| check.check_count == 1));
    }
}
