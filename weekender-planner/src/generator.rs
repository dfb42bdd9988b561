use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use tracing::{debug, info, warn};
use weekender_core::{window_key, CandidateWindow, Clock};

/// Enumerates weekend-spanning travel windows for one scan cycle.
pub struct TripWindowGenerator {
    clock: Arc<dyn Clock>,
    max_windows_per_destination_per_depart_date: usize,
    max_windows_global: usize,
}

impl TripWindowGenerator {
    pub fn new(
        clock: Arc<dyn Clock>,
        max_windows_per_destination_per_depart_date: usize,
        max_windows_global: usize,
    ) -> Self {
        Self {
            clock,
            max_windows_per_destination_per_depart_date,
            max_windows_global,
        }
    }

    /// Candidate windows departing in `[today, today + horizon_days)` and
    /// returning no later than the horizon end, ordered by
    /// (origin, destination, depart date, return date).
    ///
    /// Only windows with a Saturday strictly inside survive. Each
    /// (destination, depart date) slot keeps its shortest trips up to the
    /// per-slot cap, counted across all origins; the sorted result is then
    /// truncated to the global cap.
    pub fn generate(
        &self,
        origins: &[String],
        destinations: &[String],
        horizon_days: i64,
        full_days_allowed: &[u32],
    ) -> Vec<CandidateWindow> {
        if horizon_days <= 0 {
            debug!("Horizon of {} days leaves no departure dates", horizon_days);
            return Vec::new();
        }

        let today = self.clock.today();
        let Some(horizon_end) = today.checked_add_days(Days::new(horizon_days.unsigned_abs())) else {
            warn!("Horizon of {} days runs past the last representable date", horizon_days);
            return Vec::new();
        };

        let mut candidates = Vec::new();
        let mut seen_keys: HashSet<String> = HashSet::new();
        let mut count_per_slot: HashMap<(&str, NaiveDate), usize> = HashMap::new();
        let mut count_per_destination: BTreeMap<&str, usize> = BTreeMap::new();

        for origin in origins {
            for destination in destinations {
                for depart_date in today.iter_days().take_while(|day| *day < horizon_end) {
                    let mut slot_windows = Vec::new();

                    for &full_days in full_days_allowed {
                        let Some(return_date) = depart_date.checked_add_days(Days::new(u64::from(full_days) + 1))
                        else {
                            continue;
                        };
                        if return_date > horizon_end {
                            continue;
                        }

                        let key = window_key(origin, destination, depart_date, return_date);
                        if seen_keys.contains(&key) {
                            continue;
                        }

                        match CandidateWindow::new(origin.as_str(), destination.as_str(), depart_date, return_date) {
                            Ok(window) if window.has_saturday_in_middle() => {
                                seen_keys.insert(key);
                                slot_windows.push(window);
                            }
                            Ok(_) => {}
                            Err(e) => {
                                debug!(
                                    "Skipping invalid window: {}-{} {} to {}: {}",
                                    origin, destination, depart_date, return_date, e
                                );
                            }
                        }
                    }

                    slot_windows.sort_by_key(|w| w.return_date());

                    let taken = count_per_slot
                        .entry((destination.as_str(), depart_date))
                        .or_insert(0);
                    let remaining = self
                        .max_windows_per_destination_per_depart_date
                        .saturating_sub(*taken);

                    for window in slot_windows.into_iter().take(remaining) {
                        *taken += 1;
                        *count_per_destination.entry(destination.as_str()).or_insert(0) += 1;
                        candidates.push(window);
                    }
                }
            }
        }

        candidates.sort_by(|a, b| {
            (a.origin(), a.destination(), a.depart_date(), a.return_date())
                .cmp(&(b.origin(), b.destination(), b.depart_date(), b.return_date()))
        });
        candidates.truncate(self.max_windows_global);

        info!(
            "Generated {} candidate windows (global limit: {})",
            candidates.len(),
            self.max_windows_global
        );
        for (destination, count) in &count_per_destination {
            debug!("Destination {}: {} windows", destination, count);
        }

        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Duration};
    use weekender_core::FixedClock;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn codes(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn generator_on(today: NaiveDate, per_slot: usize, global: usize) -> TripWindowGenerator {
        let clock = FixedClock::at_start_of_day(today, chrono_tz::Europe::Warsaw);
        TripWindowGenerator::new(Arc::new(clock), per_slot, global)
    }

    // Wednesday
    fn generator(per_slot: usize, global: usize) -> TripWindowGenerator {
        generator_on(date(2026, 1, 14), per_slot, global)
    }

    #[test]
    fn test_generates_only_saturday_spanning_windows() {
        let windows = generator(100, 1000).generate(&codes(&["WAW"]), &codes(&["LIS"]), 14, &[1, 2, 3]);

        assert!(!windows.is_empty());
        for window in &windows {
            assert!(window.has_saturday_in_middle());
            assert!(window.return_date() > window.depart_date());
            assert!(window.full_days() >= 1);
        }
    }

    #[test]
    fn test_no_window_departs_on_saturday() {
        let saturday = date(2026, 1, 17);
        let windows = generator_on(saturday, 100, 1000).generate(&codes(&["WAW"]), &codes(&["LIS"]), 7, &[2]);

        assert!(windows.iter().all(|w| w.depart_date() != saturday));
    }

    #[test]
    fn test_no_window_returns_on_saturday() {
        let windows = generator(100, 1000).generate(&codes(&["WAW"]), &codes(&["LIS"]), 14, &[1, 2, 3, 4, 5]);

        assert!(windows.iter().all(|w| w.return_date().weekday() != chrono::Weekday::Sat));
    }

    #[test]
    fn test_full_days_follow_requested_values() {
        let windows = generator(100, 1000).generate(&codes(&["WAW"]), &codes(&["LIS"]), 30, &[2]);

        assert!(!windows.is_empty());
        for window in &windows {
            assert_eq!(window.full_days(), 2);
            assert_eq!((window.return_date() - window.depart_date()).num_days(), 3);
        }
    }

    #[test]
    fn test_respects_per_slot_cap() {
        let windows = generator(2, 1000).generate(&codes(&["WAW"]), &codes(&["LIS"]), 30, &[1, 2, 3, 4, 5]);

        let mut per_slot: HashMap<(String, NaiveDate), usize> = HashMap::new();
        for window in &windows {
            *per_slot
                .entry((window.destination().to_string(), window.depart_date()))
                .or_insert(0) += 1;
        }
        assert!(per_slot.values().all(|count| *count <= 2));

        // Thursday 2026-01-15 allows 2..=5 full days; the two shortest are kept
        let thursday: Vec<_> = windows
            .iter()
            .filter(|w| w.depart_date() == date(2026, 1, 15))
            .map(|w| w.return_date())
            .collect();
        assert_eq!(thursday, vec![date(2026, 1, 18), date(2026, 1, 19)]);
    }

    #[test]
    fn test_per_slot_cap_is_shared_across_origins() {
        let windows = generator(1, 1000).generate(&codes(&["WAW", "KRK"]), &codes(&["LIS"]), 7, &[1]);

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].window_key(), "WAW-LIS-2026-01-16-2026-01-18");
    }

    #[test]
    fn test_respects_global_cap() {
        let windows = generator(100, 5).generate(
            &codes(&["WAW", "KRK"]),
            &codes(&["LIS", "BCN", "MAD"]),
            30,
            &[1, 2, 3, 4],
        );

        assert_eq!(windows.len(), 5);
        // Global truncation happens after sorting, so KRK comes first
        assert!(windows.iter().all(|w| w.origin() == "KRK"));
    }

    #[test]
    fn test_stays_within_horizon() {
        let today = date(2026, 1, 14);
        let horizon_end = today + Duration::days(14);
        let windows = generator(100, 1000).generate(&codes(&["WAW"]), &codes(&["LIS"]), 14, &[1, 2, 3, 4]);

        for window in &windows {
            assert!(window.depart_date() >= today);
            assert!(window.depart_date() < horizon_end);
            assert!(window.return_date() <= horizon_end);
        }
    }

    #[test]
    fn test_output_is_sorted_and_deterministic() {
        let gen = generator(100, 1000);
        let origins = codes(&["WAW", "KRK"]);
        let destinations = codes(&["LIS", "BCN"]);

        let first = gen.generate(&origins, &destinations, 14, &[1, 2, 3]);
        let second = gen.generate(&origins, &destinations, 14, &[1, 2, 3]);
        assert_eq!(first, second);

        let keys: Vec<_> = first
            .iter()
            .map(|w| (w.origin().to_string(), w.destination().to_string(), w.depart_date(), w.return_date()))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_no_duplicate_windows() {
        let windows = generator(100, 1000).generate(&codes(&["WAW"]), &codes(&["LIS"]), 30, &[1, 2, 2, 3, 1]);

        let keys: HashSet<_> = windows.iter().map(|w| w.window_key().to_string()).collect();
        assert_eq!(keys.len(), windows.len());
    }

    #[test]
    fn test_friday_to_sunday_window() {
        let windows = generator_on(date(2026, 1, 16), 100, 1000).generate(&codes(&["WAW"]), &codes(&["LIS"]), 7, &[1]);

        assert!(windows
            .iter()
            .any(|w| w.depart_date() == date(2026, 1, 16) && w.return_date() == date(2026, 1, 18)));
    }

    #[test]
    fn test_empty_when_no_weekend_fits() {
        // Monday with a three-day horizon never spans a Saturday
        let windows = generator_on(date(2026, 1, 19), 100, 1000).generate(&codes(&["WAW"]), &codes(&["LIS"]), 3, &[1]);
        assert!(windows.is_empty());
    }

    #[test]
    fn test_empty_inputs() {
        let gen = generator(100, 1000);
        assert!(gen.generate(&[], &codes(&["LIS"]), 14, &[1]).is_empty());
        assert!(gen.generate(&codes(&["WAW"]), &[], 14, &[1]).is_empty());
        assert!(gen.generate(&codes(&["WAW"]), &codes(&["LIS"]), 0, &[1]).is_empty());
        assert!(gen.generate(&codes(&["WAW"]), &codes(&["LIS"]), -3, &[1]).is_empty());
        // Zero full days can never be a valid window
        assert!(gen.generate(&codes(&["WAW"]), &codes(&["LIS"]), 14, &[0]).is_empty());
    }

    #[test]
    fn test_unrepresentable_horizon_is_empty() {
        let gen = generator(100, 1000);
        assert!(gen.generate(&codes(&["WAW"]), &codes(&["LIS"]), i64::MAX, &[1]).is_empty());
        assert!(gen.generate(&codes(&["WAW"]), &codes(&["LIS"]), 5_000_000_000, &[1]).is_empty());
    }

    #[test]
    fn test_multiple_origins_and_destinations() {
        let windows = generator(100, 1000).generate(&codes(&["WAW", "KRK"]), &codes(&["LIS", "BCN"]), 14, &[1, 2]);

        for code in ["WAW", "KRK"] {
            assert!(windows.iter().any(|w| w.origin() == code));
        }
        for code in ["LIS", "BCN"] {
            assert!(windows.iter().any(|w| w.destination() == code));
        }
    }
}
