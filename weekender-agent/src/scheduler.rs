use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use chrono_tz::Tz;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;
use weekender_core::Clock;
use weekender_store::RedisClient;

use crate::cycle::ScanCycle;

const LOCK_PREFIX: &str = "daily-scan";

/// First instant after `now` whose wall-clock time in `tz` is `run_at`.
///
/// On a day where `run_at` falls into a DST gap the run moves one hour later.
pub fn next_run_after(now: DateTime<Utc>, run_at: NaiveTime, tz: Tz) -> DateTime<Utc> {
    let today = now.with_timezone(&tz).date_naive();

    (0..=2)
        .filter_map(|offset| {
            let local = (today + Duration::days(offset)).and_time(run_at);
            local
                .and_local_timezone(tz)
                .earliest()
                .or_else(|| (local + Duration::hours(1)).and_local_timezone(tz).earliest())
        })
        .map(|run| run.with_timezone(&Utc))
        .find(|run| *run > now)
        .unwrap_or(now + Duration::days(1))
}

/// Lock name for the local day of `now`, and the seconds left until that day
/// ends in `tz`.
pub fn daily_lock(now: DateTime<Utc>, tz: Tz) -> (String, u64) {
    let today = now.with_timezone(&tz).date_naive();
    let name = format!("{}:{}", LOCK_PREFIX, today.format("%Y-%m-%d"));

    let end_of_day = today
        .succ_opt()
        .and_then(|tomorrow| tomorrow.and_hms_opt(0, 0, 0))
        .and_then(|midnight| {
            midnight
                .and_local_timezone(tz)
                .earliest()
                .or_else(|| (midnight + Duration::hours(1)).and_local_timezone(tz).earliest())
        })
        .map(|end| end.with_timezone(&Utc))
        .unwrap_or(now + Duration::days(1));

    let ttl_seconds = u64::try_from((end_of_day - now).num_seconds()).unwrap_or(0).max(1);
    (name, ttl_seconds)
}

/// Cross-process guard so only one agent scans per local day. The lock is
/// kept until the day ends unless the cycle fails.
pub struct ScanLock {
    redis: RedisClient,
    owner: String,
}

impl ScanLock {
    pub fn new(redis: RedisClient) -> Self {
        Self {
            redis,
            owner: Uuid::new_v4().to_string(),
        }
    }
}

/// Runs the scan cycle once a day at a fixed local time.
pub struct Scheduler {
    cycle: ScanCycle,
    clock: Arc<dyn Clock>,
    run_at: NaiveTime,
    tz: Tz,
    run_on_start: bool,
    lock: Option<ScanLock>,
}

impl Scheduler {
    pub fn new(cycle: ScanCycle, clock: Arc<dyn Clock>, run_at: NaiveTime, tz: Tz, run_on_start: bool) -> Self {
        Self {
            cycle,
            clock,
            run_at,
            tz,
            run_on_start,
            lock: None,
        }
    }

    pub fn with_lock(mut self, lock: Option<ScanLock>) -> Self {
        self.lock = lock;
        self
    }

    /// Loops until Ctrl-C.
    pub async fn run(&self) {
        if self.run_on_start {
            self.run_once().await;
        }

        loop {
            let now = self.clock.now();
            let next = next_run_after(now, self.run_at, self.tz);
            let wait = (next - now).to_std().unwrap_or_default();
            info!("Next scan at {}", next.with_timezone(&self.tz));

            tokio::select! {
                _ = sleep(wait) => self.run_once().await,
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping scheduler");
                    return;
                }
            }
        }
    }

    /// A failed cycle is logged and left for the next scheduled run.
    pub async fn run_once(&self) {
        let (lock_name, ttl_seconds) = daily_lock(self.clock.now(), self.tz);

        if let Some(lock) = &self.lock {
            match lock.redis.acquire_scan_lock(&lock_name, &lock.owner, ttl_seconds).await {
                Ok(true) => {}
                Ok(false) => {
                    info!("{} is already taken, skipping this run", lock_name);
                    return;
                }
                Err(e) => {
                    error!("Failed to acquire scan lock: {}", e);
                    return;
                }
            }
        }

        match self.cycle.run_cycle().await {
            Ok(report) => {
                for outcome in report.acceptable() {
                    info!(
                        "Acceptable offer: {} via {} for {} PLN, {} full days, {}",
                        outcome.window_key,
                        outcome.provider,
                        outcome.assessment.price_pln.unwrap_or_default(),
                        outcome.assessment.full_days_on_site,
                        outcome.offer.deep_link
                    );
                }
            }
            Err(e) => {
                error!("Scan cycle failed: {}", e);

                // Let another agent, or a restart, retry today
                if let Some(lock) = &self.lock {
                    if let Err(e) = lock.redis.release_scan_lock(&lock_name, &lock.owner).await {
                        warn!("Failed to release scan lock: {}", e);
                    }
                }
            }
        }
    }
}
