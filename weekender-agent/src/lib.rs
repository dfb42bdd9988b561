pub mod cycle;
pub mod scheduler;

pub use cycle::{CycleError, CycleReport, CycleSettings, OfferOutcome, ScanCycle};
pub use scheduler::{daily_lock, next_run_after, ScanLock, Scheduler};
