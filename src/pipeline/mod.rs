//! Update-detection pipeline.
//!
//! - `resolve`: pick the effective latest (free) chapter of a snapshot
//! - `diff`: compare it with the stored baseline
//! - `check`: run one novel end to end
//! - `scheduler`: run every tracked novel on an interval

pub mod check;
pub mod diff;
pub mod resolve;
pub mod scheduler;

pub use check::{CheckOutcome, CheckReport, CheckStage, NovelChecker};
pub use diff::{DiffOutcome, calculate_diff};
pub use resolve::{Resolution, resolve_effective_latest};
pub use scheduler::{Dispatch, NovelRun, Scheduler, TickSummary};
