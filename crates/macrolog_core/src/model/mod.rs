//! Domain records for the food-logging persistence core.
//!
//! # Responsibility
//! - Define the canonical User/Meal/Targets shapes and write payloads.
//! - Keep wire-contract field naming (snake_case column names) in one
//!   place via serde derives.
//!
//! # Invariants
//! - Timestamps are epoch milliseconds computed in Rust, so both backend
//!   dialects store identical values.

use std::time::{SystemTime, UNIX_EPOCH};

pub mod meal;
pub mod targets;
pub mod user;

/// Current wall-clock time in epoch milliseconds.
///
/// Falls back to 0 on a pre-epoch clock rather than panicking.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
