//! Per-user macro targets.

use serde::{Deserialize, Serialize};

/// Daily macro targets; at most one row per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Targets {
    pub user_id: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub processed_percent: Option<f64>,
    pub fiber: Option<f64>,
    pub caffeine: Option<f64>,
    pub fresh_produce: Option<f64>,
    /// Epoch milliseconds of the last upsert.
    pub updated_at: i64,
}

/// Write payload for the targets upsert. The whole payload replaces the
/// stored row; there is no partial patch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetsDraft {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub processed_percent: Option<f64>,
    pub fiber: Option<f64>,
    pub caffeine: Option<f64>,
    pub fresh_produce: Option<f64>,
}
