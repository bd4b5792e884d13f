//! Meal record and write payload.
//!
//! # Responsibility
//! - Define the logged-meal shape shared by both backend dialects.
//! - Validate write payloads before any storage is touched.
//!
//! # Invariants
//! - A meal identifier is only unique within its owning user's scope;
//!   every lookup couples `(id, user_id)`.
//! - `food_items` is an opaque analysis payload; element order must
//!   survive persistence round-trips unchanged.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_MEAL_NAME: &str = "Meal";

/// Extended nutrition metrics derived by the analysis collaborator.
///
/// All optional: older clients and older rows predate these fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtendedMetrics {
    pub processed_calories: Option<f64>,
    pub processed_percent: Option<f64>,
    pub ultra_processed_calories: Option<f64>,
    pub ultra_processed_percent: Option<f64>,
    pub fiber: Option<f64>,
    pub caffeine: Option<f64>,
    pub fresh_produce: Option<f64>,
}

/// One logged meal as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    /// Client-generated timestamp-based value, or a server-side epoch-ms
    /// fallback when the client supplied none.
    pub id: String,
    pub user_id: String,
    /// Display date string chosen by the client.
    pub date: String,
    pub name: String,
    /// Opaque items from the analysis response, order-preserving.
    pub food_items: Vec<serde_json::Value>,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    #[serde(flatten)]
    pub metrics: ExtendedMetrics,
    pub image_url: Option<String>,
    /// Epoch milliseconds.
    pub created_at: i64,
}

/// Write payload for create/update. Updates replace every payload field;
/// there is no partial patch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MealDraft {
    /// Caller-supplied identifier; synthesized from the current time when
    /// absent on create. Ignored on update (the target key is explicit).
    pub id: Option<String>,
    pub date: String,
    /// Defaults to `"Meal"` when absent or blank.
    pub name: Option<String>,
    pub food_items: Vec<serde_json::Value>,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    #[serde(flatten)]
    pub metrics: ExtendedMetrics,
    pub image_url: Option<String>,
}

impl MealDraft {
    /// Display name with the wire-contract default applied.
    pub fn resolved_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => DEFAULT_MEAL_NAME,
        }
    }

    /// Rejects payloads that must never reach storage.
    pub fn validate(&self, user_id: &str) -> Result<(), MealValidationError> {
        validate_user_id(user_id)?;
        if let Some(id) = &self.id {
            if id.trim().is_empty() {
                return Err(MealValidationError::EmptyMealId);
            }
        }
        for (field, value) in [
            ("calories", self.calories),
            ("protein", self.protein),
            ("carbs", self.carbs),
            ("fat", self.fat),
        ] {
            if value < 0.0 {
                return Err(MealValidationError::NegativeMacro { field });
            }
        }
        Ok(())
    }
}

/// Rejects a missing/blank owner identifier before any storage access.
pub fn validate_user_id(user_id: &str) -> Result<(), MealValidationError> {
    if user_id.trim().is_empty() {
        return Err(MealValidationError::MissingUserId);
    }
    Ok(())
}

/// Payload defect detected before storage is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MealValidationError {
    MissingUserId,
    EmptyMealId,
    NegativeMacro { field: &'static str },
}

impl Display for MealValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingUserId => write!(f, "user id is required"),
            Self::EmptyMealId => write!(f, "meal id must not be empty when supplied"),
            Self::NegativeMacro { field } => write!(f, "{field} cannot be negative"),
        }
    }
}

impl Error for MealValidationError {}

#[cfg(test)]
mod tests {
    use super::{MealDraft, MealValidationError};

    #[test]
    fn blank_user_id_is_rejected() {
        let draft = MealDraft {
            date: "2024-01-01".to_string(),
            ..MealDraft::default()
        };
        assert_eq!(
            draft.validate("  "),
            Err(MealValidationError::MissingUserId)
        );
    }

    #[test]
    fn supplied_empty_meal_id_is_rejected() {
        let draft = MealDraft {
            id: Some(String::new()),
            date: "2024-01-01".to_string(),
            ..MealDraft::default()
        };
        assert_eq!(draft.validate("u1"), Err(MealValidationError::EmptyMealId));
    }

    #[test]
    fn negative_primary_macros_are_rejected() {
        let draft = MealDraft {
            date: "2024-01-01".to_string(),
            protein: -1.0,
            ..MealDraft::default()
        };
        assert_eq!(
            draft.validate("u1"),
            Err(MealValidationError::NegativeMacro { field: "protein" })
        );
    }

    #[test]
    fn name_default_applies_to_absent_and_blank() {
        let mut draft = MealDraft::default();
        assert_eq!(draft.resolved_name(), "Meal");
        draft.name = Some("   ".to_string());
        assert_eq!(draft.resolved_name(), "Meal");
        draft.name = Some("Lunch".to_string());
        assert_eq!(draft.resolved_name(), "Lunch");
    }
}
