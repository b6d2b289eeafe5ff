//! Daily health-record reconciliation engine.
//!
//! Merges partial per-day updates from independent sources (wearable sync,
//! nutrition import) into one canonical [`DailyRecord`] per calendar date,
//! with source-column isolation, null-preserving merge semantics and
//! idempotent re-application. Storage is abstracted behind [`RecordStore`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod aggregate;
pub mod config;
pub mod dates;
pub mod goals;
pub mod reconciler;
pub mod retry;
pub mod store;

pub use aggregate::WeeklyAggregate;
pub use reconciler::{BatchFailure, BatchOutcome, Reconciler};
pub use store::{JsonFileStore, MemoryStore, RecordStore, StoreError};

/// Fields writable by the wearable-sync source only.
pub const WEARABLE_FIELDS: &[&str] = &[
    "steps",
    "total_sleep_hours",
    "sleep_score",
    "deep_sleep_minutes",
    "rem_sleep_minutes",
    "sleep_efficiency",
    "readiness_score",
    "temperature_deviation",
    "hrv_balance",
    "resting_heart_rate",
    "activity_score",
    "nap_minutes",
];

/// Fields writable by the nutrition-import source only.
pub const NUTRITION_FIELDS: &[&str] = &[
    "weight_kg",
    "trend_weight_kg",
    "fat_percent",
    "protein_g",
    "carbs_g",
    "fats_g",
    "calories",
    "expenditure",
];

/// A partial update for one source group: field name to value-or-null.
/// A `None` value never clears a stored value (null-preserving merge).
pub type FieldPatch = BTreeMap<String, Option<f64>>;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("invalid date {input:?}: {reason}")]
    InvalidDate { input: String, reason: String },
    #[error("field {field:?} is not writable by the {group} source")]
    InvalidField { field: String, group: SourceGroup },
    #[error("storage unavailable after {attempts} attempts: {reason}")]
    StorageUnavailable { attempts: u32, reason: String },
    #[error("conflicting writers on {date}; compare-and-swap retries exhausted")]
    ConcurrencyConflict { date: NaiveDate },
}

/// The partition of fields an upstream producer is permitted to write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceGroup {
    Wearable,
    Nutrition,
}

impl SourceGroup {
    pub fn owned_fields(self) -> &'static [&'static str] {
        match self {
            SourceGroup::Wearable => WEARABLE_FIELDS,
            SourceGroup::Nutrition => NUTRITION_FIELDS,
        }
    }

    pub fn owns(self, field: &str) -> bool {
        self.owned_fields().contains(&field)
    }

    /// Reject a patch containing any field outside this group's owned set.
    /// Runs before any mutation so a failed call leaves no partial write.
    pub fn validate(self, fields: &FieldPatch) -> Result<(), ReconcileError> {
        for field in fields.keys() {
            if !self.owns(field) {
                return Err(ReconcileError::InvalidField {
                    field: field.clone(),
                    group: self,
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for SourceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceGroup::Wearable => write!(f, "wearable"),
            SourceGroup::Nutrition => write!(f, "nutrition"),
        }
    }
}

/// The canonical record for one calendar date. All metric fields are
/// nullable; the two booleans are derived from stored state on every write
/// and never supplied by a source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DailyRecord {
    pub date: NaiveDate,

    // Wearable group
    #[serde(default)]
    pub steps: Option<f64>,
    #[serde(default)]
    pub total_sleep_hours: Option<f64>,
    #[serde(default)]
    pub sleep_score: Option<f64>,
    #[serde(default)]
    pub deep_sleep_minutes: Option<f64>,
    #[serde(default)]
    pub rem_sleep_minutes: Option<f64>,
    #[serde(default)]
    pub sleep_efficiency: Option<f64>,
    #[serde(default)]
    pub readiness_score: Option<f64>,
    #[serde(default)]
    pub temperature_deviation: Option<f64>,
    #[serde(default)]
    pub hrv_balance: Option<f64>,
    #[serde(default)]
    pub resting_heart_rate: Option<f64>,
    #[serde(default)]
    pub activity_score: Option<f64>,
    #[serde(default)]
    pub nap_minutes: Option<f64>,

    // Nutrition group
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub trend_weight_kg: Option<f64>,
    #[serde(default)]
    pub fat_percent: Option<f64>,
    #[serde(default)]
    pub protein_g: Option<f64>,
    #[serde(default)]
    pub carbs_g: Option<f64>,
    #[serde(default)]
    pub fats_g: Option<f64>,
    #[serde(default)]
    pub calories: Option<f64>,
    #[serde(default)]
    pub expenditure: Option<f64>,

    // Derived
    #[serde(default)]
    pub nutrition_logged: bool,
    #[serde(default)]
    pub data_complete: bool,
}

impl DailyRecord {
    /// A fresh record for `date` with every field null.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            steps: None,
            total_sleep_hours: None,
            sleep_score: None,
            deep_sleep_minutes: None,
            rem_sleep_minutes: None,
            sleep_efficiency: None,
            readiness_score: None,
            temperature_deviation: None,
            hrv_balance: None,
            resting_heart_rate: None,
            activity_score: None,
            nap_minutes: None,
            weight_kg: None,
            trend_weight_kg: None,
            fat_percent: None,
            protein_g: None,
            carbs_g: None,
            fats_g: None,
            calories: None,
            expenditure: None,
            nutrition_logged: false,
            data_complete: false,
        }
    }

    /// Stored value of a metric field by name, `None` when the field is
    /// null or the name is unknown.
    pub fn value(&self, field: &str) -> Option<f64> {
        match field {
            "steps" => self.steps,
            "total_sleep_hours" => self.total_sleep_hours,
            "sleep_score" => self.sleep_score,
            "deep_sleep_minutes" => self.deep_sleep_minutes,
            "rem_sleep_minutes" => self.rem_sleep_minutes,
            "sleep_efficiency" => self.sleep_efficiency,
            "readiness_score" => self.readiness_score,
            "temperature_deviation" => self.temperature_deviation,
            "hrv_balance" => self.hrv_balance,
            "resting_heart_rate" => self.resting_heart_rate,
            "activity_score" => self.activity_score,
            "nap_minutes" => self.nap_minutes,
            "weight_kg" => self.weight_kg,
            "trend_weight_kg" => self.trend_weight_kg,
            "fat_percent" => self.fat_percent,
            "protein_g" => self.protein_g,
            "carbs_g" => self.carbs_g,
            "fats_g" => self.fats_g,
            "calories" => self.calories,
            "expenditure" => self.expenditure,
            _ => None,
        }
    }

    fn slot_mut(&mut self, field: &str) -> Option<&mut Option<f64>> {
        match field {
            "steps" => Some(&mut self.steps),
            "total_sleep_hours" => Some(&mut self.total_sleep_hours),
            "sleep_score" => Some(&mut self.sleep_score),
            "deep_sleep_minutes" => Some(&mut self.deep_sleep_minutes),
            "rem_sleep_minutes" => Some(&mut self.rem_sleep_minutes),
            "sleep_efficiency" => Some(&mut self.sleep_efficiency),
            "readiness_score" => Some(&mut self.readiness_score),
            "temperature_deviation" => Some(&mut self.temperature_deviation),
            "hrv_balance" => Some(&mut self.hrv_balance),
            "resting_heart_rate" => Some(&mut self.resting_heart_rate),
            "activity_score" => Some(&mut self.activity_score),
            "nap_minutes" => Some(&mut self.nap_minutes),
            "weight_kg" => Some(&mut self.weight_kg),
            "trend_weight_kg" => Some(&mut self.trend_weight_kg),
            "fat_percent" => Some(&mut self.fat_percent),
            "protein_g" => Some(&mut self.protein_g),
            "carbs_g" => Some(&mut self.carbs_g),
            "fats_g" => Some(&mut self.fats_g),
            "calories" => Some(&mut self.calories),
            "expenditure" => Some(&mut self.expenditure),
            _ => None,
        }
    }

    /// Null-preserving merge: non-null incoming values overwrite, null
    /// values leave the stored field untouched. Keys must already be
    /// validated against the owning group.
    pub(crate) fn merge(&mut self, fields: &FieldPatch) {
        for (name, value) in fields {
            if let Some(v) = value
                && let Some(slot) = self.slot_mut(name)
            {
                *slot = Some(*v);
            }
        }
    }

    /// Recompute `nutrition_logged` and `data_complete` from the stored
    /// state, not from an incoming delta.
    pub(crate) fn recompute_derived(&mut self) {
        self.nutrition_logged = self.calories.is_some();
        let has_wearable = WEARABLE_FIELDS.iter().any(|f| self.value(f).is_some());
        self.data_complete = self.nutrition_logged && has_wearable;
    }
}

/// One `(date, group, fields)` tuple for [`Reconciler::reconcile_batch`].
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct ReconcileEntry {
    /// Date key in `YYYY-MM-DD` form.
    pub date: String,
    pub group: SourceGroup,
    pub fields: FieldPatch,
}
