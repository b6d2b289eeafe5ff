//! Weekly roll-ups over daily records. Recomputed wholesale from the
//! stored range on every request; nothing here holds independent state.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{DailyRecord, NUTRITION_FIELDS, WEARABLE_FIELDS, dates};

/// Aggregate for one ISO week (Monday start).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WeeklyAggregate {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub iso_week: u32,
    /// Mean per numeric field over the week. A field is absent when it had
    /// no non-null, non-zero values; zeros are treated as unlogged days
    /// and excluded from the denominator.
    pub field_means: BTreeMap<String, f64>,
    pub days_nutrition_logged: u32,
    pub days_complete: u32,
    /// This week's mean weight minus the prior week's; absent when either
    /// side has no weight entries.
    pub weight_change_kg: Option<f64>,
    /// Fraction of the 7 days with nutrition logged, as a percentage.
    pub compliance_pct: f64,
}

impl WeeklyAggregate {
    pub fn compute(week_start: NaiveDate, days: &[DailyRecord], prior_week: &[DailyRecord]) -> Self {
        let mut field_means = BTreeMap::new();
        for field in WEARABLE_FIELDS.iter().chain(NUTRITION_FIELDS) {
            if let Some(mean) = mean_of(days, field) {
                field_means.insert((*field).to_string(), mean);
            }
        }

        let days_nutrition_logged = days.iter().filter(|d| d.nutrition_logged).count() as u32;
        let days_complete = days.iter().filter(|d| d.data_complete).count() as u32;

        let weight_change_kg = match (mean_of(days, "weight_kg"), mean_of(prior_week, "weight_kg")) {
            (Some(current), Some(previous)) => Some(current - previous),
            _ => None,
        };

        let (_, week_end) = dates::week_bounds(week_start);
        Self {
            week_start,
            week_end,
            iso_week: dates::iso_week(week_start),
            field_means,
            days_nutrition_logged,
            days_complete,
            weight_change_kg,
            compliance_pct: f64::from(days_nutrition_logged) / 7.0 * 100.0,
        }
    }

    /// Mean for one field, `None` when no value qualified.
    pub fn mean(&self, field: &str) -> Option<f64> {
        self.field_means.get(field).copied()
    }
}

fn mean_of(days: &[DailyRecord], field: &str) -> Option<f64> {
    let values: Vec<f64> = days
        .iter()
        .filter_map(|d| d.value(field))
        .filter(|v| *v != 0.0)
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
