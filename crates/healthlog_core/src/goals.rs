//! Weekday macro/calorie targets. A plain keyed table read alongside the
//! daily records; latest write per weekday wins, no merge semantics.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Weekday};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WeekdayTargets {
    #[serde(default)]
    pub target_calories: Option<f64>,
    #[serde(default)]
    pub target_protein_g: Option<f64>,
    #[serde(default)]
    pub target_carbs_g: Option<f64>,
    #[serde(default)]
    pub target_fats_g: Option<f64>,
    #[serde(default)]
    pub target_weight_kg: Option<f64>,
    pub last_updated: NaiveDate,
}

#[derive(Clone, Default)]
pub struct GoalTable {
    targets: Arc<Mutex<HashMap<Weekday, WeekdayTargets>>>,
}

const WEEKDAY_ORDER: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

impl GoalTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, weekday: Weekday, targets: WeekdayTargets) {
        let mut table = self.targets.lock().await;
        table.insert(weekday, targets);
    }

    pub async fn get(&self, weekday: Weekday) -> Option<WeekdayTargets> {
        let table = self.targets.lock().await;
        table.get(&weekday).cloned()
    }

    /// All configured targets in Monday-to-Sunday order.
    pub async fn all(&self) -> Vec<(Weekday, WeekdayTargets)> {
        let table = self.targets.lock().await;
        WEEKDAY_ORDER
            .iter()
            .filter_map(|day| table.get(day).map(|t| (*day, t.clone())))
            .collect()
    }
}
