//! Weekly reporting: the current and previous week's aggregates in one
//! call, matching the twice-weekly summary job of the dashboard backend.

use std::sync::Arc;

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::Serialize;

use healthlog_core::dates::{previous_week, week_bounds};
use healthlog_core::{Reconciler, RecordStore, WeeklyAggregate};

use crate::error::ServiceResult;

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct WeeklyReport {
    pub current: WeeklyAggregate,
    pub previous: WeeklyAggregate,
}

pub struct WeeklyReporter<S> {
    reconciler: Arc<Reconciler<S>>,
}

impl<S: RecordStore> WeeklyReporter<S> {
    pub fn new(reconciler: Arc<Reconciler<S>>) -> Self {
        Self { reconciler }
    }

    /// Aggregates for the week containing `today` and the week before it.
    pub async fn report(&self, today: NaiveDate) -> ServiceResult<WeeklyReport> {
        let (monday, _) = week_bounds(today);
        let (prev_monday, _) = previous_week(monday);

        let current = self
            .reconciler
            .weekly_aggregate(&monday.format("%Y-%m-%d").to_string())
            .await?;
        let previous = self
            .reconciler
            .weekly_aggregate(&prev_monday.format("%Y-%m-%d").to_string())
            .await?;
        Ok(WeeklyReport { current, previous })
    }
}
