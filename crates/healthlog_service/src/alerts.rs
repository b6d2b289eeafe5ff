//! Alert rules over the trailing week of daily records.
//!
//! Rules (red = act today, yellow = worth a look):
//! - HRV drop: today's HRV balance below 85% of the 7-day average.
//! - Low sleep: today's sleep score below 60.
//! - Weight spike: more than 1.5 kg change against the previous weigh-in.
//! - Missing nutrition: 2+ most-recent consecutive days without logging
//!   (evening check only).
//!
//! A per-day ledger deduplicates, so each rule fires at most once per day.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use schemars::JsonSchema;
use serde::Serialize;
use tokio::sync::Mutex;

use healthlog_core::{DailyRecord, Reconciler, RecordStore};

use crate::error::ServiceResult;

const HRV_DROP_RATIO: f64 = 0.85;
const HRV_MIN_HISTORY: usize = 3;
const SLEEP_SCORE_FLOOR: f64 = 60.0;
const WEIGHT_SPIKE_KG: f64 = 1.5;
const MISSING_NUTRITION_DAYS: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Red,
    Yellow,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Red => write!(f, "red"),
            Severity::Yellow => write!(f, "yellow"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct Alert {
    pub id: &'static str,
    pub severity: Severity,
    pub title: &'static str,
    pub message: String,
}

pub struct AlertService<S> {
    reconciler: Arc<Reconciler<S>>,
    sent: Mutex<HashMap<NaiveDate, HashSet<&'static str>>>,
}

impl<S: RecordStore> AlertService<S> {
    pub fn new(reconciler: Arc<Reconciler<S>>) -> Self {
        Self {
            reconciler,
            sent: Mutex::new(HashMap::new()),
        }
    }

    /// Evaluate all rules against the last 7 days. `check_nutrition` adds
    /// the missing-nutrition rule, intended for the evening run.
    pub async fn check(&self, today: NaiveDate, check_nutrition: bool) -> ServiceResult<Vec<Alert>> {
        let start = today - Days::new(7);
        let data = self
            .reconciler
            .get_range(&date_key(start), &date_key(today))
            .await?;
        if data.is_empty() {
            tracing::info!("no data in the last 7 days, skipping alerts");
            return Ok(Vec::new());
        }

        let mut triggered = Vec::new();
        triggered.extend(hrv_drop(&data, today));
        triggered.extend(sleep_drop(&data, today));
        triggered.extend(weight_spike(&data));
        if check_nutrition {
            triggered.extend(missing_nutrition(&data));
        }

        let fresh = self.dedup_and_mark(triggered, today).await;
        tracing::info!(count = fresh.len(), "alert check finished");
        Ok(fresh)
    }

    async fn dedup_and_mark(&self, alerts: Vec<Alert>, today: NaiveDate) -> Vec<Alert> {
        let mut sent = self.sent.lock().await;
        let cutoff = today - Days::new(7);
        sent.retain(|date, _| *date >= cutoff);

        let today_sent = sent.entry(today).or_default();
        alerts
            .into_iter()
            .filter(|a| today_sent.insert(a.id))
            .collect()
    }
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn hrv_drop(data: &[DailyRecord], today: NaiveDate) -> Option<Alert> {
    let values: Vec<f64> = data.iter().filter_map(|r| r.hrv_balance).collect();
    let today_hrv = data
        .iter()
        .find(|r| r.date == today)
        .and_then(|r| r.hrv_balance)?;
    if values.len() < HRV_MIN_HISTORY {
        return None;
    }
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    if today_hrv >= avg * HRV_DROP_RATIO {
        return None;
    }
    let pct_drop = ((1.0 - today_hrv / avg) * 100.0).round();
    Some(Alert {
        id: "hrv_drop",
        severity: Severity::Red,
        title: "HRV Drop",
        message: format!(
            "today's HRV balance {today_hrv} is {pct_drop}% below the 7-day average {avg:.1}"
        ),
    })
}

fn sleep_drop(data: &[DailyRecord], today: NaiveDate) -> Option<Alert> {
    let score = data
        .iter()
        .find(|r| r.date == today)
        .and_then(|r| r.sleep_score)?;
    if score >= SLEEP_SCORE_FLOOR {
        return None;
    }
    Some(Alert {
        id: "sleep_drop",
        severity: Severity::Red,
        title: "Low Sleep Score",
        message: format!("today's sleep score {score} is below the {SLEEP_SCORE_FLOOR} threshold"),
    })
}

fn weight_spike(data: &[DailyRecord]) -> Option<Alert> {
    // Records arrive ascending; compare the two most recent weigh-ins.
    let weights: Vec<(NaiveDate, f64)> = data
        .iter()
        .filter_map(|r| r.weight_kg.map(|w| (r.date, w)))
        .collect();
    let [.., (prev_date, prev), (date, latest)] = weights.as_slice() else {
        return None;
    };
    let change = latest - prev;
    if change.abs() <= WEIGHT_SPIKE_KG {
        return None;
    }
    Some(Alert {
        id: "weight_spike",
        severity: Severity::Yellow,
        title: "Weight Spike",
        message: format!(
            "{date}: {latest}kg is {change:+.1}kg from {prev_date}: {prev}kg"
        ),
    })
}

fn missing_nutrition(data: &[DailyRecord]) -> Option<Alert> {
    let consecutive = data
        .iter()
        .rev()
        .take_while(|r| !r.nutrition_logged)
        .count();
    if consecutive < MISSING_NUTRITION_DAYS {
        return None;
    }
    Some(Alert {
        id: "missing_nutrition",
        severity: Severity::Yellow,
        title: "Missing Nutrition",
        message: format!("no nutrition logged for {consecutive} consecutive days"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthlog_core::{FieldPatch, MemoryStore, SourceGroup};

    fn patch(pairs: &[(&str, Option<f64>)]) -> FieldPatch {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn d(s: &str) -> NaiveDate {
        healthlog_core::dates::parse_date(s).expect("date")
    }

    async fn service_with_hrv(values: &[(&str, f64)]) -> AlertService<MemoryStore> {
        let rec = Arc::new(Reconciler::new(MemoryStore::new()));
        for (day, hrv) in values {
            rec.reconcile(day, SourceGroup::Wearable, &patch(&[("hrv_balance", Some(*hrv))]))
                .await
                .expect("write");
        }
        AlertService::new(rec)
    }

    #[tokio::test]
    async fn hrv_drop_fires_below_85_percent_of_average() {
        let svc = service_with_hrv(&[
            ("2026-02-06", 50.0),
            ("2026-02-07", 52.0),
            ("2026-02-08", 48.0),
            ("2026-02-09", 30.0),
        ])
        .await;
        let alerts = svc.check(d("2026-02-09"), false).await.expect("check");
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, "hrv_drop");
        assert_eq!(alerts[0].severity, Severity::Red);
    }

    #[tokio::test]
    async fn hrv_drop_needs_three_days_of_history() {
        let svc = service_with_hrv(&[("2026-02-08", 50.0), ("2026-02-09", 30.0)]).await;
        let alerts = svc.check(d("2026-02-09"), false).await.expect("check");
        assert!(alerts.is_empty());
    }

    #[tokio::test]
    async fn stable_hrv_stays_quiet() {
        let svc = service_with_hrv(&[
            ("2026-02-07", 50.0),
            ("2026-02-08", 48.0),
            ("2026-02-09", 49.0),
        ])
        .await;
        let alerts = svc.check(d("2026-02-09"), false).await.expect("check");
        assert!(alerts.is_empty());
    }

    #[tokio::test]
    async fn low_sleep_score_fires() {
        let rec = Arc::new(Reconciler::new(MemoryStore::new()));
        rec.reconcile("2026-02-09", SourceGroup::Wearable, &patch(&[("sleep_score", Some(55.0))]))
            .await
            .expect("write");
        let svc = AlertService::new(rec);
        let alerts = svc.check(d("2026-02-09"), false).await.expect("check");
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, "sleep_drop");
    }

    #[tokio::test]
    async fn weight_spike_compares_latest_two_entries() {
        let rec = Arc::new(Reconciler::new(MemoryStore::new()));
        for (day, weight) in [("2026-02-07", 85.0), ("2026-02-09", 87.0)] {
            rec.reconcile(day, SourceGroup::Nutrition, &patch(&[("weight_kg", Some(weight))]))
                .await
                .expect("write");
        }
        let svc = AlertService::new(rec);
        let alerts = svc.check(d("2026-02-09"), false).await.expect("check");
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, "weight_spike");
        assert!(alerts[0].message.contains("+2.0kg"));
    }

    #[tokio::test]
    async fn small_weight_change_stays_quiet() {
        let rec = Arc::new(Reconciler::new(MemoryStore::new()));
        for (day, weight) in [("2026-02-08", 85.0), ("2026-02-09", 85.8)] {
            rec.reconcile(day, SourceGroup::Nutrition, &patch(&[("weight_kg", Some(weight))]))
                .await
                .expect("write");
        }
        let svc = AlertService::new(rec);
        let alerts = svc.check(d("2026-02-09"), false).await.expect("check");
        assert!(alerts.is_empty());
    }

    #[tokio::test]
    async fn missing_nutrition_only_on_evening_check() {
        let rec = Arc::new(Reconciler::new(MemoryStore::new()));
        // One logged day followed by two unlogged days.
        rec.reconcile("2026-02-07", SourceGroup::Nutrition, &patch(&[("calories", Some(2000.0))]))
            .await
            .expect("write");
        for day in ["2026-02-08", "2026-02-09"] {
            rec.reconcile(day, SourceGroup::Wearable, &patch(&[("steps", Some(5000.0))]))
                .await
                .expect("write");
        }
        let svc = AlertService::new(rec);

        let morning = svc.check(d("2026-02-09"), false).await.expect("check");
        assert!(morning.is_empty());

        let evening = svc.check(d("2026-02-09"), true).await.expect("check");
        assert_eq!(evening.len(), 1);
        assert_eq!(evening[0].id, "missing_nutrition");
        assert!(evening[0].message.contains("2 consecutive"));
    }

    #[tokio::test]
    async fn alerts_deduplicate_within_a_day() {
        let svc = service_with_hrv(&[
            ("2026-02-06", 50.0),
            ("2026-02-07", 52.0),
            ("2026-02-08", 48.0),
            ("2026-02-09", 30.0),
        ])
        .await;
        let first = svc.check(d("2026-02-09"), false).await.expect("check");
        assert_eq!(first.len(), 1);
        let second = svc.check(d("2026-02-09"), false).await.expect("check");
        assert!(second.is_empty());
    }
}
