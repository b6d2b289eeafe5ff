//! Wearable backfill sync: fetch a trailing window of per-day patches from
//! the provider and feed them through the reconciler. The provider client
//! itself lives behind [`WearableSource`]; re-delivery of already-applied
//! days is harmless by the engine's idempotence.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use metrics::counter;
use schemars::JsonSchema;
use serde::Serialize;

use healthlog_core::retry::RetryPolicy;
use healthlog_core::{FieldPatch, ReconcileEntry, Reconciler, RecordStore, SourceGroup};

use crate::error::ServiceResult;

#[async_trait]
pub trait WearableSource: Send + Sync + 'static {
    /// Per-day wearable patches for `start..=end`. Days with no data are
    /// simply absent from the map.
    async fn fetch_daily(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ServiceResult<BTreeMap<NaiveDate, FieldPatch>>;
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct SyncReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days_fetched: usize,
    pub days_updated: usize,
    pub errors: Vec<String>,
}

pub struct SyncService<S, W> {
    reconciler: Arc<Reconciler<S>>,
    source: W,
    backfill_days: u32,
    retry: RetryPolicy,
}

impl<S: RecordStore, W: WearableSource> SyncService<S, W> {
    pub fn new(reconciler: Arc<Reconciler<S>>, source: W, backfill_days: u32) -> Self {
        Self {
            reconciler,
            source,
            backfill_days,
            retry: RetryPolicy::default(),
        }
    }

    /// Sync the trailing backfill window ending at `today`.
    pub async fn run(&self, today: NaiveDate) -> SyncReport {
        let start = today - Days::new(u64::from(self.backfill_days));
        tracing::info!(%start, end = %today, days = self.backfill_days, "wearable sync starting");

        let fetched = match self
            .retry
            .retry_async(|| self.source.fetch_daily(start, today))
            .await
        {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(error = %e, "wearable fetch failed");
                return SyncReport {
                    start,
                    end: today,
                    days_fetched: 0,
                    days_updated: 0,
                    errors: vec![e.to_string()],
                };
            }
        };

        if fetched.is_empty() {
            tracing::warn!("no wearable data returned for the date range");
            return SyncReport {
                start,
                end: today,
                days_fetched: 0,
                days_updated: 0,
                errors: Vec::new(),
            };
        }

        let entries: Vec<ReconcileEntry> = fetched
            .iter()
            .map(|(date, fields)| ReconcileEntry {
                date: date.format("%Y-%m-%d").to_string(),
                group: SourceGroup::Wearable,
                fields: fields.clone(),
            })
            .collect();
        let outcome = self.reconciler.reconcile_batch(&entries).await;

        counter!("healthlog_sync_runs_total").increment(1);
        tracing::info!(
            fetched = fetched.len(),
            updated = outcome.applied.len(),
            failed = outcome.failures.len(),
            "wearable sync finished"
        );
        SyncReport {
            start,
            end: today,
            days_fetched: fetched.len(),
            days_updated: outcome.applied.len(),
            errors: outcome
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.date, f.error))
                .collect(),
        }
    }
}
