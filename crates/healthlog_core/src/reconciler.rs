//! The reconcile engine: load, merge, compare-and-swap, with bounded
//! retries for storage outages and for lost CAS races.

use chrono::NaiveDate;
use metrics::counter;

use crate::aggregate::WeeklyAggregate;
use crate::retry::RetryPolicy;
use crate::store::{RecordStore, StoreError};
use crate::{DailyRecord, FieldPatch, ReconcileEntry, ReconcileError, SourceGroup, dates};

/// CAS retries before a reconcile call gives up with `ConcurrencyConflict`.
const DEFAULT_CONFLICT_RETRIES: u32 = 5;

pub struct Reconciler<S> {
    store: S,
    retry: RetryPolicy,
    conflict_retries: u32,
}

/// Result of an ordered batch application. Per-entry failures are collected
/// here rather than aborting the batch, so a backfill window with one bad
/// entry still lands the rest.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub applied: Vec<DailyRecord>,
    pub failures: Vec<BatchFailure>,
}

#[derive(Debug)]
pub struct BatchFailure {
    pub index: usize,
    pub date: String,
    pub error: ReconcileError,
}

impl<S: RecordStore> Reconciler<S> {
    pub fn new(store: S) -> Self {
        Self::with_policy(store, RetryPolicy::default(), DEFAULT_CONFLICT_RETRIES)
    }

    pub fn with_policy(store: S, retry: RetryPolicy, conflict_retries: u32) -> Self {
        Self {
            store,
            retry,
            conflict_retries,
        }
    }

    /// Merge one partial update for `group` into the record for `date` and
    /// return the full updated record.
    ///
    /// Validation failures reject before any store access; a lost CAS race
    /// reloads and reapplies, so concurrent writers to the two source
    /// groups on one date never lose each other's fields.
    pub async fn reconcile(
        &self,
        date: &str,
        group: SourceGroup,
        fields: &FieldPatch,
    ) -> Result<DailyRecord, ReconcileError> {
        let day = dates::parse_date(date)?;
        if let Err(e) = group.validate(fields) {
            counter!("healthlog_reconcile_rejected_total").increment(1);
            return Err(e);
        }

        let mut attempt = 0u32;
        loop {
            let existing = self
                .retrying(|| self.store.load(day))
                .await
                .map_err(|e| self.store_failure(day, e))?;
            let (expected, mut record) = match existing {
                Some((version, record)) => (Some(version), record),
                None => (None, DailyRecord::new(day)),
            };
            record.merge(fields);
            record.recompute_derived();

            let stored = self
                .retrying(|| self.store.store(day, expected, record.clone()))
                .await;
            match stored {
                Ok(_) => {
                    counter!("healthlog_reconcile_applied_total").increment(1);
                    tracing::debug!(date = %day, source = %group, fields = fields.len(), "reconciled");
                    return Ok(record);
                }
                Err(StoreError::Conflict) => {
                    attempt += 1;
                    counter!("healthlog_reconcile_conflict_retries_total").increment(1);
                    if attempt > self.conflict_retries {
                        return Err(ReconcileError::ConcurrencyConflict { date: day });
                    }
                }
                Err(e) => return Err(self.store_failure(day, e)),
            }
        }
    }

    /// Apply an ordered sequence of entries, one reconcile each. Duplicate
    /// and overlapping entries are safe: re-applying identical data is a
    /// no-op by the merge semantics.
    pub async fn reconcile_batch(&self, entries: &[ReconcileEntry]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for (index, entry) in entries.iter().enumerate() {
            match self.reconcile(&entry.date, entry.group, &entry.fields).await {
                Ok(record) => outcome.applied.push(record),
                Err(error) => {
                    tracing::warn!(date = %entry.date, %error, "batch entry failed");
                    outcome.failures.push(BatchFailure {
                        index,
                        date: entry.date.clone(),
                        error,
                    });
                }
            }
        }
        tracing::info!(
            applied = outcome.applied.len(),
            failed = outcome.failures.len(),
            "batch reconcile finished"
        );
        outcome
    }

    /// All records with `start <= date <= end`, ascending. An inverted
    /// range is empty, not an error.
    pub async fn get_range(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<DailyRecord>, ReconcileError> {
        let start = dates::parse_date(start)?;
        let end = dates::parse_date(end)?;
        if start > end {
            return Ok(Vec::new());
        }
        self.retrying(|| self.store.scan(start, end))
            .await
            .map_err(|e| self.store_failure(start, e))
    }

    /// Weekly aggregate for the Monday-start week at `week_start`, with
    /// the weight delta computed against the prior week's records.
    pub async fn weekly_aggregate(
        &self,
        week_start: &str,
    ) -> Result<WeeklyAggregate, ReconcileError> {
        let monday = dates::parse_date(week_start)?;
        if !dates::is_monday(monday) {
            return Err(ReconcileError::InvalidDate {
                input: week_start.to_string(),
                reason: "week start must be a Monday".to_string(),
            });
        }
        let (_, sunday) = dates::week_bounds(monday);
        let (prev_monday, prev_sunday) = dates::previous_week(monday);

        let days = self
            .retrying(|| self.store.scan(monday, sunday))
            .await
            .map_err(|e| self.store_failure(monday, e))?;
        let prior = self
            .retrying(|| self.store.scan(prev_monday, prev_sunday))
            .await
            .map_err(|e| self.store_failure(monday, e))?;
        Ok(WeeklyAggregate::compute(monday, &days, &prior))
    }

    /// Run one store operation, retrying `Unavailable` with backoff up to
    /// the policy's budget. `Conflict` is not retried here; the reconcile
    /// loop handles it by reloading.
    async fn retrying<T, F, Fut>(&self, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(StoreError::Conflict) => return Err(StoreError::Conflict),
                Err(StoreError::Unavailable(reason)) => {
                    attempt += 1;
                    if attempt > self.retry.max_retries {
                        return Err(StoreError::Unavailable(reason));
                    }
                    tracing::warn!(attempt, %reason, "store unavailable, backing off");
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                }
            }
        }
    }

    fn store_failure(&self, date: NaiveDate, err: StoreError) -> ReconcileError {
        match err {
            StoreError::Conflict => ReconcileError::ConcurrencyConflict { date },
            StoreError::Unavailable(reason) => ReconcileError::StorageUnavailable {
                attempts: self.retry.max_retries + 1,
                reason,
            },
        }
    }
}
