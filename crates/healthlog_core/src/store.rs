//! Record persistence behind a versioned compare-and-swap interface.
//!
//! The reconciler's read-modify-write cycle is made atomic per date by CAS:
//! a writer that lost the race gets [`StoreError::Conflict`] and reloads.
//! Whole records are swapped in one step, so readers never observe a
//! partially applied merge.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::DailyRecord;

pub type Version = u64;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The record changed under the writer; reload and reapply.
    #[error("version conflict")]
    Conflict,
    /// The backing store could not be reached; safe to retry.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Current version and record for `date`, if any.
    async fn load(&self, date: NaiveDate) -> Result<Option<(Version, DailyRecord)>, StoreError>;

    /// Replace the record for `date` atomically. `expected = None` creates;
    /// any version mismatch (including create-over-existing) fails with
    /// [`StoreError::Conflict`] without mutating anything.
    async fn store(
        &self,
        date: NaiveDate,
        expected: Option<Version>,
        record: DailyRecord,
    ) -> Result<Version, StoreError>;

    /// All records with `start <= date <= end`, ascending by date.
    async fn scan(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailyRecord>, StoreError>;
}

type RowMap = BTreeMap<NaiveDate, (Version, DailyRecord)>;

fn check_cas(rows: &RowMap, date: NaiveDate, expected: Option<Version>) -> Result<Version, StoreError> {
    match (rows.get(&date), expected) {
        (None, None) => Ok(1),
        (Some((current, _)), Some(v)) if *current == v => Ok(v + 1),
        _ => Err(StoreError::Conflict),
    }
}

/// In-memory store; the default for tests and ephemeral runs.
#[derive(Clone, Default)]
pub struct MemoryStore {
    rows: Arc<Mutex<RowMap>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn load(&self, date: NaiveDate) -> Result<Option<(Version, DailyRecord)>, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows.get(&date).cloned())
    }

    async fn store(
        &self,
        date: NaiveDate,
        expected: Option<Version>,
        record: DailyRecord,
    ) -> Result<Version, StoreError> {
        let mut rows = self.rows.lock().await;
        let next = check_cas(&rows, date, expected)?;
        rows.insert(date, (next, record));
        Ok(next)
    }

    async fn scan(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailyRecord>, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows.range(start..=end).map(|(_, (_, r))| r.clone()).collect())
    }
}

#[derive(Serialize, Deserialize)]
struct StoredRow {
    version: Version,
    record: DailyRecord,
}

/// File-backed store: one JSON snapshot per data file, hydrated at open and
/// rewritten via temp-file + rename after every successful write. I/O
/// failures surface as [`StoreError::Unavailable`] and are retryable; the
/// in-memory view is only committed once the snapshot landed on disk.
#[derive(Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    rows: Arc<Mutex<RowMap>>,
}

impl JsonFileStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let rows = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: BTreeMap<NaiveDate, StoredRow> = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Unavailable(format!("snapshot parse error: {e}")))?;
                snapshot
                    .into_iter()
                    .map(|(d, row)| (d, (row.version, row.record)))
                    .collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RowMap::new(),
            Err(e) => return Err(StoreError::Unavailable(e.to_string())),
        };
        tracing::debug!(path = %path.display(), records = rows.len(), "opened record snapshot");
        Ok(Self {
            path,
            rows: Arc::new(Mutex::new(rows)),
        })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    async fn persist(&self, rows: &RowMap) -> Result<(), StoreError> {
        let snapshot: BTreeMap<&NaiveDate, StoredRow> = rows
            .iter()
            .map(|(d, (version, record))| {
                (
                    d,
                    StoredRow {
                        version: *version,
                        record: record.clone(),
                    },
                )
            })
            .collect();
        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn load(&self, date: NaiveDate) -> Result<Option<(Version, DailyRecord)>, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows.get(&date).cloned())
    }

    async fn store(
        &self,
        date: NaiveDate,
        expected: Option<Version>,
        record: DailyRecord,
    ) -> Result<Version, StoreError> {
        let mut rows = self.rows.lock().await;
        let next = check_cas(&rows, date, expected)?;
        let mut candidate = rows.clone();
        candidate.insert(date, (next, record));
        self.persist(&candidate).await?;
        *rows = candidate;
        Ok(next)
    }

    async fn scan(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailyRecord>, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows.range(start..=end).map(|(_, (_, r))| r.clone()).collect())
    }
}
