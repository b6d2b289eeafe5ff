//! Service layer over the reconciliation engine: wearable backfill sync,
//! manual nutrition entries, alert rules and weekly reporting.

pub mod alerts;
pub mod entry;
pub mod error;
pub mod summary;
pub mod sync;

pub use alerts::{Alert, AlertService, Severity};
pub use entry::ManualEntry;
pub use error::{ServiceError, ServiceResult};
pub use summary::{WeeklyReport, WeeklyReporter};
pub use sync::{SyncReport, SyncService, WearableSource};
