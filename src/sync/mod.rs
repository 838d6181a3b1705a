pub mod scheduler;
pub mod writer;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of one execution of the sync pipeline. Not persisted.
#[derive(Debug, Clone, Serialize)]
pub struct SyncRun {
    pub started_at: DateTime<Utc>,
    pub status: SyncStatus,
    pub fetched: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl SyncRun {
    fn started(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            status: SyncStatus::Success,
            fetched: 0,
            inserted: 0,
            skipped: 0,
            duration_ms: 0,
            error: None,
        }
    }

    fn overlapped(started_at: DateTime<Utc>) -> Self {
        Self {
            status: SyncStatus::SkippedOverlap,
            ..Self::started(started_at)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncStatus {
    Success,
    /// The remote returned no entries; storage was left untouched.
    Empty,
    Failed,
    /// Another run was in progress; nothing was done.
    SkippedOverlap,
}

/// Per-run totals from [`writer::upsert_many`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertCounts {
    pub inserted: usize,
    pub skipped: usize,
}
