//! Sync engine: initial crawl and history-based catch-up
//!
//! A first-time full scan crawls INBOX headers into the local cache and
//! captures the mailbox cursor; later runs catch up incrementally from
//! that cursor. Both paths are idempotent and safe to retry.

mod controller;
mod full_scan;
mod incremental;
mod pool;

pub use controller::{SyncController, SyncEvent};
pub use full_scan::{full_scan, FullScanOutcome, FULL_SCAN_WORKERS};
pub use incremental::{sync_since_history, CATCHUP_WORKERS};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;

use crate::group::{aggregate_by_sender_subject, sort_groups};
use crate::models::SenderGroup;
use crate::storage::MessageStore;

/// Batch size for store writes and gateway paging
pub(crate) const BATCH_SIZE: usize = 500;

/// Phases reported while a scan or catch-up runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    FullScanStart,
    FullScan,
    FullScanDone,
    HistoryStart,
    History,
    HistoryDone,
}

impl SyncPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncPhase::FullScanStart => "fullscan-start",
            SyncPhase::FullScan => "fullscan",
            SyncPhase::FullScanDone => "fullscan-done",
            SyncPhase::HistoryStart => "history-start",
            SyncPhase::History => "history",
            SyncPhase::HistoryDone => "history-done",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse progress event streamed to the UI.
///
/// `total` is 0 when unknown (the remote gave no size estimate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncProgress {
    pub phase: SyncPhase,
    pub done: usize,
    pub total: usize,
}

/// Callback invoked with progress events
pub type ProgressFn<'a> = &'a (dyn Fn(SyncProgress) + Sync);

pub(crate) fn emit(progress: Option<ProgressFn<'_>>, phase: SyncPhase, done: usize, total: usize) {
    if let Some(report) = progress {
        report(SyncProgress { phase, done, total });
    }
}

/// Error returned by long-running operations that observed cancellation.
/// Everything committed before the cancellation remains valid.
#[derive(Debug, thiserror::Error)]
#[error("sync cancelled")]
pub struct SyncCancelled;

/// Shared cancellation handle checked at id and page boundaries
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Load cached records and aggregate them into sorted groups.
pub fn load_groups(store: &dyn MessageStore) -> Result<Vec<SenderGroup>> {
    let records = store.load_all()?;
    Ok(sort_groups(aggregate_by_sender_subject(&records)))
}
