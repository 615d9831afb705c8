//! First-time crawl of the remote mailbox

use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam_channel::bounded;

use super::pool::{spawn_fetch_workers, FetchOutcome};
use super::{emit, CancelToken, ProgressFn, SyncCancelled, SyncPhase, BATCH_SIZE};
use crate::gmail::MailGateway;
use crate::models::{MessageId, MessageRecord};
use crate::storage::MessageStore;

/// Worker count for the initial crawl
pub const FULL_SCAN_WORKERS: usize = 16;

/// Progress sampling rate, in records
const PROGRESS_EVERY: usize = 50;

/// What a full scan accomplished.
///
/// Per-id fetch errors, list-page errors and batch upsert errors do not
/// abort the scan; the first one is carried here next to the number of
/// records that did make it into the store.
#[derive(Debug)]
pub struct FullScanOutcome {
    pub persisted: usize,
    pub first_error: Option<anyhow::Error>,
}

/// Crawl INBOX headers into the cache and capture the mailbox cursor.
///
/// The cursor is snapshotted before listing begins, so everything the scan
/// misses is replayed by the next incremental sync. It is persisted only
/// when at least one record was stored; an entirely failed scan leaves the
/// store and cursor untouched.
pub fn full_scan(
    gateway: &Arc<dyn MailGateway>,
    store: &dyn MessageStore,
    progress: Option<ProgressFn<'_>>,
    cancel: &CancelToken,
) -> Result<FullScanOutcome> {
    emit(progress, SyncPhase::FullScanStart, 0, 0);

    // Step 1: snapshot the mailbox cursor. Failing here is fatal; nothing
    // has been listed or written yet.
    let history_id = gateway
        .current_history_id()
        .context("get current history id")?;

    let (jobs_tx, jobs_rx) = bounded::<MessageId>(1000);
    let (results_tx, results_rx) = bounded::<FetchOutcome>(1000);
    let (estimate_tx, estimate_rx) = bounded::<u32>(1);

    // Step 2: worker pool fetching metadata
    let workers = spawn_fetch_workers(gateway, jobs_rx, results_tx.clone(), cancel, FULL_SCAN_WORKERS);

    // Step 3: pager thread queues ids, page by page. A page error is
    // surfaced as a synthetic result so the collector records it.
    let pager = {
        let gateway = Arc::clone(gateway);
        let results_tx = results_tx.clone();
        let cancel = cancel.clone();
        std::thread::spawn(move || {
            let mut page_token: Option<String> = None;
            let mut first = true;
            loop {
                if cancel.is_cancelled() {
                    return;
                }
                let page = match gateway.list_inbox_ids(page_token.as_deref()) {
                    Ok(page) => page,
                    Err(err) => {
                        let _ = results_tx.send(FetchOutcome::Failed(err.context("list messages")));
                        return;
                    }
                };
                if first {
                    first = false;
                    let _ = estimate_tx.send(page.result_size_estimate.unwrap_or(0));
                }
                for msg in page.messages.unwrap_or_default() {
                    if jobs_tx.send(MessageId::new(msg.id)).is_err() {
                        return;
                    }
                }
                match page.next_page_token {
                    Some(token) => page_token = Some(token),
                    None => return,
                }
            }
        })
    };
    drop(results_tx);

    // Step 4: collect results into batches and write them out
    let mut outcome = FullScanOutcome {
        persisted: 0,
        first_error: None,
    };
    let mut buf: Vec<MessageRecord> = Vec::with_capacity(BATCH_SIZE);
    let mut done = 0usize;
    let mut total_reported = false;

    for result in results_rx.iter() {
        if !total_reported {
            if let Ok(estimate) = estimate_rx.try_recv() {
                total_reported = true;
                if estimate > 0 {
                    emit(progress, SyncPhase::FullScanStart, 0, estimate as usize);
                }
            }
        }
        match result {
            FetchOutcome::Failed(err) => {
                if outcome.first_error.is_none() {
                    outcome.first_error = Some(err);
                }
            }
            FetchOutcome::Record(rec) => {
                if rec.canonical_sender().is_empty() {
                    // skip unparsable sender
                    continue;
                }
                buf.push(rec);
                done += 1;
                if done % PROGRESS_EVERY == 0 {
                    emit(progress, SyncPhase::FullScan, done, 0);
                }
                if buf.len() >= BATCH_SIZE {
                    match store.upsert_batch(&buf) {
                        Ok(()) => outcome.persisted += buf.len(),
                        Err(err) => {
                            if outcome.first_error.is_none() {
                                outcome.first_error = Some(err);
                            }
                        }
                    }
                    emit(progress, SyncPhase::FullScan, done, 0);
                    buf.clear();
                }
            }
        }
    }

    for handle in workers {
        let _ = handle.join();
    }
    let _ = pager.join();

    if !buf.is_empty() {
        match store.upsert_batch(&buf) {
            Ok(()) => outcome.persisted += buf.len(),
            Err(err) => {
                if outcome.first_error.is_none() {
                    outcome.first_error = Some(err);
                }
            }
        }
        emit(progress, SyncPhase::FullScan, done, 0);
    }

    // Step 5: persist the snapshot cursor once anything made it in
    if outcome.persisted > 0 {
        if let Err(err) = store.set_last_history_id(&history_id) {
            if outcome.first_error.is_none() {
                outcome.first_error = Some(err);
            }
        }
    }

    if cancel.is_cancelled() && outcome.first_error.is_none() {
        outcome.first_error = Some(SyncCancelled.into());
    }

    emit(progress, SyncPhase::FullScanDone, done, 0);
    log::info!(
        "full scan finished: {} records persisted{}",
        outcome.persisted,
        if outcome.first_error.is_some() {
            " (with errors)"
        } else {
            ""
        }
    );

    Ok(outcome)
}
