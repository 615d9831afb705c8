//! Incremental catch-up from the stored history cursor

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use super::pool::fetch_metadata;
use super::{emit, CancelToken, ProgressFn, SyncCancelled, SyncPhase};
use crate::gmail::MailGateway;
use crate::models::MessageId;
use crate::storage::MessageStore;

/// Worker count for catch-up metadata fetches
pub const CATCHUP_WORKERS: usize = 8;

/// The INBOX label, the only one this cache tracks
const INBOX: &str = "INBOX";

/// Replay remote history since `last_history_id` into the local cache.
///
/// History events collapse into two disjoint sets: ids to (re)fetch and
/// ids to evict. Events are applied in on-the-wire order, later events
/// overriding earlier ones for the same id, which is what makes the
/// collapse correct.
///
/// Unlike the full scan, any failure here is fatal and leaves the cursor
/// untouched, so the next attempt replays from the same point
/// (at-least-once, and every applied operation is idempotent).
pub fn sync_since_history(
    gateway: &Arc<dyn MailGateway>,
    store: &dyn MessageStore,
    last_history_id: &str,
    progress: Option<ProgressFn<'_>>,
    cancel: &CancelToken,
) -> Result<()> {
    let last_history_id = last_history_id.trim();
    if last_history_id.is_empty() {
        bail!("no stored history id; a full scan is required first");
    }
    let start_id: u64 = last_history_id
        .parse()
        .with_context(|| format!("invalid stored history id {last_history_id:?}"))?;

    let mut add_set: HashSet<MessageId> = HashSet::new();
    let mut del_set: HashSet<MessageId> = HashSet::new();
    let mut newest_seen: u64 = 0;

    // Walk history pages, folding events into the add/del sets.
    let mut page_token: Option<String> = None;
    loop {
        if cancel.is_cancelled() {
            return Err(SyncCancelled.into());
        }
        let page = gateway
            .list_history(start_id, page_token.as_deref())
            .context("history list")?;

        if let Some(history_id) = &page.history_id {
            newest_seen = newest_seen.max(history_id.parse().unwrap_or(0));
        }
        for record in page.history.unwrap_or_default() {
            newest_seen = newest_seen.max(record.id.parse().unwrap_or(0));

            for added in record.messages_added.unwrap_or_default() {
                // only additions that actually land in INBOX matter here
                if added.message.has_label(INBOX) {
                    let id = MessageId::new(added.message.id);
                    del_set.remove(&id);
                    add_set.insert(id);
                }
            }
            for deleted in record.messages_deleted.unwrap_or_default() {
                let id = MessageId::new(deleted.message.id);
                add_set.remove(&id);
                del_set.insert(id);
            }
            for change in record.labels_added.unwrap_or_default() {
                if change.label_ids.iter().any(|l| l == INBOX) {
                    let id = MessageId::new(change.message.id);
                    del_set.remove(&id);
                    add_set.insert(id);
                }
            }
            for change in record.labels_removed.unwrap_or_default() {
                // removal from INBOX tombstones the cached copy, even if
                // the message lives on under another label
                if change.label_ids.iter().any(|l| l == INBOX) {
                    let id = MessageId::new(change.message.id);
                    add_set.remove(&id);
                    del_set.insert(id);
                }
            }
        }

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    let total = add_set.len() + del_set.len();
    emit(progress, SyncPhase::HistoryStart, 0, total);

    // Fetch metadata for the additions and apply them.
    if !add_set.is_empty() {
        let add_ids: Vec<MessageId> = add_set.into_iter().collect();
        let (records, first_error) = fetch_metadata(gateway, &add_ids, CATCHUP_WORKERS, cancel);
        if let Some(err) = first_error {
            // Surface before applying anything: the cursor stays put and
            // the whole span is replayed next time.
            return Err(err);
        }
        if cancel.is_cancelled() {
            return Err(SyncCancelled.into());
        }
        store.upsert_batch(&records)?;
        emit(progress, SyncPhase::History, add_ids.len(), total);
    }

    // Apply evictions.
    if !del_set.is_empty() {
        let del_ids: Vec<MessageId> = del_set.into_iter().collect();
        store.delete_batch(&del_ids)?;
        emit(progress, SyncPhase::History, total, total);
    }

    // Persist the newest observed cursor; an empty history stream falls
    // back to the mailbox's current one.
    let newest = if newest_seen > 0 {
        newest_seen.to_string()
    } else {
        gateway
            .current_history_id()
            .context("get current history id")?
    };
    store.set_last_history_id(&newest)?;

    emit(progress, SyncPhase::HistoryDone, total, total);
    log::debug!("incremental sync applied {} changes", total);
    Ok(())
}
