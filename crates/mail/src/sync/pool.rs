//! Bounded-concurrency metadata fetching
//!
//! A fixed number of worker threads share an id queue and emit decoded
//! records onto a result queue. A failed id is reported and skipped; the
//! pool never aborts because one message failed. Output order is
//! unspecified, so consumers must be order-independent.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};

use super::CancelToken;
use crate::gmail::{decode_metadata, MailGateway};
use crate::models::{MessageId, MessageRecord};

/// One result per consumed id
pub(crate) enum FetchOutcome {
    Record(MessageRecord),
    Failed(anyhow::Error),
}

/// Spawn `count` workers draining `jobs` into `results`.
///
/// Cancellation is honoured at every id boundary: a cancelled worker keeps
/// consuming ids without fetching them, so producers blocked on a full
/// queue always make progress and the pool winds down cleanly.
pub(crate) fn spawn_fetch_workers(
    gateway: &Arc<dyn MailGateway>,
    jobs: Receiver<MessageId>,
    results: Sender<FetchOutcome>,
    cancel: &CancelToken,
    count: usize,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|_| {
            let gateway = Arc::clone(gateway);
            let jobs = jobs.clone();
            let results = results.clone();
            let cancel = cancel.clone();
            std::thread::spawn(move || {
                for id in jobs.iter() {
                    if cancel.is_cancelled() {
                        continue;
                    }
                    let outcome = match gateway.get_metadata(&id) {
                        Ok(msg) => FetchOutcome::Record(decode_metadata(&msg)),
                        Err(err) => FetchOutcome::Failed(err),
                    };
                    if results.send(outcome).is_err() {
                        return;
                    }
                }
            })
        })
        .collect()
}

/// Fetch metadata for a fixed id set and collect the survivors.
///
/// Records whose sender does not normalize are dropped. The first per-id
/// error is returned alongside whatever was fetched successfully.
pub(crate) fn fetch_metadata(
    gateway: &Arc<dyn MailGateway>,
    ids: &[MessageId],
    workers: usize,
    cancel: &CancelToken,
) -> (Vec<MessageRecord>, Option<anyhow::Error>) {
    if ids.is_empty() {
        return (Vec::new(), None);
    }

    let (jobs_tx, jobs_rx) = bounded(ids.len());
    let (results_tx, results_rx) = bounded(ids.len());

    let handles = spawn_fetch_workers(gateway, jobs_rx, results_tx, cancel, workers);

    for id in ids {
        // the channel holds the whole set, so this never blocks
        let _ = jobs_tx.send(id.clone());
    }
    drop(jobs_tx);

    let mut records = Vec::with_capacity(ids.len());
    let mut first_error = None;
    for outcome in results_rx.iter() {
        match outcome {
            FetchOutcome::Record(rec) => {
                if rec.canonical_sender().is_empty() {
                    continue;
                }
                records.push(rec);
            }
            FetchOutcome::Failed(err) => {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }

    for handle in handles {
        let _ = handle.join();
    }

    (records, first_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::api::{
        GmailMessage, Header, HistoryResponse, ListMessagesResponse, MessagePayload,
    };
    use anyhow::{anyhow, Result};
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Gateway stub serving canned metadata, with optional failing ids
    struct StubGateway {
        failing: HashSet<String>,
        served: Mutex<Vec<String>>,
    }

    impl StubGateway {
        fn new(failing: &[&str]) -> Self {
            Self {
                failing: failing.iter().map(|s| s.to_string()).collect(),
                served: Mutex::new(Vec::new()),
            }
        }
    }

    impl MailGateway for StubGateway {
        fn list_inbox_ids(&self, _page_token: Option<&str>) -> Result<ListMessagesResponse> {
            unimplemented!("not used by the pool")
        }

        fn get_metadata(&self, id: &MessageId) -> Result<GmailMessage> {
            self.served.lock().unwrap().push(id.as_str().to_string());
            if self.failing.contains(id.as_str()) {
                return Err(anyhow!("metadata fetch failed for {}", id.as_str()));
            }
            Ok(GmailMessage {
                id: id.as_str().to_string(),
                payload: Some(MessagePayload {
                    headers: Some(vec![
                        Header {
                            name: "From".to_string(),
                            value: format!("sender-{}@example.com", id.as_str()),
                        },
                        Header {
                            name: "Subject".to_string(),
                            value: "S".to_string(),
                        },
                    ]),
                    mime_type: None,
                }),
                ..Default::default()
            })
        }

        fn get_full(&self, _id: &MessageId) -> Result<GmailMessage> {
            unimplemented!("not used by the pool")
        }

        fn list_history(
            &self,
            _start_history_id: u64,
            _page_token: Option<&str>,
        ) -> Result<HistoryResponse> {
            unimplemented!("not used by the pool")
        }

        fn current_history_id(&self) -> Result<String> {
            unimplemented!("not used by the pool")
        }

        fn modify_labels(&self, _id: &MessageId, _add: &[&str], _remove: &[&str]) -> Result<()> {
            unimplemented!("not used by the pool")
        }

        fn trash(&self, _id: &MessageId) -> Result<()> {
            unimplemented!("not used by the pool")
        }
    }

    fn ids(names: &[&str]) -> Vec<MessageId> {
        names.iter().map(|s| MessageId::new(*s)).collect()
    }

    #[test]
    fn test_fetch_all_succeed() {
        let gateway: Arc<dyn MailGateway> = Arc::new(StubGateway::new(&[]));
        let cancel = CancelToken::new();
        let (records, err) = fetch_metadata(&gateway, &ids(&["a", "b", "c"]), 2, &cancel);
        assert!(err.is_none());
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_per_id_errors_are_isolated() {
        let gateway: Arc<dyn MailGateway> = Arc::new(StubGateway::new(&["b", "d"]));
        let cancel = CancelToken::new();
        let (records, err) =
            fetch_metadata(&gateway, &ids(&["a", "b", "c", "d", "e"]), 3, &cancel);
        assert_eq!(records.len(), 3);
        assert!(err.is_some());
    }

    #[test]
    fn test_cancelled_pool_drains_without_fetching() {
        let stub = Arc::new(StubGateway::new(&[]));
        let gateway: Arc<dyn MailGateway> = stub.clone();
        let cancel = CancelToken::new();
        cancel.cancel();
        let (records, err) = fetch_metadata(&gateway, &ids(&["a", "b", "c"]), 2, &cancel);
        assert!(records.is_empty());
        assert!(err.is_none());
        assert!(stub.served.lock().unwrap().is_empty());
    }
}
