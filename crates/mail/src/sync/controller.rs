//! Startup and resync orchestration
//!
//! The façade the UI drives. A populated cache is shown immediately while
//! catch-up runs in the background; an empty cache triggers a full scan
//! with streamed progress.

use std::sync::{Arc, Mutex};

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::{full_scan, load_groups, sync_since_history, CancelToken, SyncProgress};
use crate::gmail::{HistoryExpiredError, MailGateway};
use crate::models::SenderGroup;
use crate::storage::MessageStore;

/// Events streamed to the UI
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Coarse progress from a running scan or catch-up
    Progress(SyncProgress),
    /// Cached groups, emitted immediately on startup when the store is
    /// warm; a background catch-up is running
    CachedReady(Vec<SenderGroup>),
    /// Groups after a completed initial scan
    Ready(Vec<SenderGroup>),
    /// The initial scan failed; background catch-up failures never
    /// produce this
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Scanning,
    BackgroundCatchup,
}

/// Drives sync on behalf of the UI and reports through an event channel.
pub struct SyncController {
    gateway: Arc<dyn MailGateway>,
    store: Arc<dyn MessageStore>,
    events: Sender<SyncEvent>,
    state: Arc<Mutex<State>>,
    cancel: CancelToken,
}

impl SyncController {
    /// Create a controller and the event stream the UI consumes.
    pub fn new(
        gateway: Arc<dyn MailGateway>,
        store: Arc<dyn MessageStore>,
    ) -> (Self, Receiver<SyncEvent>) {
        let (events, receiver) = unbounded();
        (
            Self {
                gateway,
                store,
                events,
                state: Arc::new(Mutex::new(State::Idle)),
                cancel: CancelToken::new(),
            },
            receiver,
        )
    }

    /// Cancellation handle shared by everything this controller launches.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Startup entry point: emit cached groups right away when the store
    /// is warm and catch up in the background, otherwise run a full scan.
    pub fn start(&self) {
        self.launch(true);
    }

    /// User-initiated resync. Same transitions as startup, but the cached
    /// snapshot is not re-emitted.
    pub fn resync(&self) {
        self.launch(false);
    }

    fn launch(&self, emit_cached: bool) {
        let count = {
            let mut state = self.state.lock().unwrap();
            if *state != State::Idle {
                return;
            }
            let count = match self.store.count() {
                Ok(count) => count,
                Err(err) => {
                    let _ = self.events.send(SyncEvent::Failed(format!("{err:#}")));
                    return;
                }
            };
            *state = if count > 0 {
                State::BackgroundCatchup
            } else {
                State::Scanning
            };
            count
        };

        if count > 0 {
            if emit_cached {
                match load_groups(self.store.as_ref()) {
                    Ok(groups) => {
                        let _ = self.events.send(SyncEvent::CachedReady(groups));
                    }
                    Err(err) => log::warn!("failed to load cached groups: {err:#}"),
                }
            }
            self.spawn_catchup();
        } else {
            self.spawn_scan();
        }
    }

    fn spawn_catchup(&self) {
        let gateway = Arc::clone(&self.gateway);
        let store = Arc::clone(&self.store);
        let events = self.events.clone();
        let state = Arc::clone(&self.state);
        let cancel = self.cancel.clone();

        std::thread::spawn(move || {
            let progress = |p: SyncProgress| {
                let _ = events.send(SyncEvent::Progress(p));
            };
            let result = match store.last_history_id() {
                Ok(Some(history_id)) => {
                    sync_since_history(&gateway, store.as_ref(), &history_id, Some(&progress), &cancel)
                }
                Ok(None) => Err(anyhow::anyhow!("no stored history id")),
                Err(err) => Err(err),
            };
            // Catch-up failures never reach the UI; the cursor stayed put
            // and the next sync retries from the same point.
            if let Err(err) = result {
                if err.downcast_ref::<HistoryExpiredError>().is_some() {
                    log::warn!("history cursor expired; clear the cache to force a full rescan");
                } else {
                    log::warn!("background catch-up failed: {err:#}");
                }
            }
            *state.lock().unwrap() = State::Idle;
        });
    }

    fn spawn_scan(&self) {
        let gateway = Arc::clone(&self.gateway);
        let store = Arc::clone(&self.store);
        let events = self.events.clone();
        let state = Arc::clone(&self.state);
        let cancel = self.cancel.clone();

        std::thread::spawn(move || {
            let progress = |p: SyncProgress| {
                let _ = events.send(SyncEvent::Progress(p));
            };
            let event = match full_scan(&gateway, store.as_ref(), Some(&progress), &cancel) {
                Ok(outcome) => match outcome.first_error {
                    Some(err) => SyncEvent::Failed(format!("{err:#}")),
                    None => match load_groups(store.as_ref()) {
                        Ok(groups) => SyncEvent::Ready(groups),
                        Err(err) => SyncEvent::Failed(format!("{err:#}")),
                    },
                },
                Err(err) => SyncEvent::Failed(format!("{err:#}")),
            };
            let _ = events.send(event);
            *state.lock().unwrap() = State::Idle;
        });
    }
}
