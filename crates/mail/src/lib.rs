//! Mail crate - sync and grouping engine for Chuckterm
//!
//! This crate provides UI-independent mail functionality:
//! - Domain models (MessageRecord, SenderGroup)
//! - Gmail API gateway and OAuth token management
//! - Durable message cache behind a storage trait
//! - Bounded-concurrency full scan and history-based incremental sync
//! - Pure aggregation of records into ordered sender/subject groups
//! - Bulk archive/trash actions that commute with sync

pub mod actions;
pub mod credentials;
pub mod gmail;
pub mod group;
pub mod models;
pub mod normalize;
pub mod storage;
pub mod sync;

pub use actions::ActionHandler;
pub use credentials::GoogleCredentials;
pub use gmail::{GmailAuth, GmailClient, HistoryExpiredError, MailGateway};
pub use group::{aggregate_by_sender_subject, extract_http_unsubscribe_url, sort_groups};
pub use models::{MessageId, MessageRecord, SenderGroup};
pub use normalize::normalize_sender;
pub use storage::{InMemoryMessageStore, MessageStore, SqliteMessageStore};
pub use sync::{
    full_scan, load_groups, sync_since_history, CancelToken, FullScanOutcome, SyncCancelled,
    SyncController, SyncEvent, SyncPhase, SyncProgress,
};
