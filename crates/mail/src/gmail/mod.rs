//! Gmail API integration
//!
//! This module provides:
//! - The [`MailGateway`] trait the sync engine depends on
//! - An HTTP client implementation backed by the Gmail REST API
//! - OAuth2 token management (refresh + cache; the interactive browser
//!   flow is owned by the embedding application)
//! - Decoding of metadata responses into domain records

mod auth;
mod client;
mod decode;

pub use auth::{GmailAuth, StoredToken};
pub use client::{GmailClient, HistoryExpiredError};
pub use decode::{decode_metadata, parse_date_rfc3339, METADATA_HEADERS};

use anyhow::Result;

use self::api::{GmailMessage, HistoryResponse, ListMessagesResponse};
use crate::models::MessageId;

/// Remote mailbox capability set the sync engine is written against.
///
/// Any provider implementing these operations is pluggable; tests use a
/// scripted fake with a canned id stream and event log.
pub trait MailGateway: Send + Sync {
    /// List message ids in INBOX, one page at a time.
    fn list_inbox_ids(&self, page_token: Option<&str>) -> Result<ListMessagesResponse>;

    /// Fetch the grouping-relevant headers for one message.
    fn get_metadata(&self, id: &MessageId) -> Result<GmailMessage>;

    /// Fetch a full message. Used only by the message body view.
    fn get_full(&self, id: &MessageId) -> Result<GmailMessage>;

    /// List history events since a cursor, filtered to INBOX, one page at
    /// a time. A rejected cursor surfaces as [`HistoryExpiredError`].
    fn list_history(
        &self,
        start_history_id: u64,
        page_token: Option<&str>,
    ) -> Result<HistoryResponse>;

    /// The mailbox's current history cursor.
    fn current_history_id(&self) -> Result<String>;

    /// Add and/or remove labels on one message.
    fn modify_labels(&self, id: &MessageId, add: &[&str], remove: &[&str]) -> Result<()>;

    /// Move one message to trash.
    fn trash(&self, id: &MessageId) -> Result<()>;
}

/// Gmail API request and response types
pub mod api {
    use serde::{Deserialize, Serialize};

    /// Request body for modifying message labels
    /// POST /gmail/v1/users/me/messages/{id}/modify
    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ModifyMessageRequest {
        /// Label IDs to add
        #[serde(skip_serializing_if = "Vec::is_empty")]
        pub add_label_ids: Vec<String>,
        /// Label IDs to remove
        #[serde(skip_serializing_if = "Vec::is_empty")]
        pub remove_label_ids: Vec<String>,
    }

    /// Response from listing messages
    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListMessagesResponse {
        pub messages: Option<Vec<MessageRef>>,
        pub next_page_token: Option<String>,
        pub result_size_estimate: Option<u32>,
    }

    /// Reference to a message (just ID and thread ID)
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageRef {
        pub id: String,
        #[serde(default)]
        pub thread_id: Option<String>,
    }

    /// Message as returned by the metadata and full formats
    #[derive(Debug, Clone, Default, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailMessage {
        pub id: String,
        #[serde(default)]
        pub thread_id: Option<String>,
        #[serde(default)]
        pub label_ids: Option<Vec<String>>,
        #[serde(default)]
        pub snippet: Option<String>,
        #[serde(default)]
        pub internal_date: Option<String>,
        #[serde(default)]
        pub payload: Option<MessagePayload>,
    }

    /// Message payload containing headers (and, for full fetches, parts)
    #[derive(Debug, Clone, Default, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePayload {
        #[serde(default)]
        pub headers: Option<Vec<Header>>,
        #[serde(default)]
        pub mime_type: Option<String>,
    }

    /// Email header (name-value pair)
    #[derive(Debug, Clone, Deserialize, Serialize)]
    pub struct Header {
        pub name: String,
        pub value: String,
    }

    /// Response from the Gmail History API
    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct HistoryResponse {
        /// The mailbox cursor as of this response
        pub history_id: Option<String>,
        /// History records since the requested cursor
        pub history: Option<Vec<HistoryRecord>>,
        /// Token for the next page (if paginated)
        pub next_page_token: Option<String>,
    }

    /// A single history record containing changes
    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct HistoryRecord {
        /// The cursor value of this record
        pub id: String,
        /// Messages added to the mailbox
        #[serde(default)]
        pub messages_added: Option<Vec<MessageAdded>>,
        /// Messages deleted from the mailbox
        #[serde(default)]
        pub messages_deleted: Option<Vec<MessageDeleted>>,
        /// Labels added to messages
        #[serde(default)]
        pub labels_added: Option<Vec<LabelChange>>,
        /// Labels removed from messages
        #[serde(default)]
        pub labels_removed: Option<Vec<LabelChange>>,
    }

    /// Message referenced by a history event, with its label set
    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct HistoryMessage {
        pub id: String,
        #[serde(default)]
        pub label_ids: Option<Vec<String>>,
    }

    impl HistoryMessage {
        pub fn has_label(&self, label: &str) -> bool {
            self.label_ids
                .as_deref()
                .is_some_and(|ids| ids.iter().any(|l| l == label))
        }
    }

    /// Message added to mailbox
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageAdded {
        pub message: HistoryMessage,
    }

    /// Message deleted from mailbox
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageDeleted {
        pub message: HistoryMessage,
    }

    /// Label change on a message
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct LabelChange {
        pub message: HistoryMessage,
        #[serde(default)]
        pub label_ids: Vec<String>,
    }

    /// Response from the Gmail Profile API (GET /users/me/profile)
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ProfileResponse {
        /// The user's email address
        pub email_address: String,
        /// Total number of messages in the mailbox
        pub messages_total: Option<u32>,
        /// The current mailbox cursor for incremental sync
        pub history_id: String,
    }
}
