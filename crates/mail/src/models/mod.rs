//! Domain models for the sync and grouping engine

use serde::{Deserialize, Serialize};

use crate::normalize::normalize_sender;

/// Unique identifier for a message (Gmail message ID)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The minimal per-message metadata needed for grouping and bulk actions.
///
/// `sender` holds the raw `From:` header value; the canonical form used for
/// grouping is derived on demand via [`MessageRecord::canonical_sender`].
/// `date` is either an RFC 3339 UTC timestamp or empty, where empty means
/// "unknown" rather than the epoch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: MessageId,
    pub sender: String,
    pub subject: String,
    pub date: String,
    pub list_unsubscribe: String,
    pub list_unsubscribe_post: String,
}

impl MessageRecord {
    /// Normalized sender address, or empty if the header is unparsable.
    pub fn canonical_sender(&self) -> String {
        normalize_sender(&self.sender)
    }
}

/// Aggregation of messages sharing a normalized sender and exact subject.
///
/// Derived from stored records on each request; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderGroup {
    /// Normalized sender address (the first half of the group key)
    pub email: String,
    /// Exact, case-sensitive subject used for grouping (may be empty)
    pub subject: String,
    pub display_name: String,
    pub count: usize,
    /// Representative subject: the first non-empty one seen
    pub sample: String,
    /// Oldest RFC 3339 timestamp among grouped messages
    pub first_date: String,
    /// Newest RFC 3339 timestamp among grouped messages
    pub last_date: String,
    /// All message IDs in this group
    pub message_ids: Vec<MessageId>,
    /// First HTTP unsubscribe link found in the group (empty if none)
    pub unsubscribe_url: String,
}

impl SenderGroup {
    /// The map key that identifies this group.
    pub fn key(&self) -> String {
        group_key(&self.email, &self.subject)
    }
}

/// Build the grouping key for a normalized sender and exact subject.
pub fn group_key(email: &str, subject: &str) -> String {
    format!("{email}||{subject}")
}
