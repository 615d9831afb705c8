//! Bulk actions on message groups
//!
//! Actions hit the remote first, then evict the affected records from the
//! local cache. The next incremental sync observes the same change from
//! the remote's history stream and is idempotent on it, so actions and
//! sync commute.

use anyhow::{Context, Result};
use log::info;
use std::sync::Arc;

use crate::gmail::MailGateway;
use crate::models::MessageId;
use crate::storage::MessageStore;

/// The label whose removal archives a message
const INBOX: &str = "INBOX";

/// Handler for archive and trash, the two bulk group actions
pub struct ActionHandler {
    gateway: Arc<dyn MailGateway>,
    store: Arc<dyn MessageStore>,
}

impl ActionHandler {
    pub fn new(gateway: Arc<dyn MailGateway>, store: Arc<dyn MessageStore>) -> Self {
        Self { gateway, store }
    }

    /// Archive messages by removing the INBOX label, then evict them from
    /// the local cache.
    pub fn archive_messages(&self, ids: &[MessageId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        info!("archiving {} messages", ids.len());
        for id in ids {
            self.gateway
                .modify_labels(id, &[], &[INBOX])
                .with_context(|| format!("archive message {}", id.as_str()))?;
        }
        self.store.delete_batch(ids)?;
        Ok(())
    }

    /// Move messages to trash, then evict them from the local cache.
    pub fn trash_messages(&self, ids: &[MessageId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        info!("trashing {} messages", ids.len());
        for id in ids {
            self.gateway
                .trash(id)
                .with_context(|| format!("trash message {}", id.as_str()))?;
        }
        self.store.delete_batch(ids)?;
        Ok(())
    }
}
