//! In-memory storage implementation
//!
//! Used by tests and as a stand-in where no durable cache is wanted.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::RwLock;

use super::traits::MessageStore;
use crate::models::{MessageId, MessageRecord};

/// In-memory implementation of [`MessageStore`]
///
/// HashMap protected by RwLocks for thread-safe access. Writes take the
/// write lock for the whole batch, which gives readers the same
/// snapshot-during-write behaviour the SQLite backend provides.
pub struct InMemoryMessageStore {
    messages: RwLock<HashMap<String, MessageRecord>>,
    history_id: RwLock<Option<String>>,
}

impl InMemoryMessageStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(HashMap::new()),
            history_id: RwLock::new(None),
        }
    }
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore for InMemoryMessageStore {
    fn upsert_batch(&self, records: &[MessageRecord]) -> Result<()> {
        let mut messages = self.messages.write().unwrap();
        for rec in records {
            messages.insert(rec.id.as_str().to_string(), rec.clone());
        }
        Ok(())
    }

    fn delete_batch(&self, ids: &[MessageId]) -> Result<()> {
        let mut messages = self.messages.write().unwrap();
        for id in ids {
            messages.remove(id.as_str());
        }
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<MessageRecord>> {
        let messages = self.messages.read().unwrap();
        Ok(messages.values().cloned().collect())
    }

    fn load_by_ids(&self, ids: &[MessageId]) -> Result<Vec<MessageRecord>> {
        let messages = self.messages.read().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| messages.get(id.as_str()).cloned())
            .collect())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.messages.read().unwrap().len())
    }

    fn last_history_id(&self) -> Result<Option<String>> {
        Ok(self.history_id.read().unwrap().clone())
    }

    fn set_last_history_id(&self, history_id: &str) -> Result<()> {
        *self.history_id.write().unwrap() = Some(history_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(id: &str, sender: &str) -> MessageRecord {
        MessageRecord {
            id: MessageId::new(id),
            sender: sender.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_upsert_and_count() {
        let store = InMemoryMessageStore::new();
        store
            .upsert_batch(&[make_record("1", "a@b.com"), make_record("2", "c@d.com")])
            .unwrap();
        assert_eq!(store.count().unwrap(), 2);

        // same ids again: still 2
        store
            .upsert_batch(&[make_record("1", "a@b.com"), make_record("2", "c@d.com")])
            .unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_delete_absent_is_ok() {
        let store = InMemoryMessageStore::new();
        store.upsert_batch(&[make_record("1", "a@b.com")]).unwrap();
        store
            .delete_batch(&[MessageId::new("1"), MessageId::new("ghost")])
            .unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_load_by_ids_skips_missing() {
        let store = InMemoryMessageStore::new();
        store.upsert_batch(&[make_record("1", "a@b.com")]).unwrap();
        let loaded = store
            .load_by_ids(&[MessageId::new("1"), MessageId::new("2")])
            .unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn test_history_id() {
        let store = InMemoryMessageStore::new();
        assert!(store.last_history_id().unwrap().is_none());
        store.set_last_history_id("7").unwrap();
        assert_eq!(store.last_history_id().unwrap().as_deref(), Some("7"));
    }
}
