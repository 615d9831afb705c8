//! Storage trait definitions

use anyhow::Result;

use crate::models::{MessageId, MessageRecord};

/// Persistence capabilities required by the sync engine.
///
/// This trait abstracts over different backends (SQLite on disk,
/// in-memory for tests). Batch writes are all-or-nothing: any error
/// leaves the prior state intact. Exactly one writer runs at a time;
/// concurrent readers see a consistent snapshot during a batch write.
pub trait MessageStore: Send + Sync {
    /// Insert or replace a batch of records, keyed by id
    fn upsert_batch(&self, records: &[MessageRecord]) -> Result<()>;

    /// Remove a batch of records; absent ids are not an error
    fn delete_batch(&self, ids: &[MessageId]) -> Result<()>;

    /// Load every record, in unspecified order
    fn load_all(&self) -> Result<Vec<MessageRecord>>;

    /// Load the records matching the given ids; missing ids are silently
    /// absent from the result
    fn load_by_ids(&self, ids: &[MessageId]) -> Result<Vec<MessageRecord>>;

    /// Number of stored records
    fn count(&self) -> Result<usize>;

    /// The persisted sync cursor, if any scan has completed
    fn last_history_id(&self) -> Result<Option<String>>;

    /// Overwrite the persisted sync cursor
    fn set_last_history_id(&self, history_id: &str) -> Result<()>;
}
