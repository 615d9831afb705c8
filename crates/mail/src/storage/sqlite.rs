//! SQLite-backed message store

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};

use super::traits::MessageStore;
use super::LAST_HISTORY_ID_KEY;
use crate::models::{MessageId, MessageRecord};

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            -- Per-message header metadata, enough for grouping and actions
            CREATE TABLE messages (
                id                    TEXT PRIMARY KEY,
                sender                TEXT NOT NULL,
                subject               TEXT NOT NULL DEFAULT '',
                date_rfc3339          TEXT NOT NULL DEFAULT '',
                list_unsubscribe      TEXT NOT NULL DEFAULT '',
                list_unsubscribe_post TEXT NOT NULL DEFAULT ''
            );

            -- Single-row facts, e.g. the sync cursor
            CREATE TABLE metadata (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL DEFAULT ''
            );
            "#,
        ),
    ])
}

/// SQLite-backed [`MessageStore`]
///
/// WAL mode lets readers proceed concurrently with the single writer and
/// still see the pre-commit snapshot. All batch writes run in one
/// transaction.
pub struct SqliteMessageStore {
    conn: Mutex<Connection>,
}

impl SqliteMessageStore {
    /// Open (or create) the database at the given path and run migrations.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRecord> {
        Ok(MessageRecord {
            id: MessageId::new(row.get::<_, String>(0)?),
            sender: row.get(1)?,
            subject: row.get(2)?,
            date: row.get(3)?,
            list_unsubscribe: row.get(4)?,
            list_unsubscribe_post: row.get(5)?,
        })
    }
}

const SELECT_COLUMNS: &str =
    "id, sender, subject, date_rfc3339, list_unsubscribe, list_unsubscribe_post";

impl MessageStore for SqliteMessageStore {
    fn upsert_batch(&self, records: &[MessageRecord]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO messages
                 (id, sender, subject, date_rfc3339, list_unsubscribe, list_unsubscribe_post)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    sender                = excluded.sender,
                    subject               = excluded.subject,
                    date_rfc3339          = excluded.date_rfc3339,
                    list_unsubscribe      = excluded.list_unsubscribe,
                    list_unsubscribe_post = excluded.list_unsubscribe_post",
            )?;
            for rec in records {
                stmt.execute(params![
                    rec.id.as_str(),
                    rec.sender,
                    rec.subject,
                    rec.date,
                    rec.list_unsubscribe,
                    rec.list_unsubscribe_post,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_batch(&self, ids: &[MessageId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM messages WHERE id = ?")?;
            for id in ids {
                stmt.execute([id.as_str()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<MessageRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("SELECT {} FROM messages", SELECT_COLUMNS))?;
        let records = stmt
            .query_map([], Self::record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn load_by_ids(&self, ids: &[MessageId]) -> Result<Vec<MessageRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().unwrap();
        let placeholders = vec!["?"; ids.len()].join(",");
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM messages WHERE id IN ({})",
            SELECT_COLUMNS, placeholders
        ))?;
        let records = stmt
            .query_map(
                params_from_iter(ids.iter().map(|id| id.as_str())),
                Self::record_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn last_history_id(&self) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?",
                [LAST_HISTORY_ID_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.filter(|v| !v.is_empty()))
    }

    fn set_last_history_id(&self, history_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO metadata (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![LAST_HISTORY_ID_KEY, history_id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_store() -> (SqliteMessageStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("chuckterm.test.sqlite");
        let store = SqliteMessageStore::new(&db_path).unwrap();
        (store, dir)
    }

    fn make_record(id: &str, sender: &str, subject: &str) -> MessageRecord {
        MessageRecord {
            id: MessageId::new(id),
            sender: sender.to_string(),
            subject: subject.to_string(),
            date: "2024-01-01T00:00:00Z".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_upsert_and_load() {
        let (store, _dir) = create_test_store();

        let mut records = vec![
            make_record("1", "a@b.com", "hello"),
            make_record("2", "c@d.com", "world"),
        ];
        records[1].list_unsubscribe = "<https://unsub.example.com>".to_string();
        store.upsert_batch(&records).unwrap();

        assert_eq!(store.count().unwrap(), 2);

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 2);
        let two = loaded.iter().find(|r| r.id.as_str() == "2").unwrap();
        assert_eq!(two.list_unsubscribe, "<https://unsub.example.com>");

        // Re-upserting a changed record yields the new attributes
        records[0].subject = "updated".to_string();
        store.upsert_batch(&records[..1]).unwrap();
        assert_eq!(store.count().unwrap(), 2);
        let loaded = store.load_all().unwrap();
        let one = loaded.iter().find(|r| r.id.as_str() == "1").unwrap();
        assert_eq!(one.subject, "updated");
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let (store, _dir) = create_test_store();
        let records = vec![make_record("1", "a@b.com", "s")];
        store.upsert_batch(&records).unwrap();
        store.upsert_batch(&records).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.load_all().unwrap(), records);
    }

    #[test]
    fn test_delete_batch() {
        let (store, _dir) = create_test_store();
        store
            .upsert_batch(&[make_record("1", "a@b.com", ""), make_record("2", "c@d.com", "")])
            .unwrap();

        store.delete_batch(&[MessageId::new("1")]).unwrap();
        assert_eq!(store.count().unwrap(), 1);

        // absent ids are not an error
        store
            .delete_batch(&[MessageId::new("1"), MessageId::new("missing")])
            .unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_load_by_ids() {
        let (store, _dir) = create_test_store();
        store
            .upsert_batch(&[
                make_record("1", "a@b.com", ""),
                make_record("2", "c@d.com", ""),
                make_record("3", "e@f.com", ""),
            ])
            .unwrap();

        let loaded = store
            .load_by_ids(&[MessageId::new("1"), MessageId::new("3"), MessageId::new("nope")])
            .unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.iter().any(|r| r.id.as_str() == "1"));
        assert!(loaded.iter().any(|r| r.id.as_str() == "3"));

        assert!(store.load_by_ids(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_history_id_roundtrip() {
        let (store, _dir) = create_test_store();

        assert!(store.last_history_id().unwrap().is_none());

        store.set_last_history_id("12345").unwrap();
        assert_eq!(store.last_history_id().unwrap().as_deref(), Some("12345"));

        store.set_last_history_id("99999").unwrap();
        assert_eq!(store.last_history_id().unwrap().as_deref(), Some("99999"));
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("chuckterm.test.sqlite");

        {
            let store = SqliteMessageStore::new(&db_path).unwrap();
            store.upsert_batch(&[make_record("1", "a@b.com", "s")]).unwrap();
            store.set_last_history_id("42").unwrap();
        }

        let store = SqliteMessageStore::new(&db_path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.last_history_id().unwrap().as_deref(), Some("42"));
    }
}
