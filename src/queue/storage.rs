//! Queue storage trait and SQLite implementation.

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

use crate::error::{Error, Result};

use super::{EntryDraft, QueuedEntry};

/// Trait for queue storage backends.
pub trait QueueStore: Send + Sync {
  /// Persist a new entry with `delivered = false`. The entry is visible to
  /// subsequent reads as soon as this returns.
  fn enqueue(&self, draft: &EntryDraft) -> Result<QueuedEntry>;

  /// Snapshot of every entry, delivered or not, in insertion order.
  fn list_all(&self) -> Result<Vec<QueuedEntry>>;

  /// Flip an entry's delivered flag to true. Idempotent; re-marking a
  /// delivered entry is a no-op. An absent id is `EntryNotFound`.
  fn mark_delivered(&self, id: i64) -> Result<()>;
}

/// SQLite-backed queue storage.
pub struct SqliteQueue {
  conn: Mutex<Connection>,
}

/// Schema for the offline entry queue.
///
/// Mirrors the indices the web client kept on its object store: creation
/// time for display order, delivered flag for sync scans.
const QUEUE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS offline_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    entry_date TEXT NOT NULL,
    content TEXT NOT NULL,
    is_private INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL,
    delivered INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_offline_entries_created
    ON offline_entries(created_at);

CREATE INDEX IF NOT EXISTS idx_offline_entries_delivered
    ON offline_entries(delivered);
"#;

impl SqliteQueue {
  /// Open or create the queue database at the given path. Schema and
  /// indices are in place before this returns.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)
      .map_err(|e| Error::StorageUnavailable(format!("open {}: {}", path.display(), e)))?;

    let queue = Self {
      conn: Mutex::new(conn),
    };
    queue.run_migrations()?;

    Ok(queue)
  }

  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| Error::StorageUnavailable(format!("open in-memory: {}", e)))?;

    let queue = Self {
      conn: Mutex::new(conn),
    };
    queue.run_migrations()?;

    Ok(queue)
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute_batch(QUEUE_SCHEMA)
      .map_err(|e| Error::StorageUnavailable(format!("migrations: {}", e)))?;

    Ok(())
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| Error::StorageUnavailable(format!("lock poisoned: {}", e)))
  }
}

impl QueueStore for SqliteQueue {
  fn enqueue(&self, draft: &EntryDraft) -> Result<QueuedEntry> {
    let conn = self.lock()?;
    let created_at = Utc::now().timestamp_millis();

    conn
      .execute(
        "INSERT INTO offline_entries (title, entry_date, content, is_private, created_at, delivered)
         VALUES (?, ?, ?, ?, ?, 0)",
        params![
          draft.title,
          draft.date.format("%Y-%m-%d").to_string(),
          draft.content,
          draft.is_private,
          created_at,
        ],
      )
      .map_err(|e| Error::StorageUnavailable(format!("enqueue: {}", e)))?;

    let id = conn.last_insert_rowid();

    Ok(QueuedEntry {
      id,
      title: draft.title.clone(),
      date: draft.date,
      content: draft.content.clone(),
      is_private: draft.is_private,
      created_at,
      delivered: false,
    })
  }

  fn list_all(&self) -> Result<Vec<QueuedEntry>> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare(
        "SELECT id, title, entry_date, content, is_private, created_at, delivered
         FROM offline_entries ORDER BY id",
      )
      .map_err(|e| Error::StorageUnavailable(format!("list: {}", e)))?;

    let rows = stmt
      .query_map([], |row| {
        Ok((
          row.get::<_, i64>(0)?,
          row.get::<_, String>(1)?,
          row.get::<_, String>(2)?,
          row.get::<_, String>(3)?,
          row.get::<_, bool>(4)?,
          row.get::<_, i64>(5)?,
          row.get::<_, bool>(6)?,
        ))
      })
      .map_err(|e| Error::StorageUnavailable(format!("list: {}", e)))?;

    let mut entries = Vec::new();
    for row in rows {
      let (id, title, date, content, is_private, created_at, delivered) =
        row.map_err(|e| Error::StorageUnavailable(format!("list row: {}", e)))?;

      entries.push(QueuedEntry {
        id,
        title,
        date: parse_date(&date)?,
        content,
        is_private,
        created_at,
        delivered,
      });
    }

    Ok(entries)
  }

  fn mark_delivered(&self, id: i64) -> Result<()> {
    let conn = self.lock()?;

    // An UPDATE that re-sets delivered = 1 still counts the row, so zero
    // affected rows means the id is absent, not already-delivered.
    let affected = conn
      .execute(
        "UPDATE offline_entries SET delivered = 1 WHERE id = ?",
        params![id],
      )
      .map_err(|e| Error::StorageUnavailable(format!("mark delivered: {}", e)))?;

    if affected == 0 {
      return Err(Error::EntryNotFound { id });
    }

    Ok(())
  }
}

/// Parse a stored calendar date.
fn parse_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::StorageUnavailable(format!("bad stored date '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn draft(title: &str) -> EntryDraft {
    EntryDraft {
      title: title.to_string(),
      date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
      content: format!("{} content", title),
      is_private: true,
    }
  }

  #[test]
  fn enqueued_entries_are_listed_in_insertion_order() {
    let queue = SqliteQueue::open_in_memory().unwrap();

    let a = queue.enqueue(&draft("first")).unwrap();
    let b = queue.enqueue(&draft("second")).unwrap();
    assert!(a.id < b.id);

    let all = queue.list_all().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].title, "first");
    assert_eq!(all[1].title, "second");
    assert!(all.iter().all(|e| !e.delivered));
  }

  #[test]
  fn enqueue_is_read_after_write() {
    let queue = SqliteQueue::open_in_memory().unwrap();

    let entry = queue.enqueue(&draft("visible")).unwrap();
    let all = queue.list_all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, entry.id);
    assert_eq!(all[0].date, entry.date);
    assert_eq!(all[0].created_at, entry.created_at);
  }

  #[test]
  fn mark_delivered_is_idempotent() {
    let queue = SqliteQueue::open_in_memory().unwrap();
    let entry = queue.enqueue(&draft("once")).unwrap();

    queue.mark_delivered(entry.id).unwrap();
    queue.mark_delivered(entry.id).unwrap();

    let all = queue.list_all().unwrap();
    assert!(all[0].delivered);
  }

  #[test]
  fn mark_delivered_on_absent_id_is_not_found() {
    let queue = SqliteQueue::open_in_memory().unwrap();

    match queue.mark_delivered(42) {
      Err(Error::EntryNotFound { id }) => assert_eq!(id, 42),
      other => panic!("expected EntryNotFound, got {:?}", other),
    }
  }

  #[test]
  fn queue_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.db");

    {
      let queue = SqliteQueue::open(&path).unwrap();
      queue.enqueue(&draft("durable")).unwrap();
    }

    let queue = SqliteQueue::open(&path).unwrap();
    let all = queue.list_all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].title, "durable");
  }
}
