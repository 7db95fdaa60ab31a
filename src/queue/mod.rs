//! Local durable queue for diary entries created while offline.
//!
//! Entries are appended to an sqlite store and survive restarts. The sync
//! coordinator is the only mutator: it flips the delivered flag after a
//! confirmed server acknowledgment. Entries are never deleted here; the
//! delivered rows double as sync history.

mod storage;

pub use storage::{QueueStore, SqliteQueue};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A submitted entry payload, before it is either posted directly (online)
/// or enqueued for later delivery (offline).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDraft {
  pub title: String,
  pub date: NaiveDate,
  pub content: String,
  pub is_private: bool,
}

/// A diary entry persisted locally while awaiting submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedEntry {
  /// Locally-assigned id, monotonic and unique within the store.
  pub id: i64,
  pub title: String,
  pub date: NaiveDate,
  pub content: String,
  pub is_private: bool,
  /// Creation time, epoch milliseconds.
  pub created_at: i64,
  /// False until the server acknowledges delivery; never reverts.
  pub delivered: bool,
}

impl QueuedEntry {
  /// The entry's submission payload.
  pub fn draft(&self) -> EntryDraft {
    EntryDraft {
      title: self.title.clone(),
      date: self.date,
      content: self.content.clone(),
      is_private: self.is_private,
    }
  }
}
