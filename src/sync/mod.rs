//! Sync coordinator: drains the offline queue when connectivity returns.
//!
//! Delivery is best-effort and per-entry: one failure never aborts the
//! rest of the queue, and failed entries simply stay pending until the
//! next trigger. There is no internal retry timer; retries are driven by
//! the next connectivity-restored event or invocation.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;
use crate::queue::{EntryDraft, QueueStore};

/// Seam between the coordinator and the wire.
#[async_trait]
pub trait Transport: Send + Sync {
  /// Probe current connectivity. Checked at sync time rather than trigger
  /// time, since the state can flip between scheduling and execution.
  async fn is_online(&self) -> bool;

  /// Deliver one entry payload to the creation endpoint. Success = 2xx.
  async fn deliver(&self, draft: &EntryDraft) -> Result<()>;
}

/// Outcome of one `sync_pending` pass.
#[derive(Debug, Default)]
pub struct SyncReport {
  /// The pass was skipped because the transport reported offline.
  pub skipped_offline: bool,
  /// Ids delivered and marked this pass.
  pub delivered: Vec<i64>,
  /// Ids that failed delivery and stay pending.
  pub failed: Vec<i64>,
}

impl SyncReport {
  fn offline() -> Self {
    Self {
      skipped_offline: true,
      ..Self::default()
    }
  }
}

/// Drains undelivered queue entries to the server.
pub struct SyncCoordinator<Q, T> {
  queue: Arc<Q>,
  transport: Arc<T>,
}

impl<Q: QueueStore, T: Transport> SyncCoordinator<Q, T> {
  pub fn new(queue: Arc<Q>, transport: Arc<T>) -> Self {
    Self { queue, transport }
  }

  /// Attempt delivery of every pending entry, sequentially.
  ///
  /// Each entry's delivered flag is flipped immediately after its own
  /// acknowledgment, so a crash mid-pass never re-delivers what already
  /// made it to the server.
  pub async fn sync_pending(&self) -> Result<SyncReport> {
    if !self.transport.is_online().await {
      return Ok(SyncReport::offline());
    }

    let pending: Vec<_> = self
      .queue
      .list_all()?
      .into_iter()
      .filter(|e| !e.delivered)
      .collect();

    let mut report = SyncReport::default();

    for entry in pending {
      match self.transport.deliver(&entry.draft()).await {
        Ok(()) => {
          self.queue.mark_delivered(entry.id)?;
          info!("delivered offline entry {} ({})", entry.id, entry.title);
          report.delivered.push(entry.id);
        }
        Err(e) => {
          warn!("delivery failed for entry {}: {}", entry.id, e);
          report.failed.push(entry.id);
        }
      }
    }

    Ok(report)
  }
}


#[cfg(test)]
mod tests {
  use super::testing::ScriptedTransport;
  use super::*;
  use crate::queue::SqliteQueue;
  use chrono::NaiveDate;
  use std::sync::atomic::Ordering;

  fn draft(title: &str) -> EntryDraft {
    EntryDraft {
      title: title.to_string(),
      date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
      content: format!("{} content", title),
      is_private: true,
    }
  }

  #[tokio::test]
  async fn round_trip_delivers_once() {
    let queue = Arc::new(SqliteQueue::open_in_memory().unwrap());
    let transport = Arc::new(ScriptedTransport::online());
    let sync = SyncCoordinator::new(Arc::clone(&queue), Arc::clone(&transport));

    queue.enqueue(&draft("hello")).unwrap();

    let report = sync.sync_pending().await.unwrap();
    assert_eq!(report.delivered.len(), 1);
    assert!(queue.list_all().unwrap()[0].delivered);

    // Second pass finds nothing pending and resubmits nothing
    let report = sync.sync_pending().await.unwrap();
    assert!(report.delivered.is_empty());
    assert_eq!(transport.sent_titles(), vec!["hello"]);
  }

  #[tokio::test]
  async fn one_failure_does_not_abort_the_rest() {
    let queue = Arc::new(SqliteQueue::open_in_memory().unwrap());
    let transport = Arc::new(ScriptedTransport::online());
    let sync = SyncCoordinator::new(Arc::clone(&queue), Arc::clone(&transport));

    let a = queue.enqueue(&draft("a")).unwrap();
    let b = queue.enqueue(&draft("b")).unwrap();
    transport.fail_title("b");

    let report = sync.sync_pending().await.unwrap();
    assert_eq!(report.delivered, vec![a.id]);
    assert_eq!(report.failed, vec![b.id]);

    let all = queue.list_all().unwrap();
    assert!(all[0].delivered);
    assert!(!all[1].delivered);

    // Once the failure clears, only b is retried
    transport.clear_failures();
    let report = sync.sync_pending().await.unwrap();
    assert_eq!(report.delivered, vec![b.id]);
    assert_eq!(transport.sent_titles(), vec!["a", "b", "b"]);
  }

  #[tokio::test]
  async fn still_offline_is_a_no_op() {
    let queue = Arc::new(SqliteQueue::open_in_memory().unwrap());
    let transport = Arc::new(ScriptedTransport::offline());
    let sync = SyncCoordinator::new(Arc::clone(&queue), Arc::clone(&transport));

    queue.enqueue(&draft("waiting")).unwrap();

    let report = sync.sync_pending().await.unwrap();
    assert!(report.skipped_offline);
    assert!(transport.sent_titles().is_empty());
    assert!(!queue.list_all().unwrap()[0].delivered);

    // Connectivity restored between scheduling and execution
    transport.online.store(true, Ordering::SeqCst);
    let report = sync.sync_pending().await.unwrap();
    assert_eq!(report.delivered.len(), 1);
  }
}
