//! Hook dispatcher: the seam between the shell and the core services.
//!
//! The shell (CLI commands, the watch loop) never talks to the queue,
//! coordinator, or transport directly; it fires one of three named hooks
//! and renders the result.

use std::sync::Arc;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::notify::NotificationAction;
use crate::queue::{EntryDraft, QueueStore, QueuedEntry};
use crate::sync::{SyncCoordinator, SyncReport, Transport};

/// What happened to a submitted draft.
#[derive(Debug)]
pub enum SubmitOutcome {
  /// Posted directly to the server.
  Posted,
  /// Saved to the offline queue for later sync.
  Queued(QueuedEntry),
}

pub struct Dispatcher<Q, T> {
  queue: Arc<Q>,
  transport: Arc<T>,
  sync: SyncCoordinator<Q, T>,
  entry_path: String,
  root_path: String,
}

impl<Q: QueueStore, T: Transport> Dispatcher<Q, T> {
  pub fn new(queue: Arc<Q>, transport: Arc<T>, server: &ServerConfig) -> Self {
    let sync = SyncCoordinator::new(Arc::clone(&queue), Arc::clone(&transport));

    Self {
      queue,
      transport,
      sync,
      entry_path: server.entry_path.clone(),
      root_path: server.root_path.clone(),
    }
  }

  /// Submit hook. Online drafts are posted directly; offline drafts are
  /// enqueued. Errors propagate so the shell can show a failure banner
  /// while the caller still holds the draft for a retry.
  pub async fn on_submit(&self, draft: &EntryDraft) -> Result<SubmitOutcome> {
    if self.transport.is_online().await {
      self.transport.deliver(draft).await?;
      return Ok(SubmitOutcome::Posted);
    }

    let entry = self.queue.enqueue(draft)?;
    info!("saved entry {} to the offline queue", entry.id);
    Ok(SubmitOutcome::Queued(entry))
  }

  /// Connectivity-restored hook.
  pub async fn on_connectivity_restored(&self) -> Result<SyncReport> {
    self.sync.sync_pending().await
  }

  /// Notification-click hook: the path to navigate to, if any.
  pub fn on_notification_action(&self, action: NotificationAction) -> Option<String> {
    match action {
      NotificationAction::Write => Some(self.entry_path.clone()),
      NotificationAction::Dismiss => None,
      NotificationAction::Open => Some(self.root_path.clone()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::queue::SqliteQueue;
  use crate::sync::testing::ScriptedTransport;
  use chrono::NaiveDate;
  use std::sync::atomic::Ordering;

  fn server_config() -> ServerConfig {
    serde_yaml::from_str("url: https://diary.test\n").unwrap()
  }

  fn draft(title: &str) -> EntryDraft {
    EntryDraft {
      title: title.to_string(),
      date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
      content: "dear diary".to_string(),
      is_private: true,
    }
  }

  fn dispatcher(
    transport: Arc<ScriptedTransport>,
  ) -> (Dispatcher<SqliteQueue, ScriptedTransport>, Arc<SqliteQueue>) {
    let queue = Arc::new(SqliteQueue::open_in_memory().unwrap());
    let dispatcher = Dispatcher::new(Arc::clone(&queue), transport, &server_config());
    (dispatcher, queue)
  }

  #[tokio::test]
  async fn online_submit_posts_directly() {
    let transport = Arc::new(ScriptedTransport::online());
    let (dispatcher, queue) = dispatcher(Arc::clone(&transport));

    let outcome = dispatcher.on_submit(&draft("today")).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Posted));
    assert_eq!(transport.sent_titles(), vec!["today"]);
    assert!(queue.list_all().unwrap().is_empty());
  }

  #[tokio::test]
  async fn offline_submit_is_queued() {
    let transport = Arc::new(ScriptedTransport::offline());
    let (dispatcher, queue) = dispatcher(Arc::clone(&transport));

    let outcome = dispatcher.on_submit(&draft("later")).await.unwrap();
    match outcome {
      SubmitOutcome::Queued(entry) => assert!(!entry.delivered),
      other => panic!("expected Queued, got {:?}", other),
    }
    assert!(transport.sent_titles().is_empty());
    assert_eq!(queue.list_all().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn connectivity_restored_drains_the_queue() {
    let transport = Arc::new(ScriptedTransport::offline());
    let (dispatcher, queue) = dispatcher(Arc::clone(&transport));

    dispatcher.on_submit(&draft("while offline")).await.unwrap();
    transport.online.store(true, Ordering::SeqCst);

    let report = dispatcher.on_connectivity_restored().await.unwrap();
    assert_eq!(report.delivered.len(), 1);
    assert!(queue.list_all().unwrap()[0].delivered);
  }

  #[tokio::test]
  async fn notification_actions_route_to_paths() {
    let transport = Arc::new(ScriptedTransport::online());
    let (dispatcher, _queue) = dispatcher(transport);

    assert_eq!(
      dispatcher.on_notification_action(NotificationAction::Write),
      Some("/entries/new/".to_string())
    );
    assert_eq!(
      dispatcher.on_notification_action(NotificationAction::Dismiss),
      None
    );
    assert_eq!(
      dispatcher.on_notification_action(NotificationAction::Open),
      Some("/".to_string())
    );
  }
}
