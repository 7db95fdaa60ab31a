use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::sync::Transport;

/// Events produced by the connectivity watcher
#[derive(Debug, PartialEq, Eq)]
pub enum Event {
  /// Periodic probe completed; carries the current online state
  Tick { online: bool },
  /// The client just transitioned offline -> online
  ConnectivityRestored,
}

/// Event handler that polls the transport's connectivity probe and emits
/// an event on every offline -> online edge.
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given probe interval
  pub fn new<T: Transport + 'static>(transport: Arc<T>, poll_interval: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
      // No edge on the first probe; only genuine offline -> online
      // transitions fire.
      let mut was_online: Option<bool> = None;

      loop {
        let online = transport.is_online().await;

        if online && was_online == Some(false) {
          if tx.send(Event::ConnectivityRestored).is_err() {
            break;
          }
        }
        was_online = Some(online);

        if tx.send(Event::Tick { online }).is_err() {
          break;
        }

        tokio::time::sleep(poll_interval).await;
      }
    });

    Self { rx }
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sync::testing::ScriptedTransport;
  use std::sync::atomic::Ordering;

  #[tokio::test]
  async fn restored_event_fires_on_offline_to_online_edge() {
    let transport = Arc::new(ScriptedTransport::offline());
    let mut events = EventHandler::new(Arc::clone(&transport), Duration::from_millis(5));

    assert_eq!(events.next().await, Some(Event::Tick { online: false }));
    transport.online.store(true, Ordering::SeqCst);

    // Skip any further offline ticks from probes already in flight
    loop {
      match events.next().await {
        Some(Event::ConnectivityRestored) => break,
        Some(Event::Tick { online: false }) => continue,
        other => panic!("expected ConnectivityRestored before {:?}", other),
      }
    }

    assert_eq!(events.next().await, Some(Event::Tick { online: true }));
  }

  #[tokio::test]
  async fn starting_online_does_not_fire_restored() {
    let transport = Arc::new(ScriptedTransport::online());
    let mut events = EventHandler::new(transport, Duration::from_millis(5));

    assert_eq!(events.next().await, Some(Event::Tick { online: true }));
    assert_eq!(events.next().await, Some(Event::Tick { online: true }));
  }
}
