use color_eyre::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{CacheLayer, FetchRequest, ResponseSource, SqliteStore};
use crate::config::Config;
use crate::diary::DiaryClient;
use crate::dispatch::{Dispatcher, SubmitOutcome};
use crate::event::{Event, EventHandler};
use crate::notify::{NotificationAction, ReminderNotification};
use crate::queue::{EntryDraft, QueueStore, SqliteQueue};
use crate::sync::{SyncReport, Transport};

/// Browser-ish Accept header used for `fetch`, so failed navigations get
/// the offline-page fallback.
const NAVIGATION_ACCEPT: &str = "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8";

/// Main application wiring: config -> stores -> client -> dispatcher.
pub struct App {
  config: Config,
  client: Arc<DiaryClient>,
  queue: Arc<SqliteQueue>,
  cache: CacheLayer<SqliteStore>,
  dispatcher: Dispatcher<SqliteQueue, DiaryClient>,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let data_dir = config.data_dir()?;
    let queue = Arc::new(SqliteQueue::open(&data_dir.join("queue.db"))?);
    let store = SqliteStore::open(&data_dir.join("cache.db"))?;

    let client = Arc::new(DiaryClient::new(&config)?);
    let cache = CacheLayer::new(store, client.base().clone(), &config.cache)?;
    let dispatcher = Dispatcher::new(Arc::clone(&queue), Arc::clone(&client), &config.server);

    Ok(Self {
      config,
      client,
      queue,
      cache,
      dispatcher,
    })
  }

  /// `new` command: fire the submit hook and render the outcome.
  pub async fn submit(&self, draft: &EntryDraft) -> Result<()> {
    match self.dispatcher.on_submit(draft).await {
      Ok(SubmitOutcome::Posted) => {
        println!("Entry posted to {}.", self.config.server.url);
      }
      Ok(SubmitOutcome::Queued(entry)) => {
        println!("📱 Entry saved offline! It will sync when you're back online. (entry {})", entry.id);
      }
      Err(e) => {
        // The draft stays with the caller; nothing was stored.
        eprintln!("❌ Failed to save entry: {}", e);
        return Err(e.into());
      }
    }

    Ok(())
  }

  /// `pending` command: the offline-entries indicator plus a listing.
  pub fn pending(&self) -> Result<()> {
    let entries = self.queue.list_all()?;
    let waiting = entries.iter().filter(|e| !e.delivered).count();

    match waiting {
      0 => println!("No offline entries waiting to sync."),
      1 => println!("📱 You have 1 offline entry that will sync when you're back online."),
      n => println!("📱 You have {} offline entries that will sync when you're back online.", n),
    }

    for entry in &entries {
      let state = if entry.delivered { "delivered" } else { "pending" };
      println!("  {:>4}  {}  {:9}  {}", entry.id, entry.date, state, entry.title);
    }

    Ok(())
  }

  /// `status` command: connectivity, queue depth, cache generations.
  pub async fn status(&self) -> Result<()> {
    let online = self.client.is_online().await;
    let entries = self.queue.list_all()?;
    let pending = entries.iter().filter(|e| !e.delivered).count();
    let generations = self.cache.generations()?;

    println!("Server:            {}", self.config.server.url);
    println!("Connectivity:      {}", if online { "online" } else { "offline" });
    println!("Pending entries:   {}", pending);
    println!("Delivered entries: {}", entries.len() - pending);
    if generations.is_empty() {
      println!("Cache generations: (none — run `jotsync install`)");
    } else {
      println!("Cache generations: {}", generations.join(", "));
    }

    Ok(())
  }

  /// `sync` command: fire the connectivity-restored hook once.
  pub async fn sync(&self) -> Result<()> {
    let report = self.dispatcher.on_connectivity_restored().await?;
    self.report_sync(&report);
    Ok(())
  }

  /// `install` command: seed the static generation from the manifest.
  pub async fn install(&self) -> Result<()> {
    let client = Arc::clone(&self.client);
    let count = self
      .cache
      .install(move |req| {
        let client = Arc::clone(&client);
        async move { client.fetch(&req).await }
      })
      .await?;

    println!(
      "Cached {} static files into {}.",
      count, self.config.cache.static_generation
    );
    Ok(())
  }

  /// `activate` command: purge generations outside the allow-list.
  pub fn activate(&self) -> Result<()> {
    let purged = self.cache.activate()?;

    if purged.is_empty() {
      println!("No stale cache generations.");
    } else {
      println!("Deleted old caches: {}", purged.join(", "));
    }
    Ok(())
  }

  /// `fetch` command: run one GET through the cache layer.
  pub async fn fetch(&self, target: &str) -> Result<()> {
    let url = match Url::parse(target) {
      Ok(url) => url,
      Err(url::ParseError::RelativeUrlWithoutBase) => self.client.base().join(target)?,
      Err(e) => return Err(e.into()),
    };

    let request = FetchRequest::get(url).with_accept(NAVIGATION_ACCEPT);
    let client = Arc::clone(&self.client);
    let outcome = self
      .cache
      .handle(&request, move |req| async move { client.fetch(&req).await })
      .await?;

    match outcome {
      Some(outcome) => {
        let source = match outcome.source {
          ResponseSource::Network => "network",
          ResponseSource::StaticCache => "static cache",
          ResponseSource::DynamicCache => "dynamic cache",
          ResponseSource::OfflinePage => "offline page",
        };
        println!(
          "{} {} ({} bytes, from {})",
          outcome.response.status,
          outcome.response.url,
          outcome.response.body.len(),
          source
        );
      }
      None => println!("Offline, and nothing cached for {}.", request.url),
    }

    Ok(())
  }

  /// `watch` command: poll connectivity and sync on every restored edge.
  pub async fn watch(&self) -> Result<()> {
    // Catch up anything still pending from earlier sessions first.
    let report = self.dispatcher.on_connectivity_restored().await?;
    self.report_sync(&report);

    let interval = Duration::from_secs(self.config.watch.poll_secs);
    let mut events = EventHandler::new(Arc::clone(&self.client), interval);
    info!("watching connectivity every {}s", self.config.watch.poll_secs);

    loop {
      tokio::select! {
        _ = tokio::signal::ctrl_c() => {
          info!("shutting down");
          break;
        }
        event = events.next() => match event {
          Some(Event::ConnectivityRestored) => {
            info!("back online, syncing offline entries");
            match self.dispatcher.on_connectivity_restored().await {
              Ok(report) => self.report_sync(&report),
              Err(e) => warn!("sync failed: {}", e),
            }
          }
          Some(Event::Tick { online }) => debug!(online, "connectivity probe"),
          None => break,
        }
      }
    }

    Ok(())
  }

  /// `remind` command: render a push reminder and resolve a click.
  pub fn remind(&self, body: Option<&str>, action: Option<NotificationAction>) {
    let notification = ReminderNotification::from_push(body);

    println!("🔔 {}", notification.title);
    println!("   {}", notification.body);
    let labels: Vec<_> = notification.actions.iter().map(|a| a.label()).collect();
    println!("   [{}]", labels.join("] ["));

    if let Some(action) = action {
      match self.dispatcher.on_notification_action(action) {
        Some(path) => println!("→ opens {}", path),
        None => println!("→ dismissed"),
      }
    }
  }

  fn report_sync(&self, report: &SyncReport) {
    if report.skipped_offline {
      println!("Still offline; entries stay queued.");
    } else if report.delivered.is_empty() && report.failed.is_empty() {
      println!("Nothing to sync.");
    } else {
      println!(
        "Synced {} {}, {} failed.",
        report.delivered.len(),
        if report.delivered.len() == 1 { "entry" } else { "entries" },
        report.failed.len()
      );
    }
  }
}
