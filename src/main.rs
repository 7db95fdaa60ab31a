mod app;
mod cache;
mod config;
mod diary;
mod dispatch;
mod error;
mod event;
mod notify;
mod queue;
mod sync;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::io::Read;
use std::path::PathBuf;

use crate::notify::NotificationAction;
use crate::queue::EntryDraft;

#[derive(Parser, Debug)]
#[command(name = "jotsync")]
#[command(about = "Offline-first companion client for a self-hosted diary server")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/jotsync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Write a new diary entry (posted now, or queued while offline)
  New {
    #[arg(long)]
    title: String,

    /// Diary date (defaults to today)
    #[arg(long)]
    date: Option<chrono::NaiveDate>,

    /// Entry text; read from stdin when omitted
    #[arg(long)]
    content: Option<String>,

    /// Make the entry publicly visible (entries are private by default)
    #[arg(long)]
    public: bool,
  },
  /// List offline entries and their sync state
  Pending,
  /// Show connectivity, queue, and cache status
  Status,
  /// Sync pending entries now
  Sync,
  /// Fetch and cache every static-manifest file
  Install,
  /// Delete cache generations outside the current allow-list
  Activate,
  /// Fetch a URL or path through the offline cache
  Fetch { url: String },
  /// Watch connectivity and sync whenever it returns
  Watch,
  /// Render a writing-reminder notification
  Remind {
    /// Push payload body
    body: Option<String>,

    /// Simulate clicking an action: write, dismiss, or open
    #[arg(long)]
    action: Option<String>,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let config = config::Config::load(args.config.as_deref())?;
  let _guard = init_tracing(&config)?;

  let app = app::App::new(config)?;

  match args.command {
    Command::New {
      title,
      date,
      content,
      public,
    } => {
      let content = match content {
        Some(content) => content,
        None => {
          let mut buf = String::new();
          std::io::stdin().read_to_string(&mut buf)?;
          buf.trim_end().to_string()
        }
      };

      let draft = EntryDraft {
        title,
        date: date.unwrap_or_else(|| chrono::Local::now().date_naive()),
        content,
        is_private: !public,
      };
      app.submit(&draft).await?;
    }
    Command::Pending => app.pending()?,
    Command::Status => app.status().await?,
    Command::Sync => app.sync().await?,
    Command::Install => app.install().await?,
    Command::Activate => app.activate()?,
    Command::Fetch { url } => app.fetch(&url).await?,
    Command::Watch => app.watch().await?,
    Command::Remind { body, action } => {
      let action = action
        .map(|a| {
          NotificationAction::parse(&a)
            .ok_or_else(|| eyre!("unknown action '{}' (expected write, dismiss, or open)", a))
        })
        .transpose()?;
      app.remind(body.as_deref(), action);
    }
  }

  Ok(())
}

/// Log to a daily-rotated file in the data directory; RUST_LOG overrides
/// the default filter.
fn init_tracing(config: &config::Config) -> Result<tracing_appender::non_blocking::WorkerGuard> {
  use tracing_subscriber::EnvFilter;

  let log_dir = config.data_dir()?;
  std::fs::create_dir_all(&log_dir)?;

  let appender = tracing_appender::rolling::daily(&log_dir, "jotsync.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jotsync=info")),
    )
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}
