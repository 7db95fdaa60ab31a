//! Error types shared across the offline subsystem.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
  /// The local store could not be opened or a write transaction aborted.
  #[error("local store unavailable: {0}")]
  StorageUnavailable(String),

  /// `mark_delivered` was called with an id that is not in the queue.
  #[error("entry {id} not found in offline queue")]
  EntryNotFound { id: i64 },

  /// A sync attempt for one entry did not receive a success response.
  /// The entry stays pending; the next trigger retries it.
  #[error("delivery failed: {0}")]
  DeliveryFailed(String),

  /// A static-manifest URL could not be fetched during install.
  /// Install is all-or-nothing, so nothing was cached.
  #[error("static cache install failed for {url}: {reason}")]
  InstallFailed { url: String, reason: String },

  #[error("HTTP error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("invalid URL: {0}")]
  Url(#[from] url::ParseError),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("cache record corrupt: {0}")]
  Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
