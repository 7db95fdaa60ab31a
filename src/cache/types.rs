//! Request and response types for the cache layer.

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

/// A request routed through the cache layer.
#[derive(Debug, Clone)]
pub struct FetchRequest {
  pub method: Method,
  pub url: Url,
  /// Accept header; decides whether a failed navigation falls back to the
  /// offline page.
  pub accept: Option<String>,
}

impl FetchRequest {
  pub fn get(url: Url) -> Self {
    Self {
      method: Method::GET,
      url,
      accept: None,
    }
  }

  #[allow(dead_code)]
  pub fn with_method(mut self, method: Method) -> Self {
    self.method = method;
    self
  }

  pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
    self.accept = Some(accept.into());
    self
  }

  pub fn accepts_html(&self) -> bool {
    self
      .accept
      .as_deref()
      .map(|a| a.contains("text/html"))
      .unwrap_or(false)
  }
}

/// A materialized response, as stored in and served from a generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
  /// Final URL after redirects.
  pub url: String,
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
  pub fetched_at: DateTime<Utc>,
}

impl CachedResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
  /// Live from the network
  Network,
  /// The static generation (install-time asset)
  StaticCache,
  /// The dynamic generation (previously fetched page)
  DynamicCache,
  /// The offline placeholder page
  OfflinePage,
}

/// A response plus where it came from.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
  pub response: CachedResponse,
  pub source: ResponseSource,
}

impl FetchOutcome {
  pub fn from_network(response: CachedResponse) -> Self {
    Self {
      response,
      source: ResponseSource::Network,
    }
  }

  pub fn from_static(response: CachedResponse) -> Self {
    Self {
      response,
      source: ResponseSource::StaticCache,
    }
  }

  pub fn from_dynamic(response: CachedResponse) -> Self {
    Self {
      response,
      source: ResponseSource::DynamicCache,
    }
  }

  pub fn offline_page(response: CachedResponse) -> Self {
    Self {
      response,
      source: ResponseSource::OfflinePage,
    }
  }
}
