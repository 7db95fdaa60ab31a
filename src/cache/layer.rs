//! Cache layer that routes requests between the network and the two cache
//! generations.

use reqwest::Method;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::config::CacheConfig;
use crate::error::{Error, Result};

use super::storage::CacheStore;
use super::types::{CachedResponse, FetchOutcome, FetchRequest};

/// Resolve a manifest entry or configured path against the server base.
/// Absolute URLs (the external stylesheet) are kept as-is.
fn resolve(base: &Url, entry: &str) -> Result<Url> {
  match Url::parse(entry) {
    Ok(url) => Ok(url),
    Err(url::ParseError::RelativeUrlWithoutBase) => Ok(base.join(entry)?),
    Err(e) => Err(e.into()),
  }
}

/// Orchestrates caching strategy against a caller-supplied fetcher.
///
/// The layer never owns a network client; `install` and `handle` take an
/// async fetch closure, which keeps the strategy testable without a server.
pub struct CacheLayer<S: CacheStore> {
  storage: Arc<S>,
  base: Url,
  static_generation: String,
  dynamic_generation: String,
  static_prefix: String,
  offline_page: Url,
  manifest: Vec<Url>,
}

impl<S: CacheStore> CacheLayer<S> {
  pub fn new(storage: S, base: Url, config: &CacheConfig) -> Result<Self> {
    let manifest = config
      .static_manifest
      .iter()
      .map(|entry| resolve(&base, entry))
      .collect::<Result<Vec<_>>>()?;
    let offline_page = resolve(&base, &config.offline_page)?;

    Ok(Self {
      storage: Arc::new(storage),
      base,
      static_generation: config.static_generation.clone(),
      dynamic_generation: config.dynamic_generation.clone(),
      static_prefix: config.static_prefix.clone(),
      offline_page,
      manifest,
    })
  }

  /// True when the URL belongs to the fixed static set: an exact manifest
  /// match, or a same-origin path under the static namespace.
  fn is_static(&self, url: &Url) -> bool {
    self.manifest.iter().any(|m| m == url)
      || (url.origin() == self.base.origin() && url.path().starts_with(&self.static_prefix))
  }

  fn same_origin(&self, response: &CachedResponse) -> bool {
    Url::parse(&response.url)
      .map(|u| u.origin() == self.base.origin())
      .unwrap_or(false)
  }

  /// Fetch and store every manifest URL into the static generation.
  ///
  /// All-or-nothing: a single failed or non-success fetch fails the whole
  /// install and nothing is written, so a worker never activates against a
  /// partially-seeded static set.
  pub async fn install<F, Fut>(&self, fetch: F) -> Result<usize>
  where
    F: Fn(FetchRequest) -> Fut,
    Fut: Future<Output = Result<CachedResponse>>,
  {
    let mut responses = Vec::with_capacity(self.manifest.len());

    for url in &self.manifest {
      let response = fetch(FetchRequest::get(url.clone()))
        .await
        .map_err(|e| Error::InstallFailed {
          url: url.to_string(),
          reason: e.to_string(),
        })?;

      if !response.is_success() {
        return Err(Error::InstallFailed {
          url: url.to_string(),
          reason: format!("status {}", response.status),
        });
      }

      responses.push((url.to_string(), response));
    }

    self.storage.put_all(&self.static_generation, &responses)?;

    Ok(responses.len())
  }

  /// Delete every generation not in the current allow-list. Returns the
  /// purged names.
  pub fn activate(&self) -> Result<Vec<String>> {
    let keep = [
      self.static_generation.as_str(),
      self.dynamic_generation.as_str(),
    ];

    let mut purged = Vec::new();
    for name in self.storage.list_generations()? {
      if !keep.contains(&name.as_str()) {
        debug!("purging stale cache generation {}", name);
        self.storage.delete_generation(&name)?;
        purged.push(name);
      }
    }

    Ok(purged)
  }

  /// Route one request.
  ///
  /// Non-GET requests go straight to the network and are never cached.
  /// Static-set requests are cache-first with no write-back. Everything
  /// else is network-first: successful same-origin 200s refresh the
  /// dynamic generation; on network failure the dynamic cache is tried,
  /// then the offline page for HTML requests. A network error on a GET
  /// never escapes this method; a non-HTML miss resolves to `Ok(None)`.
  pub async fn handle<F, Fut>(
    &self,
    request: &FetchRequest,
    fetch: F,
  ) -> Result<Option<FetchOutcome>>
  where
    F: FnOnce(FetchRequest) -> Fut,
    Fut: Future<Output = Result<CachedResponse>>,
  {
    if request.method != Method::GET {
      let response = fetch(request.clone()).await?;
      return Ok(Some(FetchOutcome::from_network(response)));
    }

    if self.is_static(&request.url) {
      if let Some(cached) = self
        .storage
        .get(&self.static_generation, request.url.as_str())?
      {
        return Ok(Some(FetchOutcome::from_static(cached)));
      }

      // The static set is fixed at install time: no write-back on miss.
      return match fetch(request.clone()).await {
        Ok(response) => Ok(Some(FetchOutcome::from_network(response))),
        Err(e) => {
          debug!("static fetch failed for {}: {}", request.url, e);
          self.fallback(request)
        }
      };
    }

    match fetch(request.clone()).await {
      Ok(response) => {
        if response.status == 200 && self.same_origin(&response) {
          self
            .storage
            .put(&self.dynamic_generation, request.url.as_str(), &response)?;
        }
        Ok(Some(FetchOutcome::from_network(response)))
      }
      Err(e) => {
        debug!("network fetch failed for {}: {}", request.url, e);
        self.fallback(request)
      }
    }
  }

  /// Offline resolution: dynamic cache, then the offline page for HTML.
  fn fallback(&self, request: &FetchRequest) -> Result<Option<FetchOutcome>> {
    if let Some(cached) = self
      .storage
      .get(&self.dynamic_generation, request.url.as_str())?
    {
      return Ok(Some(FetchOutcome::from_dynamic(cached)));
    }

    if request.accepts_html() {
      if let Some(page) = self
        .storage
        .get(&self.static_generation, self.offline_page.as_str())?
      {
        return Ok(Some(FetchOutcome::offline_page(page)));
      }
      if let Some(page) = self
        .storage
        .get(&self.dynamic_generation, self.offline_page.as_str())?
      {
        return Ok(Some(FetchOutcome::offline_page(page)));
      }
    }

    Ok(None)
  }

  /// Names of every generation currently in the store.
  pub fn generations(&self) -> Result<Vec<String>> {
    self.storage.list_generations()
  }
}
