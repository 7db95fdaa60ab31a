use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{ACCEPT, REFERER};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::cache::{CachedResponse, FetchRequest};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::queue::EntryDraft;
use crate::sync::Transport;

/// Default timeout for requests.
const REQUEST_TIMEOUT_SECS: u64 = 30;
/// The connectivity probe should answer fast or not at all.
const PROBE_TIMEOUT_SECS: u64 = 5;

/// Diary server client wrapper.
///
/// The cookie jar is enabled so the CSRF cookie set by the creation page
/// travels with the subsequent form post.
#[derive(Clone)]
pub struct DiaryClient {
  http: reqwest::Client,
  base: Url,
  entry_path: String,
}

impl DiaryClient {
  pub fn new(config: &Config) -> Result<Self> {
    let base = Url::parse(&config.server.url)?;

    let http = reqwest::Client::builder()
      .cookie_store(true)
      .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
      .user_agent(concat!("jotsync/", env!("CARGO_PKG_VERSION")))
      .build()?;

    Ok(Self {
      http,
      base,
      entry_path: config.server.entry_path.clone(),
    })
  }

  pub fn base(&self) -> &Url {
    &self.base
  }

  /// Absolute URL of the entry-creation endpoint.
  pub fn entry_url(&self) -> Result<Url> {
    Ok(self.base.join(&self.entry_path)?)
  }

  /// Perform a request and materialize the response for the cache layer.
  pub async fn fetch(&self, request: &FetchRequest) -> Result<CachedResponse> {
    let mut builder = self
      .http
      .request(request.method.clone(), request.url.clone());
    if let Some(accept) = &request.accept {
      builder = builder.header(ACCEPT, accept);
    }

    let response = builder.send().await?;
    let url = response.url().to_string();
    let status = response.status().as_u16();
    let headers = response
      .headers()
      .iter()
      .map(|(name, value)| {
        (
          name.to_string(),
          String::from_utf8_lossy(value.as_bytes()).into_owned(),
        )
      })
      .collect();
    let body = response.bytes().await?.to_vec();

    Ok(CachedResponse {
      url,
      status,
      headers,
      body,
      fetched_at: Utc::now(),
    })
  }

  /// Scrape the CSRF token from the entry-creation page. The GET also
  /// primes the cookie jar with the matching cookie.
  async fn csrf_token(&self) -> Result<String> {
    let page = self
      .http
      .get(self.entry_url()?)
      .send()
      .await?
      .error_for_status()?;
    let body = page.text().await?;

    extract_csrf_token(&body).ok_or_else(|| {
      Error::DeliveryFailed("no csrfmiddlewaretoken on the creation page".to_string())
    })
  }

  /// POST one entry to the creation endpoint. Success = any 2xx after
  /// redirects.
  pub async fn submit_entry(&self, draft: &EntryDraft) -> Result<()> {
    let token = self
      .csrf_token()
      .await
      .map_err(|e| Error::DeliveryFailed(format!("csrf token: {}", e)))?;

    let entry_url = self.entry_url()?;
    let form = [
      ("title", draft.title.clone()),
      ("date", draft.date.format("%Y-%m-%d").to_string()),
      ("content", draft.content.clone()),
      ("is_private", draft.is_private.to_string()),
      ("csrfmiddlewaretoken", token),
    ];

    let response = self
      .http
      .post(entry_url.clone())
      .header(REFERER, entry_url.as_str())
      .form(&form)
      .send()
      .await
      .map_err(|e| Error::DeliveryFailed(e.to_string()))?;

    if !response.status().is_success() {
      return Err(Error::DeliveryFailed(format!(
        "server answered {}",
        response.status()
      )));
    }

    Ok(())
  }
}

#[async_trait]
impl Transport for DiaryClient {
  /// HEAD probe of the server root; any HTTP response counts as online.
  async fn is_online(&self) -> bool {
    let probe = self
      .http
      .head(self.base.clone())
      .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
      .send()
      .await;

    match probe {
      Ok(_) => true,
      Err(e) => {
        debug!("connectivity probe failed: {}", e);
        false
      }
    }
  }

  async fn deliver(&self, draft: &EntryDraft) -> Result<()> {
    self.submit_entry(draft).await
  }
}

/// Find the hidden csrfmiddlewaretoken input's value in a form body.
fn extract_csrf_token(html: &str) -> Option<String> {
  let name_at = html.find("csrfmiddlewaretoken")?;
  let rest = &html[name_at..];
  let value_at = rest.find("value=\"")? + "value=\"".len();
  let rest = &rest[value_at..];
  let end = rest.find('"')?;

  let token = &rest[..end];
  if token.is_empty() {
    None
  } else {
    Some(token.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn csrf_token_is_extracted_from_form() {
    let html = r#"<form method="post">
      <input type="hidden" name="csrfmiddlewaretoken" value="u9KxLmP2qRs7">
      <input type="text" name="title">
    </form>"#;

    assert_eq!(extract_csrf_token(html).as_deref(), Some("u9KxLmP2qRs7"));
  }

  #[test]
  fn missing_or_empty_token_is_none() {
    assert_eq!(extract_csrf_token("<form></form>"), None);
    assert_eq!(
      extract_csrf_token(r#"<input name="csrfmiddlewaretoken" value="">"#),
      None
    );
  }
}
