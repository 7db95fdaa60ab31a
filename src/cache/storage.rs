//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Mutex;

use crate::error::{Error, Result};

use super::types::CachedResponse;

/// Stable fixed-length row key for a request URL.
fn request_key(url: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(url.as_bytes());
  hex::encode(hasher.finalize())
}

/// Trait for cache storage backends. Rows are keyed by the request URL,
/// not the response's final URL, so redirected responses are still found
/// under the URL that was asked for.
pub trait CacheStore: Send + Sync {
  /// Store one response in a generation (upsert by request URL).
  fn put(&self, generation: &str, request_url: &str, response: &CachedResponse) -> Result<()>;

  /// Store a batch of (request URL, response) pairs in one transaction.
  /// Install uses this for its all-or-nothing write.
  fn put_all(&self, generation: &str, responses: &[(String, CachedResponse)]) -> Result<()>;

  /// Look up a response by request URL.
  fn get(&self, generation: &str, request_url: &str) -> Result<Option<CachedResponse>>;

  /// Names of every generation currently in the store.
  fn list_generations(&self) -> Result<Vec<String>>;

  /// Drop a generation and every response in it.
  fn delete_generation(&self, name: &str) -> Result<()>;
}

/// SQLite-backed cache storage.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

/// Schema for the response cache. Generations are registered in their own
/// table so an emptied generation still shows up for activation to purge.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_generations (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS cached_responses (
    generation TEXT NOT NULL,
    request_key TEXT NOT NULL,
    request_url TEXT NOT NULL,
    response_url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers BLOB NOT NULL,
    body BLOB NOT NULL,
    fetched_at TEXT NOT NULL,
    PRIMARY KEY (generation, request_key)
);

CREATE INDEX IF NOT EXISTS idx_cached_responses_generation
    ON cached_responses(generation);
"#;

impl SqliteStore {
  /// Open or create the cache database at the given path.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)
      .map_err(|e| Error::StorageUnavailable(format!("open {}: {}", path.display(), e)))?;

    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;

    Ok(store)
  }

  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| Error::StorageUnavailable(format!("open in-memory: {}", e)))?;

    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;

    Ok(store)
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| Error::StorageUnavailable(format!("migrations: {}", e)))?;

    Ok(())
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| Error::StorageUnavailable(format!("lock poisoned: {}", e)))
  }
}

fn insert_response(
  conn: &Connection,
  generation: &str,
  request_url: &str,
  response: &CachedResponse,
) -> Result<()> {
  let headers = serde_json::to_vec(&response.headers)?;

  conn
    .execute(
      "INSERT OR REPLACE INTO cached_responses
         (generation, request_key, request_url, response_url, status, headers, body, fetched_at)
       VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
      params![
        generation,
        request_key(request_url),
        request_url,
        response.url,
        response.status,
        headers,
        response.body,
        response.fetched_at.to_rfc3339(),
      ],
    )
    .map_err(|e| Error::StorageUnavailable(format!("store response: {}", e)))?;

  conn
    .execute(
      "INSERT OR IGNORE INTO cache_generations (name) VALUES (?)",
      params![generation],
    )
    .map_err(|e| Error::StorageUnavailable(format!("register generation: {}", e)))?;

  Ok(())
}

impl CacheStore for SqliteStore {
  fn put(&self, generation: &str, request_url: &str, response: &CachedResponse) -> Result<()> {
    let conn = self.lock()?;
    insert_response(&conn, generation, request_url, response)
  }

  fn put_all(&self, generation: &str, responses: &[(String, CachedResponse)]) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute("BEGIN TRANSACTION", [])
      .map_err(|e| Error::StorageUnavailable(format!("begin: {}", e)))?;

    for (request_url, response) in responses {
      if let Err(e) = insert_response(&conn, generation, request_url, response) {
        let _ = conn.execute("ROLLBACK", []);
        return Err(e);
      }
    }

    conn
      .execute("COMMIT", [])
      .map_err(|e| Error::StorageUnavailable(format!("commit: {}", e)))?;

    Ok(())
  }

  fn get(&self, generation: &str, request_url: &str) -> Result<Option<CachedResponse>> {
    let conn = self.lock()?;

    let row: Option<(String, u16, Vec<u8>, Vec<u8>, String)> = conn
      .query_row(
        "SELECT response_url, status, headers, body, fetched_at FROM cached_responses
         WHERE generation = ? AND request_key = ?",
        params![generation, request_key(request_url)],
        |row| {
          Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
          ))
        },
      )
      .optional()
      .map_err(|e| Error::StorageUnavailable(format!("lookup: {}", e)))?;

    match row {
      Some((url, status, headers, body, fetched_at)) => Ok(Some(CachedResponse {
        url,
        status,
        headers: serde_json::from_slice(&headers)?,
        body,
        fetched_at: parse_datetime(&fetched_at)?,
      })),
      None => Ok(None),
    }
  }

  fn list_generations(&self) -> Result<Vec<String>> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare("SELECT name FROM cache_generations ORDER BY name")
      .map_err(|e| Error::StorageUnavailable(format!("list generations: {}", e)))?;

    let names = stmt
      .query_map([], |row| row.get::<_, String>(0))
      .map_err(|e| Error::StorageUnavailable(format!("list generations: {}", e)))?
      .collect::<std::result::Result<Vec<_>, _>>()
      .map_err(|e| Error::StorageUnavailable(format!("list generations: {}", e)))?;

    Ok(names)
  }

  fn delete_generation(&self, name: &str) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute("BEGIN TRANSACTION", [])
      .map_err(|e| Error::StorageUnavailable(format!("begin: {}", e)))?;

    let purge = conn
      .execute(
        "DELETE FROM cached_responses WHERE generation = ?",
        params![name],
      )
      .and_then(|_| {
        conn.execute(
          "DELETE FROM cache_generations WHERE name = ?",
          params![name],
        )
      });

    if let Err(e) = purge {
      let _ = conn.execute("ROLLBACK", []);
      return Err(Error::StorageUnavailable(format!(
        "delete generation {}: {}",
        name, e
      )));
    }

    conn
      .execute("COMMIT", [])
      .map_err(|e| Error::StorageUnavailable(format!("commit: {}", e)))?;

    Ok(())
  }
}

/// Parse a stored RFC 3339 timestamp.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::StorageUnavailable(format!("bad stored timestamp '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn response(url: &str, status: u16, body: &str) -> CachedResponse {
    CachedResponse {
      url: url.to_string(),
      status,
      headers: vec![("content-type".to_string(), "text/html".to_string())],
      body: body.as_bytes().to_vec(),
      fetched_at: Utc::now(),
    }
  }

  #[test]
  fn put_then_get_round_trips() {
    let store = SqliteStore::open_in_memory().unwrap();
    let resp = response("https://diary.test/entries/", 200, "<html>entries</html>");

    store
      .put("diary-dynamic-v2", "https://diary.test/entries/", &resp)
      .unwrap();

    let found = store
      .get("diary-dynamic-v2", "https://diary.test/entries/")
      .unwrap()
      .unwrap();
    assert_eq!(found.status, 200);
    assert_eq!(found.body, resp.body);
    assert_eq!(found.headers, resp.headers);
  }

  #[test]
  fn lookup_is_scoped_to_generation() {
    let store = SqliteStore::open_in_memory().unwrap();
    let resp = response("https://diary.test/", 200, "home");

    store.put("diary-static-v2", "https://diary.test/", &resp).unwrap();

    assert!(store
      .get("diary-dynamic-v2", "https://diary.test/")
      .unwrap()
      .is_none());
  }

  #[test]
  fn redirected_response_is_found_under_request_url() {
    let store = SqliteStore::open_in_memory().unwrap();
    let resp = response("https://diary.test/accounts/login/?next=/entries/", 200, "login");

    store
      .put("diary-dynamic-v2", "https://diary.test/entries/", &resp)
      .unwrap();

    let found = store
      .get("diary-dynamic-v2", "https://diary.test/entries/")
      .unwrap()
      .unwrap();
    assert_eq!(found.url, "https://diary.test/accounts/login/?next=/entries/");
  }

  #[test]
  fn delete_generation_removes_rows_and_name() {
    let store = SqliteStore::open_in_memory().unwrap();
    let resp = response("https://diary.test/", 200, "home");

    store.put("diary-static-v1", "https://diary.test/", &resp).unwrap();
    store.put("diary-static-v2", "https://diary.test/", &resp).unwrap();

    store.delete_generation("diary-static-v1").unwrap();

    assert_eq!(store.list_generations().unwrap(), vec!["diary-static-v2"]);
    assert!(store
      .get("diary-static-v1", "https://diary.test/")
      .unwrap()
      .is_none());
    assert!(store
      .get("diary-static-v2", "https://diary.test/")
      .unwrap()
      .is_some());
  }

  #[test]
  fn put_all_stores_every_pair() {
    let store = SqliteStore::open_in_memory().unwrap();
    let pairs = vec![
      (
        "https://diary.test/".to_string(),
        response("https://diary.test/", 200, "home"),
      ),
      (
        "https://diary.test/offline/".to_string(),
        response("https://diary.test/offline/", 200, "offline"),
      ),
    ];

    store.put_all("diary-static-v2", &pairs).unwrap();

    assert!(store
      .get("diary-static-v2", "https://diary.test/")
      .unwrap()
      .is_some());
    assert!(store
      .get("diary-static-v2", "https://diary.test/offline/")
      .unwrap()
      .is_some());
    assert_eq!(store.list_generations().unwrap(), vec!["diary-static-v2"]);
  }
}
