use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub server: ServerConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub watch: WatchConfig,
  /// Where the queue and cache databases live
  /// (defaults to `<data_dir>/jotsync`).
  pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  /// Base URL of the diary server, e.g. `https://diary.example.com`.
  pub url: String,
  /// Path of the entry-creation endpoint.
  #[serde(default = "default_entry_path")]
  pub entry_path: String,
  /// Path navigated to on a default notification click.
  #[serde(default = "default_root_path")]
  pub root_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Name of the static cache generation. Bump the version suffix to
  /// invalidate the whole generation on the next activate.
  #[serde(default = "default_static_generation")]
  pub static_generation: String,
  /// Name of the dynamic cache generation.
  #[serde(default = "default_dynamic_generation")]
  pub dynamic_generation: String,
  /// Path prefix treated as immutable static assets.
  #[serde(default = "default_static_prefix")]
  pub static_prefix: String,
  /// Page served when an HTML navigation fails with no cached copy.
  #[serde(default = "default_offline_page")]
  pub offline_page: String,
  /// URLs fetched and cached verbatim at install time. Paths are resolved
  /// against the server URL; absolute URLs are kept as-is.
  #[serde(default = "default_static_manifest")]
  pub static_manifest: Vec<String>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      static_generation: default_static_generation(),
      dynamic_generation: default_dynamic_generation(),
      static_prefix: default_static_prefix(),
      offline_page: default_offline_page(),
      static_manifest: default_static_manifest(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
  /// Seconds between connectivity probes in `watch` mode.
  #[serde(default = "default_poll_secs")]
  pub poll_secs: u64,
}

impl Default for WatchConfig {
  fn default() -> Self {
    Self {
      poll_secs: default_poll_secs(),
    }
  }
}

fn default_entry_path() -> String {
  "/entries/new/".to_string()
}

fn default_root_path() -> String {
  "/".to_string()
}

fn default_static_generation() -> String {
  "diary-static-v2".to_string()
}

fn default_dynamic_generation() -> String {
  "diary-dynamic-v2".to_string()
}

fn default_static_prefix() -> String {
  "/static/".to_string()
}

fn default_offline_page() -> String {
  "/offline/".to_string()
}

fn default_static_manifest() -> Vec<String> {
  [
    "/",
    "/entries/",
    "/accounts/login/",
    "/offline/",
    "/static/entries/css/diary.css",
    "/static/entries/css/components.css",
    "https://fonts.googleapis.com/css2?family=Inter:wght@300;400;500;600&display=swap",
    "/static/entries/icons/icon-192x192.png",
    "/static/entries/icons/icon-512x512.png",
  ]
  .into_iter()
  .map(String::from)
  .collect()
}

fn default_poll_secs() -> u64 {
  30
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./jotsync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/jotsync/config.yaml
  /// 4. ~/.config/jotsync/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/jotsync/config.yaml\n\
                 with at least:\n  server:\n    url: https://diary.example.com"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("jotsync.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("jotsync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Directory holding the queue and cache databases.
  pub fn data_dir(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.data_dir {
      return Ok(dir.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("jotsync"))
  }
}
