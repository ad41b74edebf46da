use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  /// Custom title for header (defaults to the API host if not set)
  pub title: Option<String>,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub dashboard: DashboardConfig,
  /// Currency symbol used when formatting deal values
  #[serde(default = "default_currency")]
  pub currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the CRM REST API, e.g. https://crm.example.com/api/v1
  pub url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Minutes before a cached query is refetched
  #[serde(default = "default_stale_minutes")]
  pub stale_minutes: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_minutes: default_stale_minutes(),
    }
  }
}

impl CacheConfig {
  pub fn stale_time(&self) -> Duration {
    Duration::from_secs(self.stale_minutes * 60)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
  #[serde(default = "default_panel_limit")]
  pub recent_deals_limit: usize,
  #[serde(default = "default_panel_limit")]
  pub closing_limit: usize,
}

impl Default for DashboardConfig {
  fn default() -> Self {
    Self {
      recent_deals_limit: default_panel_limit(),
      closing_limit: default_panel_limit(),
    }
  }
}

fn default_currency() -> String {
  "$".to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_stale_minutes() -> u64 {
  5
}

fn default_panel_limit() -> usize {
  5
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./crmdeck.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/crmdeck/config.yaml
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
        "No configuration file found. Create one at ~/.config/crmdeck/config.yaml\n\
                 with at least:\n\n  api:\n    url: https://crm.example.com/api"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("crmdeck.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("crmdeck").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub(crate) fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Get the API token from environment variables.
  ///
  /// Checks CRMDECK_API_TOKEN first, then CRM_API_TOKEN as fallback.
  /// Requests are sent unauthenticated when neither is set.
  pub fn get_api_token() -> Option<String> {
    std::env::var("CRMDECK_API_TOKEN")
      .or_else(|_| std::env::var("CRM_API_TOKEN"))
      .ok()
      .filter(|t| !t.trim().is_empty())
  }

  /// Default location of the log file.
  pub fn default_log_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("crmdeck").join("crmdeck.log"))
  }
}
