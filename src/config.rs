//! Display configuration: optional TOML file plus environment overrides.
//!
//! Env variables:
//!   STREAMER_CONFIG_PATH : path to a TOML file with any `DisplayConfig` keys
//!   BACKEND_URL          : game server base URL (default "http://localhost:5000")
//!   PUSH_URL             : push channel URL (default: BACKEND_URL with ws(s):// and "/ws")
//!   PORT                 : local listen port (default 3000)

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::dashboard::Goals;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
  pub backend_url: String,
  pub push_url: Option<String>,
  pub port: u16,
  pub request_timeout_secs: u64,
  /// Must match the backend goal score for the bars to make sense.
  pub leaderboard_goal: f64,
  pub finale_goal: f64,
  pub finale_feed_limit: usize,
  pub finale_feed_ttl_ms: u64,
  pub secret_points_amount: i64,
}

impl Default for DisplayConfig {
  fn default() -> Self {
    Self {
      backend_url: "http://localhost:5000".into(),
      push_url: None,
      port: 3000,
      request_timeout_secs: 10,
      leaderboard_goal: 5000.0,
      finale_goal: 1000.0,
      finale_feed_limit: 8,
      finale_feed_ttl_ms: 4500,
      secret_points_amount: 50,
    }
  }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("failed to parse {path}: {source}")]
  Parse {
    path: String,
    #[source]
    source: toml::de::Error,
  },
}

impl DisplayConfig {
  pub fn from_toml_str(s: &str, path: &str) -> Result<Self, ConfigError> {
    toml::from_str(s).map_err(|source| ConfigError::Parse { path: path.to_string(), source })
  }

  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let shown = path.display().to_string();
    let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: shown.clone(), source })?;
    Self::from_toml_str(&s, &shown)
  }

  /// Apply `BACKEND_URL`, `PUSH_URL` and `PORT` from `lookup`.
  pub fn apply_overrides<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
    if let Some(url) = lookup("BACKEND_URL") {
      self.backend_url = url;
    }
    if let Some(url) = lookup("PUSH_URL") {
      self.push_url = Some(url);
    }
    if let Some(raw) = lookup("PORT") {
      match raw.parse::<u16>() {
        Ok(port) => self.port = port,
        Err(_) => warn!(target: "streamer_display", %raw, "Ignoring invalid PORT"),
      }
    }
  }

  /// Push channel URL, derived from the backend URL when not configured.
  pub fn push_url(&self) -> String {
    if let Some(url) = &self.push_url {
      return url.clone();
    }
    let base = self.backend_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
      format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
      format!("ws://{rest}")
    } else {
      base.to_string()
    };
    format!("{ws_base}/ws")
  }

  pub fn goals(&self) -> Goals {
    Goals {
      leaderboard: self.leaderboard_goal,
      finale: self.finale_goal,
      feed_limit: self.finale_feed_limit,
    }
  }
}

/// Load config from STREAMER_CONFIG_PATH (if set) and apply env overrides.
/// A missing or broken file is logged and replaced by defaults.
pub fn load_config_from_env() -> DisplayConfig {
  let mut cfg = match std::env::var("STREAMER_CONFIG_PATH") {
    Ok(path) => match DisplayConfig::load(Path::new(&path)) {
      Ok(cfg) => {
        info!(target: "streamer_display", %path, "Loaded display config (TOML)");
        cfg
      }
      Err(e) => {
        error!(target: "streamer_display", error = %e, "Config file unusable; using defaults");
        DisplayConfig::default()
      }
    },
    Err(_) => DisplayConfig::default(),
  };
  cfg.apply_overrides(|key| std::env::var(key).ok());
  cfg
}
