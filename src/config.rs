use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

fn default_api_url() -> String {
  "https://api.pocketprice.work".to_string()
}

fn default_cache_ttl() -> u64 {
  3600
}

/// Connector settings. An empty/absent API key is a valid state: the
/// cache then serves fallback data and never touches the network.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  #[serde(default = "default_api_url")]
  pub api_url: String,
  /// Usually supplied via the POCKETPRICE_API_KEY environment variable
  /// rather than the file; see [`Config::api_key`].
  #[serde(default)]
  pub api_key: Option<String>,
  /// How long a live cache entry is served before re-validation.
  #[serde(default = "default_cache_ttl")]
  pub cache_ttl_seconds: u64,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      api_url: default_api_url(),
      api_key: None,
      cache_ttl_seconds: default_cache_ttl(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./pocketprice.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/pocketprice/config.yaml
  ///
  /// No file at all yields the defaults — the connector is simply
  /// unconfigured until an API key shows up.
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
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("pocketprice.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("pocketprice").join("config.yaml");
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

  /// Resolve the API key.
  ///
  /// POCKETPRICE_API_KEY takes precedence over the config file; empty
  /// strings count as absent either way.
  pub fn api_key(&self) -> Option<String> {
    std::env::var("POCKETPRICE_API_KEY")
      .ok()
      .or_else(|| self.api_key.clone())
      .filter(|key| !key.is_empty())
  }
}
