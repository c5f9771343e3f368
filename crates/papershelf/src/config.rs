//! Shelf configuration, loaded from TOML.
//!
//! Every field has a default, so a missing file or a file with only some keys set is fine:
//!
//! ```toml
//! library_dir = "/home/me/papers"
//! request_delay_secs = 5.0
//! ```

use super::*;
use crate::{clients::arxiv::DEFAULT_API_URL, database::Database};

/// Settings shared by the library and the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Root of the paper library
  pub library_dir:        PathBuf,
  /// SQLite record store
  pub database_path:      PathBuf,
  /// API query endpoint
  pub api_base_url:       String,
  /// Pause between consecutive API fetches in a batch, doubled after a failure
  pub request_delay_secs: f64,
  /// Entries requested per search
  pub max_results:        usize,
  /// Retries of a failed API query
  pub retry_count:        u32,
  /// Pause between retries
  pub retry_delay_secs:   f64,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      library_dir:        Self::default_library_dir(),
      database_path:      Database::default_path(),
      api_base_url:       DEFAULT_API_URL.to_owned(),
      request_delay_secs: 3.0,
      max_results:        5,
      retry_count:        3,
      retry_delay_secs:   3.0,
    }
  }
}

impl Config {
  /// Default location of the configuration file.
  pub fn default_path() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("papershelf").join("config.toml")
  }

  /// Default library root, under the user's documents directory.
  pub fn default_library_dir() -> PathBuf {
    dirs::document_dir()
      .or_else(dirs::home_dir)
      .unwrap_or_else(|| PathBuf::from("."))
      .join("papershelf")
  }

  /// Loads `path`, falling back to defaults when it does not exist.
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let config = match std::fs::read_to_string(path) {
      Ok(content) => toml::from_str::<Config>(&content)?,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        debug!("No configuration at {}, using defaults", path.display());
        Config::default()
      },
      Err(e) => return Err(e.into()),
    };
    config.validate()?;
    Ok(config)
  }

  /// Loads `path`, or [`Config::default_path`] when `None`.
  pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
    match path {
      Some(path) => Self::load(path),
      None => Self::load(Self::default_path()),
    }
  }

  /// Writes the configuration as TOML, creating parent directories.
  pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(self).map_err(|e| ShelfError::Config(e.to_string()))?;
    std::fs::write(path, content)?;
    Ok(())
  }

  /// Pause between batch fetches.
  pub fn request_delay(&self) -> Duration { Duration::from_secs_f64(self.request_delay_secs) }

  /// Pause between retries.
  pub fn retry_delay(&self) -> Duration { Duration::from_secs_f64(self.retry_delay_secs) }

  /// Rejects values the rest of the crate cannot work with.
  pub fn validate(&self) -> Result<()> {
    for (name, secs) in
      [("request_delay_secs", self.request_delay_secs), ("retry_delay_secs", self.retry_delay_secs)]
    {
      Duration::try_from_secs_f64(secs).map_err(|e| {
        ShelfError::Config(format!("{name} must be a non-negative number of seconds, got {secs}: {e}"))
      })?;
    }
    if self.max_results == 0 {
      return Err(ShelfError::Config("max_results must be at least 1".into()));
    }
    url::Url::parse(&self.api_base_url)?;
    Ok(())
  }
}
