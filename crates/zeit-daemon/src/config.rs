//! Daemon configuration: a TOML file layered with `ZEITGEIST_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use zeit_store_sqlite::{DEFAULT_CACHE_SIZE, DEFAULT_RELATED_WINDOW};

/// Database path that selects an in-memory store.
pub const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
  pub host:             String,
  pub port:             u16,
  /// `~` is expanded; [`IN_MEMORY`] keeps the log in memory.
  pub database_path:       PathBuf,
  /// Events kept in the LRU cache; `0` disables it.
  pub cache_size:          usize,
  /// Half-width, in event ids, of the related-URI window.
  pub related_window:      u32,
  /// JSON file of `{"symbols": [{"uri", "parents"}]}` entries.
  pub taxonomy_path:       Option<PathBuf>,
  /// Where blacklist templates are persisted. Unset keeps them in memory.
  pub blacklist_path:      Option<PathBuf>,
  pub enable_blacklist:    bool,
  /// Where the data-source registry is persisted. Unset keeps it in memory.
  pub data_sources_path:   Option<PathBuf>,
  pub enable_data_sources: bool,
}

impl Default for DaemonConfig {
  fn default() -> Self {
    Self {
      host:                "127.0.0.1".to_string(),
      port:                5280,
      database_path:       PathBuf::from("~/.local/share/zeitgeist/activity.sqlite"),
      cache_size:          DEFAULT_CACHE_SIZE,
      related_window:      DEFAULT_RELATED_WINDOW,
      taxonomy_path:       None,
      blacklist_path:      None,
      enable_blacklist:    true,
      data_sources_path:   None,
      enable_data_sources: true,
    }
  }
}

impl DaemonConfig {
  /// Read `path` (if it exists) and the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    ::config::Config::builder()
      .add_source(::config::File::from(path).required(false))
      .add_source(::config::Environment::with_prefix("ZEITGEIST"))
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise DaemonConfig")
  }

  pub fn is_in_memory(&self) -> bool { self.database_path.as_os_str() == IN_MEMORY }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use ::config::{Config, File, FileFormat};

  use super::*;

  fn parse(toml: &str) -> DaemonConfig {
    Config::builder()
      .add_source(File::from_str(toml, FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn empty_file_gives_defaults() {
    assert_eq!(parse(""), DaemonConfig::default());
  }

  #[test]
  fn file_overrides_fields() {
    let cfg = parse(
      r#"
      port = 9000
      database_path = ":memory:"
      cache_size = 0
      enable_blacklist = false
      taxonomy_path = "/etc/zeitgeist/taxonomy.json"
      data_sources_path = "/var/lib/zeitgeist/datasources.json"
      "#,
    );
    assert_eq!(cfg.port, 9000);
    assert!(cfg.is_in_memory());
    assert_eq!(cfg.cache_size, 0);
    assert!(!cfg.enable_blacklist);
    assert_eq!(cfg.taxonomy_path, Some(PathBuf::from("/etc/zeitgeist/taxonomy.json")));
    assert_eq!(cfg.related_window, DEFAULT_RELATED_WINDOW);
    assert!(cfg.enable_data_sources);
    assert_eq!(
      cfg.data_sources_path,
      Some(PathBuf::from("/var/lib/zeitgeist/datasources.json"))
    );
  }

  #[test]
  fn missing_file_is_not_an_error() {
    let cfg = DaemonConfig::load(Path::new("/nonexistent/zeitgeist.toml")).unwrap();
    assert_eq!(cfg.host, DaemonConfig::default().host);
  }

  #[test]
  fn tilde_expands_only_as_a_prefix() {
    assert_eq!(expand_tilde(Path::new("/abs/~/x")), PathBuf::from("/abs/~/x"));
    if let Ok(home) = std::env::var("HOME") {
      assert_eq!(expand_tilde(Path::new("~/db")), PathBuf::from(home).join("db"));
    }
  }
}
