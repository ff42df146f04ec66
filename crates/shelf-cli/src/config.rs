//! Runtime configuration, layered from `shelf.toml` and `SHELF_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;
use shelf_lending::SeedAccount;

#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
  /// SQLite database file. A leading `~/` is expanded.
  #[serde(default = "default_store_path")]
  pub store_path:        PathBuf,
  /// Page size used when `--page-size` is not given.
  #[serde(default = "default_page_size")]
  pub default_page_size: i64,
  /// Accounts created by `shelf seed`.
  #[serde(default)]
  pub seed_users:        Vec<SeedAccount>,
}

fn default_store_path() -> PathBuf { PathBuf::from("shelf.db") }

fn default_page_size() -> i64 { 10 }

impl CliConfig {
  /// Read `path` (if it exists) and overlay `SHELF_*` variables.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("SHELF"))
      .build()
      .context("failed to read config file")?;

    settings
      .try_deserialize()
      .context("failed to deserialise CliConfig")
  }

  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
