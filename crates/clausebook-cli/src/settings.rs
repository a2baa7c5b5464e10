//! Runtime settings: an optional TOML file layered under `CLAUSEBOOK_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

pub const DEFAULT_CONFIG: &str = "clausebook.toml";
const DEFAULT_STORE_PATH: &str = "~/.local/share/clausebook/clauses.db";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  /// SQLite database file; `~` is expanded.
  pub store_path: PathBuf,
  /// Address `serve` binds to.
  pub host:       String,
  pub port:       u16,
}

impl Settings {
  /// Load settings from `path` (if it exists) and the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let raw = config::Config::builder()
      .set_default("store_path", DEFAULT_STORE_PATH)?
      .set_default("host", "127.0.0.1")?
      .set_default("port", 8080_i64)?
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("CLAUSEBOOK"))
      .build()
      .context("failed to read config file")?;

    let mut settings: Settings = raw
      .try_deserialize()
      .context("failed to deserialise settings")?;
    settings.store_path = expand_tilde(&settings.store_path);
    Ok(settings)
  }
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
