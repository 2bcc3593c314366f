//! Store location resolution.

use std::path::PathBuf;

/// Environment variable overriding the store root.
pub const STORE_ENV: &str = "STRATA_STORE";

/// The store root directory, honoring the `STRATA_STORE` override.
pub fn store_dir() -> PathBuf {
  if let Ok(path) = std::env::var(STORE_ENV) {
    return PathBuf::from(path);
  }

  default_store_dir()
}

/// Default store location under the platform data directory:
/// - Linux: `~/.local/share/strata/store`
/// - macOS: `~/Library/Application Support/strata/store`
/// - Windows: `%APPDATA%\strata\store`
pub fn default_store_dir() -> PathBuf {
  dirs::data_dir()
    .unwrap_or_else(|| PathBuf::from("."))
    .join("strata")
    .join("store")
}
