//! Store abstraction.
//!
//! The orchestrator only ever talks to `Store`; whether the backing is
//! local is discovered through the `as_local` capability query, never
//! through concrete backend types.

pub mod fs;

use std::path::Path;

use thiserror::Error;

use crate::target::{BuildTarget, Realized, StorePath};

/// How realisation should treat outputs that are already present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RealiseMode {
  /// Build only what is missing.
  #[default]
  Normal,
  /// Rebuild and fail if the result differs from the existing outputs.
  Check,
  /// Rebuild and overwrite the existing outputs.
  Repair,
}

/// Errors surfaced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("store path not found: {0}")]
  PathMissing(StorePath),

  #[error("not a derivation: {0}")]
  NotADerivation(StorePath),

  #[error("derivation {drv} has no output named {name}")]
  UnknownOutput { drv: StorePath, name: String },

  #[error("invalid derivation recipe {path}: {message}")]
  BadRecipe { path: StorePath, message: String },

  #[error("builder for {drv} failed with exit code {code:?}")]
  BuilderFailed { drv: StorePath, code: Option<i32> },

  #[error("builder for {drv} did not produce output {name}")]
  MissingBuilderOutput { drv: StorePath, name: String },

  #[error("output {path} differs from the existing store contents after rebuild")]
  CheckMismatch { path: StorePath },

  #[error("failed to encode store object: {0}")]
  Encode(#[from] serde_json::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

pub trait Store {
  /// The subset of `targets` whose requested outputs are not all
  /// present, in request order. Never triggers realisation.
  fn query_missing(&self, targets: &[BuildTarget]) -> Result<Vec<BuildTarget>, StoreError>;

  /// Realize every target, returning one result per target in request
  /// order. The first failure is fatal; no partial results are returned.
  fn realize(&self, targets: &[BuildTarget], mode: RealiseMode) -> Result<Vec<Realized>, StoreError>;

  /// Render a store path as an absolute filesystem path string.
  fn print_path(&self, path: &StorePath) -> String;

  /// Local-filesystem capability. Present only for stores that can
  /// register permanent GC roots on this machine; callers that need
  /// roots must skip the step when this returns `None`.
  fn as_local(&self) -> Option<&dyn LocalStore> {
    None
  }
}

pub trait LocalStore: Store {
  /// Create `symlink` pointing at `path` and register it as a
  /// permanent GC root.
  fn add_permanent_root(&self, path: &StorePath, symlink: &Path) -> Result<(), StoreError>;
}
