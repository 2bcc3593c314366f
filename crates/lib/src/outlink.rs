//! Out-link naming and creation.
//!
//! Naming is a pure function over the realized-target list so it can be
//! tested without any store; the filesystem and GC-root side effects
//! happen in a separate step that consumes the computed names.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::store::{LocalStore, Store, StoreError};
use crate::target::{RealizedOutput, StorePath};

#[derive(Debug, Error)]
pub enum OutLinkError {
  #[error("failed to resolve out-link prefix {path}: {source}")]
  Resolve {
    path: PathBuf,
    source: std::io::Error,
  },

  #[error(transparent)]
  Store(#[from] StoreError),
}

/// Deterministic symlink names for a realized-target list.
///
/// The target at position `i` uses the prefix as its base name, with
/// `-{i}` appended for every position after the first. A derivation
/// result yields one link per output, further suffixed with `-{name}`
/// for every output except the conventional primary `out`.
///
/// `prefix` must already be absolute; construction guarantees the
/// returned names are unique.
pub fn out_link_names(prefix: &Path, results: &[RealizedOutput]) -> Vec<(PathBuf, StorePath)> {
  let mut links = Vec::new();

  for (i, result) in results.iter().enumerate() {
    let mut base = prefix.as_os_str().to_os_string();
    if i > 0 {
      base.push(format!("-{}", i));
    }

    match result {
      RealizedOutput::Opaque { path } => {
        links.push((PathBuf::from(base), path.clone()));
      }
      RealizedOutput::Drv { outputs, .. } => {
        for (name, path) in outputs {
          let mut link = base.clone();
          if name != "out" {
            link.push(format!("-{}", name));
          }
          links.push((PathBuf::from(link), path.clone()));
        }
      }
    }
  }

  links
}

/// Create every out-link and register it as a permanent GC root.
/// Returns the set of created link paths.
///
/// Callers are responsible for the capability gate: this runs only with
/// a local store and a non-empty prefix.
pub fn create_out_links(
  prefix: &Path,
  results: &[RealizedOutput],
  store: &dyn LocalStore,
) -> Result<BTreeSet<PathBuf>, OutLinkError> {
  let prefix = absolute_prefix(prefix)?;
  let mut created = BTreeSet::new();

  for (link, path) in out_link_names(&prefix, results) {
    store.add_permanent_root(&path, &link)?;
    debug!(link = %link.display(), target = %path, "created out-link");

    let fresh = created.insert(link.clone());
    assert!(fresh, "out-link name collision: {}", link.display());
  }

  Ok(created)
}

/// Gated entry point for callers holding an abstract store handle.
///
/// Creates no links when the prefix is empty (linking disabled) or when
/// the store has no local-filesystem capability, and returns the empty
/// set in both cases.
pub fn create_out_links_if_local(
  prefix: &Path,
  results: &[RealizedOutput],
  store: &dyn Store,
) -> Result<BTreeSet<PathBuf>, OutLinkError> {
  if prefix.as_os_str().is_empty() {
    return Ok(BTreeSet::new());
  }
  let Some(local) = store.as_local() else {
    debug!("store is not local, skipping out-links");
    return Ok(BTreeSet::new());
  };
  create_out_links(prefix, results, local)
}

fn absolute_prefix(prefix: &Path) -> Result<PathBuf, OutLinkError> {
  if prefix.is_absolute() {
    return Ok(dunce::simplified(prefix).to_path_buf());
  }

  let cwd = std::env::current_dir().map_err(|source| OutLinkError::Resolve {
    path: prefix.to_path_buf(),
    source,
  })?;
  Ok(dunce::simplified(&cwd.join(prefix)).to_path_buf())
}
