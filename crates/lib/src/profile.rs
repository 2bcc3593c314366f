//! Profile generations.
//!
//! A profile is a symlink `P` pointing at the newest generation link
//! `P-<n>-link`, which in turn points at a store-written manifest object
//! listing the realized paths of that generation. Generation links are
//! registered as GC roots, so a profiled result survives collection.
//!
//! Profiles store only the path shape of a result; build telemetry is
//! stripped before the update.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::store::{LocalStore, Store, StoreError};
use crate::store::fs::FsStore;
use crate::target::RealizedOutput;
use crate::util::link::replace_symlink;

pub const PROFILE_MANIFEST_VERSION: u32 = 1;

/// On-disk manifest of one profile generation.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileManifest {
  pub version: u32,
  /// Absolute store paths, in realized order.
  pub paths: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ProfileError {
  #[error("profile path has no usable file name: {0}")]
  InvalidName(PathBuf),

  #[error("failed to encode profile manifest: {0}")]
  Encode(#[from] serde_json::Error),

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error("io error: {0}")]
  Io(#[from] io::Error),
}

/// Point `profile` at a fresh generation holding the given results.
/// Returns the new generation number.
///
/// An identical path set still produces a new generation: the pointer
/// is monotonic.
pub fn update_profile(
  profile: &Path,
  results: &[RealizedOutput],
  store: &FsStore,
) -> Result<u64, ProfileError> {
  let paths: Vec<String> = results
    .iter()
    .flat_map(|result| result.store_paths())
    .map(|path| store.print_path(path))
    .collect();

  let manifest = ProfileManifest {
    version: PROFILE_MANIFEST_VERSION,
    paths,
  };
  let encoded = serde_json::to_string_pretty(&manifest)?;
  let object = store.add_text("profile", &encoded)?;

  let file_name = profile
    .file_name()
    .and_then(|name| name.to_str())
    .ok_or_else(|| ProfileError::InvalidName(profile.to_path_buf()))?;

  let generation = next_generation(profile, file_name)?;
  let link_name = format!("{}-{}-link", file_name, generation);
  let link = profile.with_file_name(&link_name);

  store.add_permanent_root(&object, &link)?;

  // The profile symlink uses a relative target so the directory can be
  // moved as a whole.
  replace_symlink(Path::new(&link_name), profile)?;

  info!(profile = %profile.display(), generation, "profile updated");
  Ok(generation)
}

/// Load the manifest a profile currently points at, if any.
pub fn current_manifest(profile: &Path) -> Result<Option<ProfileManifest>, ProfileError> {
  let contents = match fs::read_to_string(profile) {
    Ok(contents) => contents,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
    Err(e) => return Err(e.into()),
  };

  Ok(Some(serde_json::from_str(&contents)?))
}

fn next_generation(profile: &Path, file_name: &str) -> Result<u64, ProfileError> {
  let dir = match profile.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
    _ => PathBuf::from("."),
  };

  let entries = match fs::read_dir(&dir) {
    Ok(entries) => entries,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(1),
    Err(e) => return Err(e.into()),
  };

  let mut newest = 0u64;
  for entry in entries.flatten() {
    if let Some(entry_name) = entry.file_name().to_str()
      && let Some(rest) = entry_name.strip_prefix(file_name)
      && let Some(rest) = rest.strip_prefix('-')
      && let Some(number) = rest.strip_suffix("-link")
      && let Ok(generation) = number.parse::<u64>()
    {
      newest = newest.max(generation);
    }
  }

  Ok(newest + 1)
}
