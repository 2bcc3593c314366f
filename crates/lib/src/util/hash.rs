//! Content hashing helpers.

use std::fs;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

pub fn sha256_hex(bytes: &[u8]) -> String {
  hex::encode(Sha256::digest(bytes))
}

/// Content digest of a store entry (file or directory tree): relative
/// paths and file bytes in sorted walk order. Used to compare a rebuilt
/// output against the existing store contents.
pub fn entry_digest(root: &Path) -> io::Result<String> {
  let mut hasher = Sha256::new();

  for entry in WalkDir::new(root).sort_by_file_name() {
    let entry = entry.map_err(io::Error::other)?;
    let rel = entry.path().strip_prefix(root).map_err(io::Error::other)?;

    hasher.update(rel.to_string_lossy().as_bytes());
    hasher.update([0]);

    if entry.file_type().is_file() {
      hasher.update(&fs::read(entry.path())?);
      hasher.update([0]);
    }
  }

  Ok(hex::encode(hasher.finalize()))
}
