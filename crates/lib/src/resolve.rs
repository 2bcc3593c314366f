//! Installable resolution.
//!
//! Turns user-supplied target strings into `BuildTarget`s:
//!
//! - `abc123-hello.drv` or `/store/obj/abc123-hello.drv` — a derivation,
//!   all outputs
//! - `abc123-hello.drv^out,dev` — a derivation, selected outputs
//!   (`^*` selects all)
//! - any other store path — an opaque target

use std::collections::BTreeSet;
use std::path::Path;

use thiserror::Error;

use crate::target::{BuildTarget, OutputSpec, StorePath};

#[derive(Debug, Error)]
pub enum ResolveError {
  #[error("empty installable reference")]
  Empty,

  #[error("path is not inside the store: {0}")]
  ForeignPath(String),

  #[error("invalid output selection {selection:?} in {installable}")]
  BadOutputSelection {
    installable: String,
    selection: String,
  },

  #[error("output selection is only valid on derivations: {0}")]
  OutputsOnOpaque(String),
}

/// Resolve installable strings into an ordered target list.
///
/// `object_dir` is the store's absolute object directory; absolute
/// installable paths must point directly into it.
pub fn resolve_targets(installables: &[String], object_dir: &Path) -> Result<Vec<BuildTarget>, ResolveError> {
  installables
    .iter()
    .map(|installable| resolve_target(installable, object_dir))
    .collect()
}

fn resolve_target(installable: &str, object_dir: &Path) -> Result<BuildTarget, ResolveError> {
  let (path_part, selection) = match installable.split_once('^') {
    Some((path_part, selection)) => (path_part, Some(selection)),
    None => (installable, None),
  };

  let path = Path::new(path_part);
  let Some(name) = path.file_name().and_then(|n| n.to_str()).filter(|n| !n.is_empty()) else {
    return Err(ResolveError::Empty);
  };

  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
    && parent != object_dir
  {
    return Err(ResolveError::ForeignPath(installable.to_string()));
  }

  let store_path = StorePath(name.to_string());

  if !store_path.is_drv() {
    if selection.is_some() {
      return Err(ResolveError::OutputsOnOpaque(installable.to_string()));
    }
    return Ok(BuildTarget::Opaque { path: store_path });
  }

  let outputs = match selection {
    None | Some("*") => OutputSpec::All,
    Some(selection) => {
      let names: BTreeSet<String> = selection
        .split(',')
        .map(str::to_string)
        .collect();
      if names.iter().any(|n| n.is_empty()) {
        return Err(ResolveError::BadOutputSelection {
          installable: installable.to_string(),
          selection: selection.to_string(),
        });
      }
      OutputSpec::Names(names)
    }
  };

  Ok(BuildTarget::Drv {
    drv_path: store_path,
    outputs,
  })
}
