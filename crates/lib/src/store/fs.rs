//! Filesystem store.
//!
//! # Layout
//!
//! ```text
//! store/
//! ├── obj/            # Store objects: outputs, recipes, profile manifests
//! │   └── <hash12>-<name>[-<output>][.drv]
//! └── gcroots/        # Indirect roots, keyed by a digest of the link path
//!     └── <hash16> -> /path/to/out-link
//! ```
//!
//! Derivations are ordinary store objects: JSON recipes declaring their
//! output names and a builder command. Output store paths are derived
//! from the recipe path and output name, so presence can be answered
//! without running anything.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::paths;
use crate::target::{BuildMetrics, BuildTarget, OutputSpec, Realized, RealizedOutput, StorePath};
use crate::util::hash::{entry_digest, sha256_hex};
use crate::util::link::replace_symlink;

use super::{LocalStore, RealiseMode, Store, StoreError};

const OBJECTS_DIR: &str = "obj";
const GCROOTS_DIR: &str = "gcroots";

/// A derivation recipe as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
  pub name: String,
  /// Declared output names. The conventional primary output is `out`.
  pub outputs: Vec<String>,
  pub builder: Builder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Builder {
  /// Shell command. Each declared output name is exported as an
  /// environment variable holding the directory the builder must fill.
  pub cmd: String,
  #[serde(default)]
  pub env: BTreeMap<String, String>,
}

/// Store backed by a local directory tree.
pub struct FsStore {
  root: PathBuf,
}

impl FsStore {
  /// Open (creating if needed) the store at the configured location.
  pub fn open() -> io::Result<Self> {
    Self::with_root(paths::store_dir())
  }

  /// Open (creating if needed) a store rooted at an explicit directory.
  pub fn with_root(root: PathBuf) -> io::Result<Self> {
    fs::create_dir_all(root.join(OBJECTS_DIR))?;
    fs::create_dir_all(root.join(GCROOTS_DIR))?;
    Ok(Self { root })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Absolute directory holding store objects.
  pub fn object_dir(&self) -> PathBuf {
    self.root.join(OBJECTS_DIR)
  }

  /// Absolute location of a store path.
  pub fn object_path(&self, path: &StorePath) -> PathBuf {
    self.object_dir().join(&path.0)
  }

  pub fn contains(&self, path: &StorePath) -> bool {
    self.object_path(path).exists()
  }

  /// Add a text object to the store, returning its content-addressed
  /// path. Writing is atomic (temp file + rename) and idempotent.
  pub fn add_text(&self, name: &str, contents: &str) -> Result<StorePath, StoreError> {
    let digest = sha256_hex(format!("text:{}:{}", name, contents).as_bytes());
    let path = StorePath(format!("{}-{}", &digest[..12], name));
    let dest = self.object_path(&path);

    if !dest.exists() {
      let temp = self.root.join(format!(".tmp-{}", &digest[..12]));
      fs::write(&temp, contents)?;
      fs::rename(&temp, &dest)?;
      debug!(path = %path, "added text object");
    }

    Ok(path)
  }

  /// Serialize a recipe into the store as a `.drv` object.
  pub fn add_recipe(&self, recipe: &Recipe) -> Result<StorePath, StoreError> {
    let encoded = serde_json::to_string_pretty(recipe)?;
    self.add_text(&format!("{}.drv", recipe.name), &encoded)
  }

  /// The store path a given output of a derivation resolves to.
  /// Deterministic: derived from the recipe path and the output name,
  /// so `query_missing` can answer without building.
  pub fn output_path(&self, drv_path: &StorePath, recipe_name: &str, output: &str) -> StorePath {
    let digest = sha256_hex(format!("{}!{}", drv_path.0, output).as_bytes());
    let mut name = format!("{}-{}", &digest[..12], recipe_name);
    if output != "out" {
      name.push('-');
      name.push_str(output);
    }
    StorePath(name)
  }

  fn load_recipe(&self, drv_path: &StorePath) -> Result<Recipe, StoreError> {
    if !drv_path.is_drv() {
      return Err(StoreError::NotADerivation(drv_path.clone()));
    }

    let contents = match fs::read_to_string(self.object_path(drv_path)) {
      Ok(contents) => contents,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        return Err(StoreError::PathMissing(drv_path.clone()));
      }
      Err(e) => return Err(e.into()),
    };

    serde_json::from_str(&contents).map_err(|e| StoreError::BadRecipe {
      path: drv_path.clone(),
      message: e.to_string(),
    })
  }

  fn requested_outputs(
    &self,
    drv_path: &StorePath,
    recipe: &Recipe,
    spec: &OutputSpec,
  ) -> Result<Vec<String>, StoreError> {
    match spec {
      OutputSpec::All => Ok(recipe.outputs.clone()),
      OutputSpec::Names(names) => {
        for name in names {
          if !recipe.outputs.iter().any(|o| o == name) {
            return Err(StoreError::UnknownOutput {
              drv: drv_path.clone(),
              name: name.clone(),
            });
          }
        }
        Ok(names.iter().cloned().collect())
      }
    }
  }

  fn realize_opaque(&self, path: &StorePath) -> Result<Realized, StoreError> {
    if !self.contains(path) {
      return Err(StoreError::PathMissing(path.clone()));
    }
    Ok(Realized {
      output: RealizedOutput::Opaque { path: path.clone() },
      metrics: None,
    })
  }

  fn realize_drv(
    &self,
    drv_path: &StorePath,
    spec: &OutputSpec,
    mode: RealiseMode,
  ) -> Result<Realized, StoreError> {
    let recipe = self.load_recipe(drv_path)?;
    let requested = self.requested_outputs(drv_path, &recipe, spec)?;

    // Resolved paths for every declared output; the builder fills all
    // of them even when only a subset was requested.
    let resolved: BTreeMap<String, StorePath> = recipe
      .outputs
      .iter()
      .map(|name| (name.clone(), self.output_path(drv_path, &recipe.name, name)))
      .collect();

    let all_present = requested.iter().all(|name| self.contains(&resolved[name]));
    let must_build = match mode {
      RealiseMode::Normal => !all_present,
      RealiseMode::Check | RealiseMode::Repair => true,
    };

    let metrics = if must_build {
      Some(self.run_builder(drv_path, &recipe, &resolved, mode)?)
    } else {
      debug!(drv = %drv_path, "requested outputs present, skipping build");
      None
    };

    let outputs: BTreeMap<String, StorePath> = requested
      .iter()
      .map(|name| (name.clone(), resolved[name].clone()))
      .collect();

    for (name, path) in &outputs {
      if !self.contains(path) {
        return Err(StoreError::MissingBuilderOutput {
          drv: drv_path.clone(),
          name: name.clone(),
        });
      }
    }

    Ok(Realized {
      output: RealizedOutput::Drv {
        drv_path: drv_path.clone(),
        outputs,
      },
      metrics,
    })
  }

  fn run_builder(
    &self,
    drv_path: &StorePath,
    recipe: &Recipe,
    resolved: &BTreeMap<String, StorePath>,
    mode: RealiseMode,
  ) -> Result<BuildMetrics, StoreError> {
    // Working dir lives inside the store root so installing an output
    // is a same-filesystem rename.
    let work = tempfile::tempdir_in(&self.root)?;

    let temp_outs: BTreeMap<&String, PathBuf> = recipe
      .outputs
      .iter()
      .map(|name| (name, work.path().join(format!("out-{}", name))))
      .collect();

    let mut command = shell_command(&recipe.builder.cmd);
    command.current_dir(work.path());
    for (key, value) in &recipe.builder.env {
      command.env(key, value);
    }
    for (name, dir) in &temp_outs {
      command.env(name.as_str(), dir);
    }

    info!(drv = %drv_path, cmd = %recipe.builder.cmd, "running builder");
    let start_time = unix_now();
    let cpu_before = children_cpu_micros();
    let status = command.status()?;
    let stop_time = unix_now();
    let cpu_after = children_cpu_micros();

    if !status.success() {
      return Err(StoreError::BuilderFailed {
        drv: drv_path.clone(),
        code: status.code(),
      });
    }

    for (name, temp) in &temp_outs {
      if !temp.exists() {
        // Verified against the requested set by the caller.
        continue;
      }

      let dest = self.object_path(&resolved[name.as_str()]);
      if dest.exists() {
        match mode {
          RealiseMode::Normal => continue,
          RealiseMode::Check => {
            if entry_digest(temp)? != entry_digest(&dest)? {
              return Err(StoreError::CheckMismatch {
                path: resolved[name.as_str()].clone(),
              });
            }
            continue;
          }
          RealiseMode::Repair => remove_store_entry(&dest)?,
        }
      }

      fs::rename(temp, &dest)?;
      debug!(path = %resolved[name.as_str()], "installed output");
    }

    let (cpu_user_micros, cpu_system_micros) = match (cpu_before, cpu_after) {
      (Some((user0, sys0)), Some((user1, sys1))) => {
        (Some(user1.saturating_sub(user0)), Some(sys1.saturating_sub(sys0)))
      }
      _ => (None, None),
    };

    Ok(BuildMetrics {
      start_time: Some(start_time),
      stop_time: Some(stop_time),
      cpu_user_micros,
      cpu_system_micros,
    })
  }
}

impl Store for FsStore {
  fn query_missing(&self, targets: &[BuildTarget]) -> Result<Vec<BuildTarget>, StoreError> {
    let mut missing = Vec::new();

    for target in targets {
      let absent = match target {
        BuildTarget::Opaque { path } => !self.contains(path),
        BuildTarget::Drv { drv_path, outputs } => {
          if !self.contains(drv_path) {
            true
          } else {
            let recipe = self.load_recipe(drv_path)?;
            let requested = self.requested_outputs(drv_path, &recipe, outputs)?;
            requested
              .iter()
              .any(|name| !self.contains(&self.output_path(drv_path, &recipe.name, name)))
          }
        }
      };

      if absent {
        missing.push(target.clone());
      }
    }

    Ok(missing)
  }

  fn realize(&self, targets: &[BuildTarget], mode: RealiseMode) -> Result<Vec<Realized>, StoreError> {
    let mut results = Vec::with_capacity(targets.len());

    for target in targets {
      let realized = match target {
        BuildTarget::Opaque { path } => self.realize_opaque(path)?,
        BuildTarget::Drv { drv_path, outputs } => self.realize_drv(drv_path, outputs, mode)?,
      };
      results.push(realized);
    }

    Ok(results)
  }

  fn print_path(&self, path: &StorePath) -> String {
    self.object_path(path).display().to_string()
  }

  fn as_local(&self) -> Option<&dyn LocalStore> {
    Some(self)
  }
}

impl LocalStore for FsStore {
  fn add_permanent_root(&self, path: &StorePath, symlink: &Path) -> Result<(), StoreError> {
    let target = self.object_path(path);
    if !target.exists() {
      return Err(StoreError::PathMissing(path.clone()));
    }

    replace_symlink(&target, symlink)?;

    let key = sha256_hex(symlink.as_os_str().as_encoded_bytes());
    let root = self.root.join(GCROOTS_DIR).join(&key[..16]);
    replace_symlink(symlink, &root)?;

    debug!(path = %path, link = %symlink.display(), "registered gc root");
    Ok(())
  }
}

fn remove_store_entry(path: &Path) -> io::Result<()> {
  if path.is_dir() {
    fs::remove_dir_all(path)
  } else {
    fs::remove_file(path)
  }
}

fn unix_now() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs()
}

#[cfg(unix)]
fn shell_command(cmd: &str) -> Command {
  let mut command = Command::new("/bin/sh");
  command.arg("-c").arg(cmd);
  command
}

#[cfg(windows)]
fn shell_command(cmd: &str) -> Command {
  let mut command = Command::new("cmd");
  command.args(["/C", cmd]);
  command
}

/// Cumulative CPU time of reaped children, microseconds (user, system).
#[cfg(unix)]
fn children_cpu_micros() -> Option<(u64, u64)> {
  // SAFETY: getrusage only writes into the struct we hand it.
  let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
  let rc = unsafe { libc::getrusage(libc::RUSAGE_CHILDREN, &mut usage) };
  if rc != 0 {
    return None;
  }

  let user = usage.ru_utime.tv_sec as u64 * 1_000_000 + usage.ru_utime.tv_usec as u64;
  let sys = usage.ru_stime.tv_sec as u64 * 1_000_000 + usage.ru_stime.tv_usec as u64;
  Some((user, sys))
}

#[cfg(not(unix))]
fn children_cpu_micros() -> Option<(u64, u64)> {
  None
}
