//! Build requests and realized results.
//!
//! A `BuildTarget` names something the store should realize; a
//! `RealizedOutput` is what came back. Both are closed enums so every
//! consumer (reporter, out-link naming, path printing) branches
//! exhaustively: adding a variant forces an update at each site.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// A store-relative path: the basename of an object inside the store's
/// object directory, e.g. `a1b2c3d4e5f6-hello` or `a1b2c3d4e5f6-hello.drv`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StorePath(pub String);

impl StorePath {
  /// Whether this path names a derivation recipe rather than an output.
  pub fn is_drv(&self) -> bool {
    self.0.ends_with(".drv")
  }
}

impl std::fmt::Display for StorePath {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Which named outputs of a derivation a request selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSpec {
  /// Every output the recipe declares.
  All,
  /// A specific set of output names.
  Names(BTreeSet<String>),
}

impl OutputSpec {
  pub fn contains(&self, name: &str) -> bool {
    match self {
      OutputSpec::All => true,
      OutputSpec::Names(names) => names.contains(name),
    }
  }
}

/// An unrealized build request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildTarget {
  /// A concrete store path to realize as-is.
  Opaque { path: StorePath },
  /// A derivation plus the outputs to realize from it.
  Drv {
    drv_path: StorePath,
    outputs: OutputSpec,
  },
}

/// A successfully realized result. Produced once by the store, immutable
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealizedOutput {
  /// The single resolved path of an opaque request.
  Opaque { path: StorePath },
  /// Resolved output paths of a derivation, keyed by output name.
  /// Names are unique within one result; iteration order is the map order.
  Drv {
    drv_path: StorePath,
    outputs: BTreeMap<String, StorePath>,
  },
}

impl RealizedOutput {
  /// Every concrete store path this result denotes, in iteration order.
  pub fn store_paths(&self) -> Vec<&StorePath> {
    match self {
      RealizedOutput::Opaque { path } => vec![path],
      RealizedOutput::Drv { outputs, .. } => outputs.values().collect(),
    }
  }
}

/// Optional per-target build telemetry. Every field is independently
/// optional: absence means "not measured", never zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildMetrics {
  /// Wall-clock build start, seconds since the Unix epoch.
  pub start_time: Option<u64>,
  /// Wall-clock build end, seconds since the Unix epoch.
  pub stop_time: Option<u64>,
  /// CPU time spent in user mode, microseconds.
  pub cpu_user_micros: Option<u64>,
  /// CPU time spent in kernel mode, microseconds.
  pub cpu_system_micros: Option<u64>,
}

/// The unit the store returns from realisation and the reporter consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct Realized {
  pub output: RealizedOutput,
  pub metrics: Option<BuildMetrics>,
}
