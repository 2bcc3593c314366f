//! Dry-run planning.
//!
//! Answers "what would be built" without realizing anything: only the
//! store's missing-path query is consulted.

use crate::store::{Store, StoreError};
use crate::target::BuildTarget;

/// The targets whose outputs are not yet present, in request order.
#[derive(Debug)]
pub struct MissingReport {
  pub missing: Vec<BuildTarget>,
}

impl MissingReport {
  pub fn is_empty(&self) -> bool {
    self.missing.is_empty()
  }

  /// Human-readable listing. Intended for stderr so it stays separate
  /// from machine-readable stdout output.
  pub fn render(&self, store: &dyn Store) -> String {
    if self.missing.is_empty() {
      return "all requested outputs are already present\n".to_string();
    }

    let mut drvs = Vec::new();
    let mut opaques = Vec::new();
    for target in &self.missing {
      match target {
        BuildTarget::Drv { drv_path, .. } => drvs.push(store.print_path(drv_path)),
        BuildTarget::Opaque { path } => opaques.push(store.print_path(path)),
      }
    }

    let mut out = String::new();
    if !drvs.is_empty() {
      out.push_str(&format!("these {} derivation(s) will be built:\n", drvs.len()));
      for drv in &drvs {
        out.push_str(&format!("  {}\n", drv));
      }
    }
    if !opaques.is_empty() {
      out.push_str(&format!("these {} path(s) are missing from the store:\n", opaques.len()));
      for path in &opaques {
        out.push_str(&format!("  {}\n", path));
      }
    }
    out
  }
}

/// Ask the store which targets still need building. Must never realize.
pub fn plan_missing(store: &dyn Store, targets: &[BuildTarget]) -> Result<MissingReport, StoreError> {
  let missing = store.query_missing(targets)?;
  Ok(MissingReport { missing })
}
