//! JSON encodings of build requests and results.
//!
//! Both encoders emit one array element per target, preserving request
//! order. Metric fields are merged into a result element only when a
//! value was recorded; an absent measurement is omitted entirely, never
//! emitted as null or zero.

use serde_json::{Value, json};

use crate::store::Store;
use crate::target::{BuildTarget, OutputSpec, Realized, RealizedOutput};

/// Request-shaped encoding, used by dry-run reporting. Carries no
/// metric fields.
pub fn targets_to_json(targets: &[BuildTarget], store: &dyn Store) -> Value {
  Value::Array(targets.iter().map(|target| target_to_json(target, store)).collect())
}

fn target_to_json(target: &BuildTarget, store: &dyn Store) -> Value {
  match target {
    BuildTarget::Opaque { path } => json!({ "path": store.print_path(path) }),
    BuildTarget::Drv { drv_path, outputs } => {
      let names: Vec<String> = match outputs {
        OutputSpec::All => vec!["*".to_string()],
        OutputSpec::Names(names) => names.iter().cloned().collect(),
      };
      json!({ "drvPath": store.print_path(drv_path), "outputs": names })
    }
  }
}

/// Result-shaped encoding with the present-only metrics merge. CPU
/// counters are converted from integer microseconds to fractional
/// seconds.
pub fn realized_to_json(results: &[Realized], store: &dyn Store) -> Value {
  Value::Array(results.iter().map(|realized| realized_to_json_one(realized, store)).collect())
}

fn realized_to_json_one(realized: &Realized, store: &dyn Store) -> Value {
  let mut doc = match &realized.output {
    RealizedOutput::Opaque { path } => json!({ "path": store.print_path(path) }),
    RealizedOutput::Drv { drv_path, outputs } => {
      let resolved: serde_json::Map<String, Value> = outputs
        .iter()
        .map(|(name, path)| (name.clone(), Value::String(store.print_path(path))))
        .collect();
      json!({ "drvPath": store.print_path(drv_path), "outputs": resolved })
    }
  };

  if let Some(metrics) = &realized.metrics
    && let Value::Object(fields) = &mut doc
  {
    if let Some(start) = metrics.start_time {
      fields.insert("startTime".to_string(), json!(start));
    }
    if let Some(stop) = metrics.stop_time {
      fields.insert("stopTime".to_string(), json!(stop));
    }
    if let Some(micros) = metrics.cpu_user_micros {
      fields.insert("cpuUser".to_string(), json!(micros as f64 / 1_000_000.0));
    }
    if let Some(micros) = metrics.cpu_system_micros {
      fields.insert("cpuSystem".to_string(), json!(micros as f64 / 1_000_000.0));
    }
  }

  doc
}
