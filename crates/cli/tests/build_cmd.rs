//! End-to-end tests for `strata build`.
//!
//! Each test runs the binary against a private temp store selected via
//! the STRATA_STORE environment variable, with out-links landing in a
//! private working directory.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use strata_lib::store::fs::{Builder, FsStore, Recipe};
use strata_lib::target::StorePath;

struct Env {
  store_dir: TempDir,
  work_dir: TempDir,
}

impl Env {
  fn new() -> Self {
    Self {
      store_dir: TempDir::new().unwrap(),
      work_dir: TempDir::new().unwrap(),
    }
  }

  fn store(&self) -> FsStore {
    FsStore::with_root(self.store_dir.path().to_path_buf()).unwrap()
  }

  fn strata(&self) -> Command {
    let mut cmd = Command::cargo_bin("strata").unwrap();
    cmd
      .env("STRATA_STORE", self.store_dir.path())
      .current_dir(self.work_dir.path());
    cmd
  }

  fn add_recipe(&self, name: &str, outputs: &[&str], cmd: &str) -> StorePath {
    self
      .store()
      .add_recipe(&Recipe {
        name: name.to_string(),
        outputs: outputs.iter().map(|s| s.to_string()).collect(),
        builder: Builder {
          cmd: cmd.to_string(),
          env: Default::default(),
        },
      })
      .unwrap()
  }

  fn add_text(&self, name: &str, contents: &str) -> StorePath {
    self.store().add_text(name, contents).unwrap()
  }

  fn work_path(&self, name: &str) -> std::path::PathBuf {
    self.work_dir.path().join(name)
  }

  fn has_link(&self, name: &str) -> bool {
    self.work_path(name).symlink_metadata().is_ok()
  }
}

fn is_symlink_free(dir: &Path) -> bool {
  std::fs::read_dir(dir).unwrap().next().is_none()
}

// =============================================================================
// Help & argument handling
// =============================================================================

#[test]
fn help_flag_works() {
  Command::cargo_bin("strata")
    .unwrap()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn build_help_works() {
  Command::cargo_bin("strata")
    .unwrap()
    .args(["build", "--help"])
    .assert()
    .success()
    .stdout(predicate::str::contains("--out-link"));
}

#[test]
fn build_without_installables_fails() {
  let env = Env::new();
  env.strata().arg("build").assert().failure();
}

#[test]
fn foreign_path_fails_resolution() {
  let env = Env::new();
  env
    .strata()
    .args(["build", "/etc/passwd"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("not inside the store"));
}

// =============================================================================
// Out-link scenarios
// =============================================================================

#[cfg(unix)]
mod out_links {
  use super::*;

  #[test]
  fn single_target_creates_bare_result_link() {
    // Scenario A: one installable, single default output.
    let env = Env::new();
    let drv = env.add_recipe("hello", &["out"], r#"mkdir -p "$out" && echo hi > "$out/f""#);

    env
      .strata()
      .args(["build", &drv.0])
      .assert()
      .success()
      .stdout(predicate::str::contains("Build succeeded"));

    assert!(env.has_link("result"));
    assert!(!env.has_link("result-1"));
  }

  #[test]
  fn two_targets_get_indexed_links() {
    // Scenario B: two installables, each with a single default output.
    let env = Env::new();
    let one = env.add_recipe("one", &["out"], r#"mkdir -p "$out""#);
    let two = env.add_recipe("two", &["out"], r#"mkdir -p "$out""#);

    env.strata().args(["build", &one.0, &two.0]).assert().success();

    assert!(env.has_link("result"));
    assert!(env.has_link("result-1"));
  }

  #[test]
  fn non_default_output_gets_name_suffix() {
    // Scenario C: outputs {out, dev}.
    let env = Env::new();
    let drv = env.add_recipe(
      "split",
      &["out", "dev"],
      r#"mkdir -p "$out" "$dev" && touch "$out/a" "$dev/b""#,
    );

    env.strata().args(["build", &drv.0]).assert().success();

    assert!(env.has_link("result"));
    assert!(env.has_link("result-dev"));
    assert!(!env.has_link("result-out"));
  }

  #[test]
  fn custom_out_link_prefix_is_used() {
    let env = Env::new();
    let drv = env.add_recipe("hello", &["out"], r#"mkdir -p "$out""#);

    env
      .strata()
      .args(["build", "--out-link", "mylink", &drv.0])
      .assert()
      .success()
      .stdout(predicate::str::contains("mylink"));

    assert!(env.has_link("mylink"));
    assert!(!env.has_link("result"));
  }

  #[test]
  fn no_link_skips_symlink_creation() {
    let env = Env::new();
    let drv = env.add_recipe("hello", &["out"], r#"mkdir -p "$out""#);

    env.strata().args(["build", "--no-link", &drv.0]).assert().success();

    assert!(is_symlink_free(env.work_dir.path()));
  }

  #[test]
  fn empty_out_link_prefix_also_disables_linking() {
    let env = Env::new();
    let drv = env.add_recipe("hello", &["out"], r#"mkdir -p "$out""#);

    env
      .strata()
      .args(["build", "--out-link", "", &drv.0])
      .assert()
      .success();

    assert!(is_symlink_free(env.work_dir.path()));
  }

  #[test]
  fn result_link_points_into_the_store() {
    let env = Env::new();
    let path = env.add_text("data", "hi");

    env.strata().args(["build", &path.0]).assert().success();

    let target = std::fs::read_link(env.work_path("result")).unwrap();
    assert_eq!(target, env.store().object_path(&path));
  }
}

// =============================================================================
// Dry run
// =============================================================================

#[test]
fn dry_run_json_reports_present_targets() {
  // Scenario D: two targets already present, dry-run with JSON.
  let env = Env::new();
  let one = env.add_text("one", "1");
  let two = env.add_text("two", "2");

  let output = env
    .strata()
    .args(["build", "--dry-run", "--json", &one.0, &two.0])
    .assert()
    .success()
    .stderr(predicate::str::contains("already present"))
    .get_output()
    .clone();

  let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let elements = doc.as_array().unwrap();
  assert_eq!(elements.len(), 2);
  for element in elements {
    assert!(element.get("path").is_some());
    assert!(element.get("startTime").is_none());
  }

  assert!(is_symlink_free(env.work_dir.path()));
}

#[test]
fn dry_run_reports_missing_derivations_without_building() {
  let env = Env::new();
  let drv = env.add_recipe("hello", &["out"], r#"mkdir -p "$out""#);

  env
    .strata()
    .args(["build", "--dry-run", &drv.0])
    .assert()
    .success()
    .stderr(predicate::str::contains("will be built"));

  // Nothing was realized and no links were created.
  assert!(is_symlink_free(env.work_dir.path()));
}

// =============================================================================
// JSON report & path printing
// =============================================================================

#[cfg(unix)]
mod reporting {
  use super::*;

  #[test]
  fn json_build_report_carries_paths_and_metrics() {
    let env = Env::new();
    let drv = env.add_recipe("hello", &["out"], r#"mkdir -p "$out""#);

    let output = env
      .strata()
      .args(["build", "--json", &drv.0])
      .assert()
      .success()
      .get_output()
      .clone();

    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let elements = doc.as_array().unwrap();
    assert_eq!(elements.len(), 1);
    assert!(elements[0].get("drvPath").is_some());
    assert!(elements[0]["outputs"].get("out").is_some());
    // A fresh build records wall-clock times.
    assert!(elements[0].get("startTime").is_some());
    assert!(elements[0].get("stopTime").is_some());
  }

  #[test]
  fn json_mode_suppresses_the_success_notice() {
    let env = Env::new();
    let drv = env.add_recipe("hello", &["out"], r#"mkdir -p "$out""#);

    env
      .strata()
      .args(["build", "--json", &drv.0])
      .assert()
      .success()
      .stdout(predicate::str::contains("Build succeeded").not());
  }

  #[test]
  fn print_out_paths_lists_every_store_path() {
    let env = Env::new();
    let drv = env.add_recipe(
      "split",
      &["out", "dev"],
      r#"mkdir -p "$out" "$dev" && touch "$out/a" "$dev/b""#,
    );

    let output = env
      .strata()
      .args(["build", "--no-link", "--print-out-paths", &drv.0])
      .assert()
      .success()
      .get_output()
      .clone();

    let stdout = String::from_utf8(output.stdout).unwrap();
    let store = env.store();
    let obj_dir = store.object_dir().display().to_string();
    let path_lines: Vec<&str> = stdout.lines().filter(|l| l.starts_with(&obj_dir)).collect();
    assert_eq!(path_lines.len(), 2);
  }
}

// =============================================================================
// Failure behavior
// =============================================================================

#[cfg(unix)]
mod failures {
  use super::*;

  #[test]
  fn failing_target_leaves_no_side_effects() {
    // Scenario E: one of three targets fails.
    let env = Env::new();
    let good1 = env.add_recipe("good1", &["out"], r#"mkdir -p "$out""#);
    let bad = env.add_recipe("bad", &["out"], "exit 1");
    let good2 = env.add_recipe("good2", &["out"], r#"mkdir -p "$out""#);
    let profile = env.work_path("profile");

    env
      .strata()
      .args([
        "build",
        "--print-out-paths",
        "--profile",
        profile.to_str().unwrap(),
        &good1.0,
        &bad.0,
        &good2.0,
      ])
      .assert()
      .failure()
      .stdout(predicate::str::is_empty());

    // No symlinks, no profile, no printed paths.
    assert!(is_symlink_free(env.work_dir.path()));
  }

  #[test]
  fn rebuild_flag_detects_nondeterministic_outputs() {
    let env = Env::new();
    let drv = env.add_recipe(
      "flaky",
      &["out"],
      r#"mkdir -p "$out" && date +%s%N > "$out/stamp""#,
    );

    env.strata().args(["build", &drv.0]).assert().success();

    env
      .strata()
      .args(["build", "--rebuild", &drv.0])
      .assert()
      .failure()
      .stderr(predicate::str::contains("differs"));
  }

  #[test]
  fn missing_opaque_target_fails() {
    let env = Env::new();
    env
      .strata()
      .args(["build", "abc123-ghost"])
      .assert()
      .failure()
      .stderr(predicate::str::contains("not found"));
  }
}

// =============================================================================
// Profiles
// =============================================================================

#[cfg(unix)]
mod profiles {
  use super::*;

  #[test]
  fn profile_flag_creates_a_generation() {
    let env = Env::new();
    let drv = env.add_recipe("hello", &["out"], r#"mkdir -p "$out""#);
    let profile = env.work_path("profiles/current");

    env
      .strata()
      .args(["build", "--no-link", "--profile", profile.to_str().unwrap(), &drv.0])
      .assert()
      .success();

    assert!(env.work_path("profiles/current-1-link").symlink_metadata().is_ok());
    assert_eq!(
      std::fs::read_link(&profile).unwrap(),
      std::path::PathBuf::from("current-1-link")
    );
  }

  #[test]
  fn repeated_builds_advance_the_profile() {
    let env = Env::new();
    let drv = env.add_recipe("hello", &["out"], r#"mkdir -p "$out""#);
    let profile = env.work_path("profiles/current");
    let profile_arg = profile.to_str().unwrap().to_string();

    for _ in 0..2 {
      env
        .strata()
        .args(["build", "--no-link", "--profile", &profile_arg, &drv.0])
        .assert()
        .success();
    }

    assert_eq!(
      std::fs::read_link(&profile).unwrap(),
      std::path::PathBuf::from("current-2-link")
    );
  }
}
