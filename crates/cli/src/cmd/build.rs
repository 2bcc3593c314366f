//! Implementation of the `strata build` command.
//!
//! Orchestrates one invocation end to end: resolve installables, plan
//! or realize, report, materialize out-links, print paths, update the
//! profile. Every downstream step runs only after realisation fully
//! succeeds.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::builder::TypedValueParser as _;
use clap::Args;

use strata_lib::outlink::create_out_links_if_local;
use strata_lib::plan::plan_missing;
use strata_lib::profile::update_profile;
use strata_lib::report::{realized_to_json, targets_to_json};
use strata_lib::resolve::resolve_targets;
use strata_lib::store::fs::FsStore;
use strata_lib::store::{RealiseMode, Store};
use strata_lib::target::RealizedOutput;

use crate::output::{print_success, show_paths};
use crate::status::Status;

#[derive(Debug, Args)]
pub struct BuildArgs {
  /// Installables to realize: store paths, with optional ^name,... output selection on derivations
  #[arg(required = true)]
  pub installables: Vec<String>,

  /// Use this path as the prefix for the symlinks to the build results
  #[arg(
    short,
    long,
    default_value = "result",
    value_parser = clap::builder::OsStringValueParser::new().map(PathBuf::from)
  )]
  pub out_link: PathBuf,

  /// Do not create symlinks to the build results
  #[arg(long)]
  pub no_link: bool,

  /// Print the resulting output paths
  #[arg(long)]
  pub print_out_paths: bool,

  /// Rebuild already-built targets and compare against the existing outputs
  #[arg(long)]
  pub rebuild: bool,

  /// Rebuild targets and overwrite the existing outputs
  #[arg(long)]
  pub repair: bool,

  /// Show what would be built without building anything
  #[arg(long)]
  pub dry_run: bool,

  /// Emit a machine-readable JSON report on stdout
  #[arg(long)]
  pub json: bool,

  /// Update this profile to point at the build results
  #[arg(long)]
  pub profile: Option<PathBuf>,
}

pub fn cmd_build(args: BuildArgs) -> Result<()> {
  let store = FsStore::open().context("Failed to open store")?;

  let targets =
    resolve_targets(&args.installables, &store.object_dir()).context("Failed to resolve installables")?;

  if args.dry_run {
    let report = plan_missing(&store, &targets).context("Failed to query missing paths")?;
    eprint!("{}", report.render(&store));

    if args.json {
      println!("{}", targets_to_json(&targets, &store));
    }
    return Ok(());
  }

  let mode = if args.repair {
    RealiseMode::Repair
  } else if args.rebuild {
    RealiseMode::Check
  } else {
    RealiseMode::Normal
  };

  let mut status = Status::start(args.json);
  status.set(&format!("realising {} target(s)", targets.len()));

  let built = store.realize(&targets, mode).context("Build failed")?;

  if args.json {
    println!("{}", realized_to_json(&built, &store));
  }

  // The profile stores only the path shape of a result; metrics are
  // dropped here.
  let outputs: Vec<RealizedOutput> = built.iter().map(|b| b.output.clone()).collect();

  let out_link = if args.no_link { PathBuf::new() } else { args.out_link };
  let symlinks =
    create_out_links_if_local(&out_link, &outputs, &store).context("Failed to create out-links")?;

  if args.print_out_paths {
    // Stop the status line first so paths land on a clean stream.
    status.stop();
    for realized in &outputs {
      match realized {
        RealizedOutput::Opaque { path } => println!("{}", store.print_path(path)),
        RealizedOutput::Drv { outputs, .. } => {
          for path in outputs.values() {
            println!("{}", store.print_path(path));
          }
        }
      }
    }
  }

  if let Some(profile) = &args.profile {
    update_profile(profile, &outputs, &store)
      .with_context(|| format!("Failed to update profile {}", profile.display()))?;
  }

  status.stop();
  if !args.json {
    if symlinks.is_empty() {
      print_success("Build succeeded.");
    } else {
      print_success(&format!(
        "Build succeeded. The result is available through the symlink {}.",
        show_paths(&symlinks)
      ));
    }
  }

  Ok(())
}
