//! CLI output formatting utilities.

use std::collections::BTreeSet;
use std::path::PathBuf;

use owo_colors::{OwoColorize, Stream};

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    "✓".if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

/// Render a set of link paths for the success notice.
pub fn show_paths(paths: &BTreeSet<PathBuf>) -> String {
  paths
    .iter()
    .map(|path| path.display().to_string())
    .collect::<Vec<_>>()
    .join(", ")
}
