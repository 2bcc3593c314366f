//! Transient terminal status line.
//!
//! A single stderr line rewritten in place while work is in flight.
//! `stop` clears it and is idempotent; it must run before any final
//! path output is written to stdout so realized paths are never
//! interleaved with transient status text.

use std::io::{IsTerminal, Write, stderr};

pub struct Status {
  active: bool,
  dirty: bool,
}

impl Status {
  /// Start a status line on stderr. Disabled when stderr is not a
  /// terminal or when machine-readable output was requested.
  pub fn start(suppress: bool) -> Self {
    Self {
      active: !suppress && stderr().is_terminal(),
      dirty: false,
    }
  }

  pub fn set(&mut self, message: &str) {
    if !self.active {
      return;
    }

    let mut err = stderr();
    let _ = write!(err, "\r\x1b[K{}", message);
    let _ = err.flush();
    self.dirty = true;
  }

  /// Clear the status line and disable further updates.
  pub fn stop(&mut self) {
    if self.dirty {
      let mut err = stderr();
      let _ = write!(err, "\r\x1b[K");
      let _ = err.flush();
      self.dirty = false;
    }
    self.active = false;
  }
}

impl Drop for Status {
  fn drop(&mut self) {
    self.stop();
  }
}
