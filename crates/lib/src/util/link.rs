//! Symlink creation helpers.

use std::fs;
use std::io;
use std::path::Path;

/// Create `link` pointing at `target`, replacing any existing file or
/// symlink at that location. Parent directories are created as needed.
pub fn replace_symlink(target: &Path, link: &Path) -> io::Result<()> {
  if let Some(parent) = link.parent()
    && !parent.as_os_str().is_empty()
  {
    fs::create_dir_all(parent)?;
  }

  match fs::symlink_metadata(link) {
    Ok(_) => fs::remove_file(link)?,
    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
    Err(e) => return Err(e),
  }

  make_symlink(target, link)
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
  if target.is_dir() {
    std::os::windows::fs::symlink_dir(target, link)
  } else {
    std::os::windows::fs::symlink_file(target, link)
  }
}
