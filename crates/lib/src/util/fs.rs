//! Filesystem helpers used by the lifecycle steps.
//!
//! Every helper reports failures as `StepError::Io` carrying the offending path.

use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::error::StepError;
use crate::relocate::{normalize, relative_path};

/// Remove a file, symlink or directory tree. Missing paths are not an error.
pub fn remove_path(path: &Path) -> Result<bool, StepError> {
  let metadata = match fs::symlink_metadata(path) {
    Ok(m) => m,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
    Err(e) => return Err(StepError::Io {
      path: path.to_path_buf(),
      source: e,
    }),
  };

  let result = if metadata.is_dir() {
    fs::remove_dir_all(path)
  } else {
    fs::remove_file(path)
  };

  match result {
    Ok(()) => {
      debug!(path = %path.display(), "removed");
      Ok(true)
    }
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
    Err(e) => Err(StepError::Io {
      path: path.to_path_buf(),
      source: e,
    }),
  }
}

pub fn ensure_dir(path: &Path) -> Result<(), StepError> {
  fs::create_dir_all(path).map_err(StepError::io(path))
}

/// Move `from` to `to`, creating the destination's parent and replacing an existing destination.
pub fn move_path(from: &Path, to: &Path) -> Result<(), StepError> {
  if let Some(parent) = to.parent() {
    ensure_dir(parent)?;
  }
  remove_path(to)?;
  fs::rename(from, to).map_err(StepError::io(from))
}

/// Copy a file, creating the destination's parent.
pub fn copy_file(from: &Path, to: &Path) -> Result<(), StepError> {
  if let Some(parent) = to.parent() {
    ensure_dir(parent)?;
  }
  fs::copy(from, to).map_err(StepError::io(from))?;
  Ok(())
}

/// Recursively copy `from` into `to`. Symlinks inside `from` are recreated, others are followed.
pub fn copy_tree(from: &Path, to: &Path) -> Result<(), StepError> {
  copy_tree_within(from, to, from, &[])
}

/// Recursively copy `from` into `to`, skipping entries named in `exclude`.
///
/// Symlinks resolving inside `boundary` are recreated with a relative target. Symlinks leading
/// out of it are replaced by a copy of what they point at, so the result never refers back to
/// the host. Dangling symlinks are recreated as they are.
pub fn copy_tree_within(from: &Path, to: &Path, boundary: &Path, exclude: &[&str]) -> Result<(), StepError> {
  if !from.exists() {
    return Err(StepError::missing("directory to copy", from));
  }
  let boundary = fs::canonicalize(boundary).map_err(StepError::io(boundary))?;

  let walker = WalkDir::new(from).follow_links(false).into_iter().filter_entry(|e| {
    e.file_name()
      .to_str()
      .map(|name| !exclude.contains(&name))
      .unwrap_or(true)
  });

  for entry in walker {
    let entry = entry.map_err(|e| StepError::Io {
      path: from.to_path_buf(),
      source: io::Error::from(e),
    })?;
    let rel = entry.path().strip_prefix(from).unwrap_or(entry.path());
    let dest = to.join(rel);
    let file_type = entry.file_type();

    if file_type.is_dir() {
      ensure_dir(&dest)?;
    } else if file_type.is_symlink() {
      copy_link(entry.path(), &dest, &boundary, exclude)?;
    } else {
      copy_file(entry.path(), &dest)?;
    }
  }

  Ok(())
}

fn copy_link(link: &Path, dest: &Path, boundary: &Path, exclude: &[&str]) -> Result<(), StepError> {
  let target = fs::read_link(link).map_err(StepError::io(link))?;
  let Ok(real) = fs::canonicalize(link) else {
    debug!(link = %link.display(), "dangling symlink");
    return make_symlink(&target, dest);
  };

  if real.starts_with(boundary) {
    if target.is_relative() {
      return make_symlink(&target, dest);
    }
    let parent = link.parent().unwrap_or(link);
    let parent = fs::canonicalize(parent).map_err(StepError::io(parent))?;
    return make_symlink(&relative_path(&parent, &real), dest);
  }

  debug!(link = %link.display(), target = %real.display(), "following symlink out of the tree");
  if real.is_dir() {
    copy_tree_within(&real, dest, &real, exclude)
  } else {
    copy_file(&real, dest)
  }
}

/// Re-point symlinks below `root` that lead to `old` so they lead to `new`.
///
/// Returns how many links were rewritten.
pub fn repoint_symlinks(root: &Path, old: &Path, new: &Path) -> Result<usize, StepError> {
  let old = normalize(old);
  let mut rewritten = 0;

  for entry in WalkDir::new(root).follow_links(false) {
    let entry = entry.map_err(|e| StepError::Io {
      path: root.to_path_buf(),
      source: io::Error::from(e),
    })?;
    if !entry.file_type().is_symlink() {
      continue;
    }
    let link = entry.path();
    let parent = link.parent().unwrap_or(root);
    let target = fs::read_link(link).map_err(StepError::io(link))?;
    if normalize(&parent.join(&target)) != old {
      continue;
    }

    make_symlink(&relative_path(parent, new), link)?;
    debug!(link = %link.display(), target = %new.display(), "re-pointed symlink");
    rewritten += 1;
  }

  Ok(rewritten)
}

#[cfg(unix)]
fn make_symlink(target: &Path, dest: &Path) -> Result<(), StepError> {
  if let Some(parent) = dest.parent() {
    ensure_dir(parent)?;
  }
  remove_path(dest)?;
  std::os::unix::fs::symlink(target, dest).map_err(StepError::io(dest))
}

#[cfg(not(unix))]
fn make_symlink(target: &Path, dest: &Path) -> Result<(), StepError> {
  let source = dest.parent().map(|p| p.join(target)).unwrap_or_else(|| target.to_path_buf());
  remove_path(dest)?;
  copy_file(&source, dest)
}

/// Make a file writable by its owner. Installed libraries are often read-only.
pub fn make_writable(path: &Path) -> Result<(), StepError> {
  let mut perms = fs::metadata(path).map_err(StepError::io(path))?.permissions();
  if perms.readonly() {
    #[allow(clippy::permissions_set_readonly_false)]
    perms.set_readonly(false);
    fs::set_permissions(path, perms).map_err(StepError::io(path))?;
  }
  Ok(())
}
