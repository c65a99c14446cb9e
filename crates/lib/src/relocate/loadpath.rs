//! Lexical load-path arithmetic.
//!
//! Mach-O load commands may start with `@loader_path/` (the directory of the binary doing the
//! loading) or `@executable_path/` (the directory of the main executable). Every computation
//! here is purely lexical; nothing touches the filesystem.

use std::path::{Component, Path, PathBuf};

pub const LOADER_PATH: &str = "@loader_path";
pub const EXECUTABLE_PATH: &str = "@executable_path";

/// Collapse `.` and `..` components without consulting the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        if !out.pop() {
          out.push("..");
        }
      }
      other => out.push(other.as_os_str()),
    }
  }
  out
}

/// Path from directory `from` to `to`, e.g. `relative_path("/a/b/c", "/a/d")` is `../../d`.
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
  let from = normalize(from);
  let to = normalize(to);
  let from: Vec<_> = from.components().collect();
  let to: Vec<_> = to.components().collect();

  let common = from.iter().zip(to.iter()).take_while(|(a, b)| a == b).count();

  let mut rel = PathBuf::new();
  for _ in common..from.len() {
    rel.push("..");
  }
  for component in &to[common..] {
    rel.push(component.as_os_str());
  }
  rel
}

/// `@loader_path/<path from loader_dir to target>`
pub fn loader_relative(loader_dir: &Path, target: &Path) -> String {
  let rel = relative_path(loader_dir, target);
  format!("{}/{}", LOADER_PATH, rel.to_string_lossy().replace('\\', "/"))
}

/// Expand a load-path reference as seen from `loader`, the binary containing it.
///
/// `@loader_path` and `@executable_path` both resolve against the loader's directory; the
/// binaries rewritten here are either the executable itself or loaded from the plugin
/// executable's directory. Plain paths are returned normalized.
pub fn resolve_load_path(reference: &str, loader: &Path) -> PathBuf {
  let loader_dir = loader.parent().unwrap_or_else(|| Path::new(""));
  for token in [LOADER_PATH, EXECUTABLE_PATH] {
    if let Some(rest) = reference.strip_prefix(token) {
      return normalize(&loader_dir.join(rest.trim_start_matches('/')));
    }
  }
  normalize(Path::new(reference))
}

/// Final component of a reference, used to match it against library names.
pub fn reference_name(reference: &str) -> &str {
  reference.rsplit('/').next().unwrap_or(reference)
}
