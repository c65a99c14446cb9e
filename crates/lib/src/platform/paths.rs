use std::path::{Path, PathBuf};

use crate::consts::{FRAMEWORK_NAME, PLUGIN_EXTENSION, ROOT_ENV};

/// Returns the workspace root: `PYBUNDLE_ROOT` if set, otherwise the current directory.
pub fn workspace_root() -> PathBuf {
  if let Some(root) = std::env::var_os(ROOT_ENV).filter(|v| !v.is_empty()) {
    return PathBuf::from(root);
  }
  std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Directory layout of a workspace.
///
/// ```text
/// <root>/
///   patch/                       source patches and Setup.local files
///   support/<product>/           relocatable runtimes (package context)
///   support/Frameworks/          framework builds
///   externals/<name>.mxo/        plugin bundles (extension context)
///   targets/build/downloads/     source archives
///   targets/build/src/           extracted sources
///   targets/build/lib/           third-party dependency prefixes
/// ```
///
/// Every path is derived from the root on demand, so a `ProjectPaths` never goes stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
  root: PathBuf,
}

impl ProjectPaths {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn from_env() -> Self {
    Self::new(workspace_root())
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn patch(&self) -> PathBuf {
    self.root.join("patch")
  }

  pub fn support(&self) -> PathBuf {
    self.root.join("support")
  }

  pub fn frameworks(&self) -> PathBuf {
    self.support().join("Frameworks")
  }

  pub fn framework_bundle(&self) -> PathBuf {
    self.frameworks().join(FRAMEWORK_NAME)
  }

  pub fn externals(&self) -> PathBuf {
    self.root.join("externals")
  }

  /// Plugin bundle for the named external, e.g. `externals/py.mxo`.
  pub fn external(&self, name: &str) -> PathBuf {
    self.externals().join(format!("{}.{}", name, PLUGIN_EXTENSION))
  }

  pub fn targets(&self) -> PathBuf {
    self.root.join("targets")
  }

  pub fn build_dir(&self) -> PathBuf {
    self.targets().join("build")
  }

  pub fn downloads(&self) -> PathBuf {
    self.build_dir().join("downloads")
  }

  pub fn src(&self) -> PathBuf {
    self.build_dir().join("src")
  }

  pub fn build_lib(&self) -> PathBuf {
    self.build_dir().join("lib")
  }
}
