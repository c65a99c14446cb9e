//! Trimming an installed runtime down to what ships.
//!
//! Removal lists come from settings (`test_patterns`, `test_dirs`, `remove_packages`,
//! `remove_extensions`, `remove_binaries`), each falling back to a default list.

use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::layout::Layout;
use crate::error::{ConfigError, StepError};
use crate::execute::zip_directory;
use crate::settings::Settings;
use crate::util::fs::{ensure_dir, move_path, remove_path};

const TEST_PATTERNS: &[&str] = &["test_*.py", "*_test.py"];
const TEST_DIRS: &[&str] = &["test", "tests", "idle_test"];
const REMOVE_PACKAGES: &[&str] = &[
  "ensurepip",
  "idlelib",
  "lib2to3",
  "tkinter",
  "turtledemo",
  "pydoc_data",
  "distutils/command",
];
const REMOVE_EXTENSIONS: &[&str] = &["_tkinter*", "_test*", "_ctypes_test*", "xxlimited*", "_xxtestfuzz*"];
const REMOVE_BINARIES: &[&str] = &["2to3*", "idle3*", "pydoc3*", "python3*-config"];

#[derive(Debug, Clone)]
pub struct StripOptions {
  pub test_patterns: Vec<Pattern>,
  pub test_dirs: Vec<String>,
  /// Package directories relative to the standard library.
  pub packages: Vec<String>,
  pub extensions: Vec<Pattern>,
  pub binaries: Vec<Pattern>,
}

/// Counts of what a strip pass removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StripReport {
  pub bytecode: usize,
  pub tests: usize,
  pub packages: usize,
  pub extensions: usize,
  pub binaries: usize,
}

impl StripReport {
  pub fn total(&self) -> usize {
    self.bytecode + self.tests + self.packages + self.extensions + self.binaries
  }
}

impl StripOptions {
  pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
    Ok(Self {
      test_patterns: patterns(settings, "test_patterns", TEST_PATTERNS)?,
      test_dirs: settings.list_or("test_dirs", TEST_DIRS)?,
      packages: settings.list_or("remove_packages", REMOVE_PACKAGES)?,
      extensions: patterns(settings, "remove_extensions", REMOVE_EXTENSIONS)?,
      binaries: patterns(settings, "remove_binaries", REMOVE_BINARIES)?,
    })
  }
}

fn patterns(settings: &Settings, key: &str, default: &[&str]) -> Result<Vec<Pattern>, ConfigError> {
  settings
    .list_or(key, default)?
    .into_iter()
    .map(|p| {
      Pattern::new(&p).map_err(|e| ConfigError::Pattern {
        key: key.to_string(),
        pattern: p.clone(),
        message: e.to_string(),
      })
    })
    .collect()
}

fn matches_any(patterns: &[Pattern], name: &str) -> bool {
  patterns.iter().any(|p| p.matches(name))
}

/// Remove bytecode, tests, unwanted packages, extensions and binaries from an installed runtime.
pub fn strip(layout: &Layout<'_>, options: &StripOptions) -> Result<StripReport, StepError> {
  let mut report = StripReport::default();
  let python_lib = layout.python_lib();

  if python_lib.exists() {
    let (bytecode, tests) = strip_tree(&python_lib, options)?;
    report.bytecode = bytecode;
    report.tests = tests;

    for package in &options.packages {
      if remove_path(&python_lib.join(package))? {
        report.packages += 1;
      }
    }

    report.extensions = remove_matching(&layout.lib_dynload(), &options.extensions)?;
  }

  report.binaries = remove_matching(&layout.prefix_bin(), &options.binaries)?;

  info!(
    prefix = %layout.prefix().display(),
    bytecode = report.bytecode,
    tests = report.tests,
    packages = report.packages,
    extensions = report.extensions,
    binaries = report.binaries,
    "stripped runtime"
  );
  Ok(report)
}

/// Remove `__pycache__`, `*.pyc`, test directories and test files under `root`.
fn strip_tree(root: &Path, options: &StripOptions) -> Result<(usize, usize), StepError> {
  let mut bytecode: Vec<PathBuf> = Vec::new();
  let mut tests: Vec<PathBuf> = Vec::new();

  let mut walker = WalkDir::new(root).min_depth(1).into_iter();
  while let Some(entry) = walker.next() {
    let entry = entry.map_err(|e| StepError::Io {
      path: root.to_path_buf(),
      source: std::io::Error::from(e),
    })?;
    let name = entry.file_name().to_string_lossy();

    if entry.file_type().is_dir() {
      if name == "__pycache__" {
        bytecode.push(entry.path().to_path_buf());
        walker.skip_current_dir();
      } else if options.test_dirs.iter().any(|d| d == name.as_ref()) {
        tests.push(entry.path().to_path_buf());
        walker.skip_current_dir();
      }
    } else if name.ends_with(".pyc") {
      bytecode.push(entry.path().to_path_buf());
    } else if matches_any(&options.test_patterns, &name) {
      tests.push(entry.path().to_path_buf());
    }
  }

  for path in bytecode.iter().chain(tests.iter()) {
    debug!(path = %path.display(), "removing");
    remove_path(path)?;
  }
  Ok((bytecode.len(), tests.len()))
}

/// Remove direct children of `dir` whose names match any pattern.
fn remove_matching(dir: &Path, patterns: &[Pattern]) -> Result<usize, StepError> {
  if !dir.is_dir() {
    return Ok(0);
  }
  let mut removed = 0;
  for entry in std::fs::read_dir(dir).map_err(StepError::io(dir))? {
    let entry = entry.map_err(StepError::io(dir))?;
    let name = entry.file_name().to_string_lossy().to_string();
    if matches_any(patterns, &name) && remove_path(&entry.path())? {
      removed += 1;
    }
  }
  Ok(removed)
}

/// Compress the standard library into `lib/python<XY>.zip`.
///
/// `lib-dynload` and `os.py` stay on disk (the interpreter needs them before it can import from
/// a zip), and `site-packages` is recreated empty.
pub fn ziplib(layout: &Layout<'_>) -> Result<PathBuf, StepError> {
  let python_lib = layout.python_lib();
  if !python_lib.is_dir() {
    return Err(StepError::missing("standard library", python_lib));
  }

  let staging = layout.prefix_lib();
  let keep = [
    (layout.lib_dynload(), staging.join("lib-dynload")),
    (python_lib.join("os.py"), staging.join("os.py")),
  ];

  for (from, to) in &keep {
    if from.exists() {
      move_path(from, to)?;
    }
  }

  remove_path(&layout.site_packages())?;

  let zipped = layout.zipped_lib();
  remove_path(&zipped)?;
  zip_directory(&python_lib, &zipped)?;

  remove_path(&python_lib)?;
  ensure_dir(&python_lib)?;

  for (from, to) in &keep {
    if to.exists() {
      move_path(to, from)?;
    }
  }
  ensure_dir(&layout.site_packages())?;

  info!(zip = %zipped.display(), "zipped standard library");
  Ok(zipped)
}
