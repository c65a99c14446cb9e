//! Error types shared by builders, projects and recipes.
//!
//! Three layers:
//! - [`ConfigError`]: the recipe graph or a setting is inconsistent
//! - [`StepError`]: a single lifecycle step failed (missing artifact, failed tool)
//! - [`Error`]: a step or verb failure annotated with the builder, project and verb involved

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::build::{Step, Verb};

/// The recipe, project or builder configuration cannot be resolved.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("unknown builder variant: {0}")]
  UnknownVariant(String),

  #[error("builder '{builder}' in project '{project}' depends on unknown builder '{dependency}'")]
  UnknownBuilder {
    project: String,
    builder: String,
    dependency: String,
  },

  #[error("project '{project}' depends on unknown project '{dependency}'")]
  UnknownProject { project: String, dependency: String },

  #[error("builder '{builder}' belongs to unknown project '{project}'")]
  UnknownOwner { builder: String, project: String },

  #[error("duplicate {kind} '{name}'")]
  Duplicate { kind: &'static str, name: String },

  #[error("dependency cycle detected involving: {}", .members.join(", "))]
  Cycle { members: Vec<String> },

  #[error("setting '{key}' must be {expected}")]
  SettingType { key: String, expected: &'static str },

  #[error("setting '{key}' has an invalid pattern '{pattern}': {message}")]
  Pattern {
    key: String,
    pattern: String,
    message: String,
  },

  #[error("failed to read recipe {}: {source}", .path.display())]
  ReadRecipe {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse recipe {}: {source}", .path.display())]
  ParseRecipe {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },
}

/// Failure of one lifecycle step.
#[derive(Debug, Error)]
pub enum StepError {
  /// An artifact the step relies on is absent.
  #[error("expected {what} at {}", .path.display())]
  MissingArtifact { what: &'static str, path: PathBuf },

  /// A binary does not reference the library it should be relinked against.
  #[error("{} has no load command referencing {library}", .binary.display())]
  MissingReference { binary: PathBuf, library: String },

  #[error("fetch failed for {url}: {message}")]
  Fetch { url: String, message: String },

  #[error("command failed with exit code {code:?}: {cmd}")]
  Command { cmd: String, code: Option<i32> },

  #[error("archive error at {}: {message}", .path.display())]
  Archive { path: PathBuf, message: String },

  #[error("io error at {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Config(#[from] ConfigError),
}

impl StepError {
  /// Adapter for `map_err` attaching the path an I/O error happened at.
  pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> StepError {
    let path = path.into();
    move |source| StepError::Io { path, source }
  }

  pub fn missing(what: &'static str, path: impl Into<PathBuf>) -> StepError {
    StepError::MissingArtifact {
      what,
      path: path.into(),
    }
  }
}

/// Top-level error returned by builders, projects and recipes.
#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error("{builder}: {step} failed: {source}")]
  Step {
    builder: String,
    step: Step,
    #[source]
    source: StepError,
  },

  #[error("{verb} of project '{project}' failed: {source}")]
  Verb {
    verb: Verb,
    project: String,
    #[source]
    source: Box<Error>,
  },
}

impl Error {
  /// The innermost step error, if the failure came from a lifecycle step.
  pub fn step_error(&self) -> Option<&StepError> {
    match self {
      Error::Step { source, .. } => Some(source),
      Error::Verb { source, .. } => source.step_error(),
      Error::Config(_) => None,
    }
  }

  /// The builder and step that failed, if any.
  pub fn failed_step(&self) -> Option<(&str, Step)> {
    match self {
      Error::Step { builder, step, .. } => Some((builder, *step)),
      Error::Verb { source, .. } => source.failed_step(),
      Error::Config(_) => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
