//! Compiling extracted sources into an install prefix.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use super::actions::{command_line, execute_cmd};
use crate::build::{ArtifactKind, Product};
use crate::error::StepError;

/// Everything a toolchain needs to turn a source tree into installed artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileJob {
  pub product: Product,
  pub kind: ArtifactKind,
  pub src_dir: PathBuf,
  pub prefix: PathBuf,
  /// Options passed to the configure script.
  pub configure: Vec<String>,
  pub env: BTreeMap<String, String>,
  pub jobs: usize,
  /// Artifacts the caller verifies once the toolchain returns.
  pub expected: Vec<PathBuf>,
}

#[async_trait]
pub trait Toolchain: Send + Sync {
  async fn compile(&self, job: &CompileJob) -> Result<(), StepError>;
}

/// Drives the upstream configure/make scripts through the shell.
#[derive(Debug, Default, Clone)]
pub struct ShellToolchain;

impl ShellToolchain {
  /// Command lines run in the source directory, in order.
  pub fn script(job: &CompileJob) -> Vec<String> {
    let prefix = format!("PREFIX={}", job.prefix.display());
    let jobs = format!("-j{}", job.jobs.max(1));

    match job.product {
      Product::Python => {
        let mut configure = vec!["./configure".to_string()];
        configure.extend(job.configure.iter().cloned());
        vec![
          command_line(&configure),
          command_line(["make", jobs.as_str()]),
          command_line(["make", "install"]),
        ]
      }
      Product::OpenSsl => {
        let mut config = vec!["./config".to_string()];
        config.extend(job.configure.iter().cloned());
        vec![
          command_line(&config),
          command_line(["make", jobs.as_str()]),
          command_line(["make", "install_sw"]),
        ]
      }
      Product::Bzip2 => vec![command_line(["make", "install", prefix.as_str()])],
    }
  }
}

#[async_trait]
impl Toolchain for ShellToolchain {
  async fn compile(&self, job: &CompileJob) -> Result<(), StepError> {
    info!(product = %job.product, kind = %job.kind, src = %job.src_dir.display(), "compiling");
    for cmd in Self::script(job) {
      execute_cmd(&cmd, Some(&job.env), &job.src_dir).await?;
    }
    Ok(())
  }
}
