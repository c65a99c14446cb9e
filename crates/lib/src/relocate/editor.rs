//! Reading and rewriting Mach-O load commands.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::error::StepError;
use crate::execute::actions::{command_line, execute_cmd};

/// Reads and rewrites the load paths embedded in a binary.
#[async_trait]
pub trait LoadPathEditor: Send + Sync {
  /// The binary's own install name, if it is a dynamic library.
  async fn install_name(&self, binary: &Path) -> Result<Option<String>, StepError>;

  /// Libraries the binary references, excluding its own install name.
  async fn references(&self, binary: &Path) -> Result<Vec<String>, StepError>;

  async fn set_install_name(&self, binary: &Path, id: &str) -> Result<(), StepError>;

  async fn change_reference(&self, binary: &Path, old: &str, new: &str) -> Result<(), StepError>;
}

/// Production editor driving `otool` and `install_name_tool`.
#[derive(Debug, Default, Clone)]
pub struct InstallNameTool;

impl InstallNameTool {
  async fn run(binary: &Path, args: &[&str]) -> Result<String, StepError> {
    let cwd = binary.parent().unwrap_or_else(|| Path::new("."));
    let binary = binary.to_string_lossy();
    let mut line: Vec<&str> = args.to_vec();
    line.push(binary.as_ref());
    execute_cmd(&command_line(line), None, cwd).await
  }
}

#[async_trait]
impl LoadPathEditor for InstallNameTool {
  async fn install_name(&self, binary: &Path) -> Result<Option<String>, StepError> {
    let output = Self::run(binary, &["otool", "-D"]).await?;
    Ok(parse_install_name(&output))
  }

  async fn references(&self, binary: &Path) -> Result<Vec<String>, StepError> {
    let output = Self::run(binary, &["otool", "-L"]).await?;
    let own = self.install_name(binary).await?;
    Ok(
      parse_references(&output)
        .into_iter()
        .filter(|r| Some(r) != own.as_ref())
        .collect(),
    )
  }

  async fn set_install_name(&self, binary: &Path, id: &str) -> Result<(), StepError> {
    debug!(binary = %binary.display(), id = %id, "setting install name");
    Self::run(binary, &["install_name_tool", "-id", id]).await?;
    Ok(())
  }

  async fn change_reference(&self, binary: &Path, old: &str, new: &str) -> Result<(), StepError> {
    debug!(binary = %binary.display(), old = %old, new = %new, "changing reference");
    Self::run(binary, &["install_name_tool", "-change", old, new]).await?;
    Ok(())
  }
}

/// Parse `otool -D` output: a `<path>:` header followed by the install name.
fn parse_install_name(output: &str) -> Option<String> {
  output
    .lines()
    .skip(1)
    .map(str::trim)
    .find(|l| !l.is_empty())
    .map(str::to_string)
}

/// Parse `otool -L` output: a `<path>:` header, then one `\t<ref> (compatibility ...)` per line.
fn parse_references(output: &str) -> Vec<String> {
  output
    .lines()
    .skip(1)
    .filter_map(|line| {
      let line = line.trim();
      let reference = line.split(" (").next().unwrap_or(line).trim();
      (!reference.is_empty()).then(|| reference.to_string())
    })
    .collect()
}
