//! Shell command runner.
//!
//! Commands inherit the caller's environment; builds need the host compiler toolchain and SDK
//! paths, so nothing is cleared. Extra variables from the compile job are layered on top.

use std::collections::BTreeMap;
use std::path::Path;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::StepError;

/// Run `cmd` through the platform shell in `cwd`.
///
/// # Returns
///
/// The trimmed stdout of the command on success. A non-zero exit status is reported as
/// [`StepError::Command`] with the captured output logged at debug level.
pub async fn execute_cmd(cmd: &str, env: Option<&BTreeMap<String, String>>, cwd: &Path) -> Result<String, StepError> {
  info!(cmd = %cmd, "executing command");

  let (shell_cmd, shell_args) = get_shell();

  let mut command = Command::new(shell_cmd);
  command.args(shell_args).arg(cmd).current_dir(cwd);

  if let Some(extra) = env {
    for (key, value) in extra {
      command.env(key, value);
    }
  }

  debug!(shell = %shell_cmd, working_dir = ?cwd, "spawning process");

  let output = command.output().await.map_err(StepError::io(cwd))?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);

    if !stderr.is_empty() {
      debug!(stderr = %stderr, "command stderr");
    }
    if !stdout.is_empty() {
      debug!(stdout = %stdout, "command stdout");
    }

    return Err(StepError::Command {
      cmd: cmd.to_string(),
      code: output.status.code(),
    });
  }

  let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();

  if !stdout.is_empty() {
    debug!(stdout = %stdout, "command output");
  }

  Ok(stdout)
}

/// Quote an argument for `/bin/sh`.
pub fn quote(arg: &str) -> String {
  let safe = !arg.is_empty()
    && arg
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '@' | '=' | ':' | ',' | '+'));
  if safe {
    arg.to_string()
  } else {
    format!("'{}'", arg.replace('\'', r"'\''"))
  }
}

/// Join a program and its arguments into a quoted command line.
pub fn command_line<I, S>(args: I) -> String
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  args.into_iter().map(|a| quote(a.as_ref())).collect::<Vec<_>>().join(" ")
}

fn get_shell() -> (&'static str, &'static [&'static str]) {
  #[cfg(unix)]
  {
    ("/bin/sh", &["-c"])
  }

  #[cfg(windows)]
  {
    ("cmd.exe", &["/C"])
  }
}
