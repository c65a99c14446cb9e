//! External collaborators: downloads, compilation and load-path editing.
//!
//! Each collaborator is a trait object so the CLI can wire the production implementations
//! and tests can wire doubles. [`Env`] bundles one of each.

pub mod actions;
pub mod archive;
pub mod toolchain;

use std::sync::Arc;

pub use actions::{Fetcher, HttpFetcher, download_to, execute_cmd, url_to_filename};
pub use archive::{unpack_archive, zip_directory};
pub use toolchain::{CompileJob, ShellToolchain, Toolchain};

use crate::relocate::{InstallNameTool, LoadPathEditor};

/// Collaborators used by the lifecycle steps.
#[derive(Clone)]
pub struct Env {
  pub fetcher: Arc<dyn Fetcher>,
  pub toolchain: Arc<dyn Toolchain>,
  pub editor: Arc<dyn LoadPathEditor>,
}

impl Env {
  pub fn new(fetcher: Arc<dyn Fetcher>, toolchain: Arc<dyn Toolchain>, editor: Arc<dyn LoadPathEditor>) -> Self {
    Self {
      fetcher,
      toolchain,
      editor,
    }
  }

  /// Production collaborators: HTTP downloads, configure/make and `install_name_tool`.
  pub fn system() -> Self {
    Self::new(
      Arc::new(HttpFetcher),
      Arc::new(ShellToolchain),
      Arc::new(InstallNameTool),
    )
  }
}

impl std::fmt::Debug for Env {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Env").finish_non_exhaustive()
  }
}
