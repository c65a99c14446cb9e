//! Binary relocation engine.
//!
//! A compiled runtime embeds absolute load paths to its library. Before it can ship, those
//! paths are rewritten to `@loader_path/` forms valid for where the runtime ends up:
//!
//! - package context: the runtime stays under `support/` and is moved around as one tree
//! - extension context: the runtime is copied into a plugin bundle's `Contents/Resources`
//!
//! Planning is pure: [`plan`] turns a set of [`RelocationTargets`] into a [`RelocationPlan`].
//! [`apply`] then executes the plan through a [`LoadPathEditor`].

mod editor;
mod loadpath;

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::build::{ArtifactKind, RelocationPolicy};
use crate::error::StepError;
use crate::util::fs::{copy_tree, make_writable, remove_path};

pub use editor::{InstallNameTool, LoadPathEditor};
pub use loadpath::{loader_relative, normalize, reference_name, relative_path, resolve_load_path};

/// One edit of a relocation plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Relocation {
  /// Replace `to` with a copy of the tree at `from`.
  CopyTree { from: PathBuf, to: PathBuf },
  /// Set a dynamic library's own install name.
  SetId { binary: PathBuf, id: String },
  /// Rewrite the reference in `binary` whose file name is one of `library_names`.
  ///
  /// The current value of the reference is read at apply time, so a plan applies equally to a
  /// freshly built binary and to one that was already relocated.
  Change {
    binary: PathBuf,
    library_names: Vec<String>,
    new: String,
  },
}

pub type RelocationPlan = Vec<Relocation>;

/// Locations the relocation plan is computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationTargets {
  pub kind: ArtifactKind,
  pub library: PathBuf,
  pub interpreter: PathBuf,
  /// File names a binary may use when referencing the library.
  pub library_names: Vec<String>,
  /// Tree copied into the plugin for the extension context.
  pub bundle_root: PathBuf,
  /// Where `bundle_root` lands inside the plugin resources.
  pub resources_root: PathBuf,
  /// The plugin's `Contents/MacOS` directory.
  pub plugin_macos: PathBuf,
  pub plugin_executable: PathBuf,
}

impl RelocationTargets {
  /// Map a path under the bundle root into its copy inside the plugin resources.
  fn in_resources(&self, path: &Path) -> PathBuf {
    match path.strip_prefix(&self.bundle_root) {
      Ok(rel) => self.resources_root.join(rel),
      Err(_) => path.to_path_buf(),
    }
  }
}

fn parent(path: &Path) -> &Path {
  path.parent().unwrap_or_else(|| Path::new(""))
}

/// Compute the edits for `policy`. Static libraries carry no load paths, so they get no edits.
pub fn plan(policy: RelocationPolicy, targets: &RelocationTargets) -> RelocationPlan {
  if targets.kind == ArtifactKind::Static {
    return Vec::new();
  }
  match policy {
    RelocationPolicy::None => Vec::new(),
    RelocationPolicy::Package => plan_package(targets),
    RelocationPolicy::Extension => plan_extension(targets),
  }
}

/// Library id relative to the plugin executable, interpreter reference relative to itself.
pub fn plan_package(t: &RelocationTargets) -> RelocationPlan {
  vec![
    Relocation::SetId {
      binary: t.library.clone(),
      id: loader_relative(&t.plugin_macos, &t.library),
    },
    Relocation::Change {
      binary: t.interpreter.clone(),
      library_names: t.library_names.clone(),
      new: loader_relative(parent(&t.interpreter), &t.library),
    },
  ]
}

/// Copy the runtime into the plugin resources and point the copy and the plugin at it.
pub fn plan_extension(t: &RelocationTargets) -> RelocationPlan {
  let library = t.in_resources(&t.library);
  let interpreter = t.in_resources(&t.interpreter);

  vec![
    Relocation::CopyTree {
      from: t.bundle_root.clone(),
      to: t.resources_root.clone(),
    },
    Relocation::SetId {
      binary: library.clone(),
      id: loader_relative(&t.plugin_macos, &library),
    },
    Relocation::Change {
      binary: interpreter.clone(),
      library_names: t.library_names.clone(),
      new: loader_relative(parent(&interpreter), &library),
    },
    Relocation::Change {
      binary: t.plugin_executable.clone(),
      library_names: t.library_names.clone(),
      new: loader_relative(&t.plugin_macos, &library),
    },
  ]
}

/// Execute a plan in order. Any missing binary or reference aborts with an error.
pub async fn apply(plan: &[Relocation], editor: &dyn LoadPathEditor) -> Result<(), StepError> {
  for edit in plan {
    match edit {
      Relocation::CopyTree { from, to } => {
        if !from.exists() {
          return Err(StepError::missing("runtime tree", from));
        }
        remove_path(to)?;
        copy_tree(from, to)?;
        info!(from = %from.display(), to = %to.display(), "copied runtime");
      }
      Relocation::SetId { binary, id } => {
        require_binary(binary)?;
        make_writable(binary)?;
        editor.set_install_name(binary, id).await?;
        info!(binary = %binary.display(), id = %id, "set install name");
      }
      Relocation::Change {
        binary,
        library_names,
        new,
      } => {
        require_binary(binary)?;
        let old = find_reference(editor, binary, library_names).await?;
        if &old == new {
          debug!(binary = %binary.display(), reference = %new, "reference already relocated");
          continue;
        }
        make_writable(binary)?;
        editor.change_reference(binary, &old, new).await?;
        info!(binary = %binary.display(), old = %old, new = %new, "changed reference");
      }
    }
  }
  Ok(())
}

fn require_binary(binary: &Path) -> Result<(), StepError> {
  if binary.is_file() {
    Ok(())
  } else {
    Err(StepError::missing("binary", binary))
  }
}

async fn find_reference(
  editor: &dyn LoadPathEditor,
  binary: &Path,
  library_names: &[String],
) -> Result<String, StepError> {
  editor
    .references(binary)
    .await?
    .into_iter()
    .find(|r| library_names.iter().any(|name| name == reference_name(r)))
    .ok_or_else(|| StepError::MissingReference {
      binary: binary.to_path_buf(),
      library: library_names.join(" | "),
    })
}
