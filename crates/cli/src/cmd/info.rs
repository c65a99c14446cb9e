//! Implementation of the `pybundle info` command.
//!
//! Prints the paths a preset derives in the current workspace and the relocation edits its
//! post-processing would apply. Nothing is built or touched.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use pybundle_lib::platform::ProjectPaths;
use pybundle_lib::relocate::Relocation;
use pybundle_lib::{Builder, BuilderSpec, Settings};

use crate::output::{OutputFormat, print_json, print_stat, print_success, symbols};

pub fn cmd_info(variant: &str, external: &str, root: PathBuf, format: OutputFormat) -> Result<()> {
  let spec = BuilderSpec::preset(variant)?;
  let settings = Settings::new().with("external", external);
  let builder = Builder::new(spec, &settings, Arc::new(ProjectPaths::new(root)))
    .with_context(|| format!("Failed to configure builder '{}'", variant))?;
  let layout = builder.layout();

  let paths = [
    ("download", layout.download_path()),
    ("source", layout.src_path()),
    ("prefix", layout.prefix()),
    ("library", layout.library()),
    ("interpreter", layout.interpreter()),
    ("site-packages", layout.site_packages()),
    ("bundle root", layout.bundle_root()),
    ("plugin", layout.plugin_bundle()),
    ("plugin resources", layout.plugin_resources()),
  ];
  let plan = builder.relocation_plan();

  if format.is_json() {
    let path_map: serde_json::Map<String, serde_json::Value> = paths
      .iter()
      .map(|(label, path)| (label.to_string(), path.display().to_string().into()))
      .collect();
    let json_output = serde_json::json!({
      "name": builder.name(),
      "variant": builder.variant(),
      "version": builder.version(),
      "url": layout.url(),
      "paths": path_map,
      "relocation": plan,
    });
    return print_json(&json_output);
  }

  print_success(&format!("{} ({} {})", builder.name(), builder.variant(), builder.version()));
  print_stat("url", &layout.url());
  for (label, path) in &paths {
    print_stat(label, &path.display().to_string());
  }

  if !plan.is_empty() {
    println!();
    println!("Relocation:");
    for edit in &plan {
      println!("  {}", describe(edit));
    }
  }

  Ok(())
}

fn describe(edit: &Relocation) -> String {
  match edit {
    Relocation::CopyTree { from, to } => {
      format!("copy {} {} {}", from.display(), symbols::ARROW, to.display())
    }
    Relocation::SetId { binary, id } => format!("id {} {} {}", binary.display(), symbols::ARROW, id),
    Relocation::Change {
      binary,
      library_names,
      new,
    } => format!(
      "change {} [{}] {} {}",
      binary.display(),
      library_names.join(", "),
      symbols::ARROW,
      new
    ),
  }
}
