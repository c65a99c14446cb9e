//! Implementation of the lifecycle commands: `reset`, `clean`, `build` and `install`.
//!
//! Each command loads one recipe, runs exactly one verb over it and prints a summary.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::debug;

use pybundle_lib::platform::ProjectPaths;
use pybundle_lib::{Env, Recipe, Verb};

use crate::output::{format_duration, print_info, print_stat, print_success};

/// Where the recipe of a run comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipeSource {
  /// The built-in recipe: third-party libraries plus a shared python for the `pyjs` external.
  Defaults,
  /// A single named preset.
  Variant(String),
  /// A YAML file with a `projects` tree.
  Tree(PathBuf),
  /// A YAML file mapping projects to builder names.
  Flat(PathBuf),
}

impl RecipeSource {
  pub fn load(&self, paths: ProjectPaths) -> Result<Recipe> {
    let recipe = match self {
      RecipeSource::Defaults => Recipe::from_defaults(paths),
      RecipeSource::Variant(name) => Recipe::for_variant(name, paths),
      RecipeSource::Tree(path) => Recipe::from_tree_yaml(path, paths),
      RecipeSource::Flat(path) => Recipe::from_flat_yaml(path, paths),
    };
    recipe.context("Failed to load recipe")
  }
}

pub fn cmd_verb(verb: Verb, source: RecipeSource, root: PathBuf) -> Result<()> {
  let paths = ProjectPaths::new(&root);
  let mut recipe = source.load(paths)?;
  debug!(recipe = recipe.name(), root = %root.display(), "recipe loaded");

  let schedule: Vec<String> = recipe
    .schedule(verb)?
    .into_iter()
    .map(|(project, verb)| format!("{} ({})", project, verb))
    .collect();
  print_info(&format!("{} {}: {}", verb, recipe.name(), schedule.join(", ")));

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let started = Instant::now();
  rt.block_on(recipe.run(verb, &Env::system()))
    .with_context(|| format!("{} failed", verb))?;

  print_success(&format!("{} complete", verb));
  print_stat("Recipe", recipe.name());
  print_stat("Projects", &recipe.projects().len().to_string());
  print_stat("Runs", &schedule.len().to_string());
  print_stat("Root", &root.display().to_string());
  print_stat("Duration", &format_duration(started.elapsed()));

  Ok(())
}
