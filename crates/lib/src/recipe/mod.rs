//! Recipes: the top-level ordered list of projects.
//!
//! For every verb, projects run in declared order and each project's dependency projects are
//! processed first (transitively, dependency-first). Dependency projects of an `install`
//! receive `build`, and every declared project still receives the verb itself. A project runs a
//! given verb at most once, and a project already installed is not built again.

mod yaml;

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::build::{BuilderSpec, Verb};
use crate::consts::APP_NAME;
use crate::dag::DependencyDag;
use crate::error::{ConfigError, Result};
use crate::execute::Env;
use crate::platform::ProjectPaths;
use crate::project::{Project, ProjectSpec};
use crate::settings::Settings;

pub use yaml::{parse_flat_yaml, parse_tree_yaml};

/// Declarative description of a recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeSpec {
  pub name: String,
  pub settings: Settings,
  pub projects: Vec<ProjectSpec>,
}

impl RecipeSpec {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      settings: Settings::new(),
      projects: Vec::new(),
    }
  }

  pub fn with_project(mut self, project: ProjectSpec) -> Self {
    self.projects.push(project);
    self
  }

  pub fn with_settings(mut self, settings: Settings) -> Self {
    self.settings = settings;
    self
  }

  /// Third-party libraries first, then a shared python for the `pyjs` external.
  pub fn defaults() -> Result<Self, ConfigError> {
    let python = ProjectSpec::new("python")
      .with_builder(BuilderSpec::preset("openssl")?)
      .with_builder(BuilderSpec::preset("bzip2")?);
    let pyjs = ProjectSpec::new("pyjs")
      .with_settings(Settings::new().with("external", "pyjs"))
      .with_depends_on(["python"])
      .with_builder(BuilderSpec::preset("src-shared-pkg")?);
    Ok(Self::new(APP_NAME).with_project(python).with_project(pyjs))
  }

  /// One project building a single preset.
  pub fn for_variant(variant: &str) -> Result<Self, ConfigError> {
    let project = ProjectSpec::new(variant).with_builder(BuilderSpec::preset(variant)?);
    Ok(Self::new(variant).with_project(project))
  }
}

#[derive(Debug)]
pub struct Recipe {
  name: String,
  settings: Settings,
  projects: Vec<Project>,
  dag: DependencyDag,
}

impl Recipe {
  /// Bind a recipe spec to a workspace.
  ///
  /// # Errors
  ///
  /// Duplicate project names, unknown project dependencies, project cycles and every
  /// project-level configuration error.
  pub fn from_spec(spec: RecipeSpec, paths: ProjectPaths) -> Result<Self, ConfigError> {
    let paths = Arc::new(paths);

    let mut dag = DependencyDag::new();
    for project in &spec.projects {
      if !dag.add_node(&project.name) {
        return Err(ConfigError::Duplicate {
          kind: "project",
          name: project.name.clone(),
        });
      }
    }
    for project in &spec.projects {
      for dependency in &project.depends_on {
        if !dag.add_dependency(&project.name, dependency) {
          return Err(ConfigError::UnknownProject {
            project: project.name.clone(),
            dependency: dependency.clone(),
          });
        }
      }
    }
    dag.topological_order()?;

    let projects = spec
      .projects
      .into_iter()
      .map(|p| Project::from_spec(p, &spec.settings, Arc::clone(&paths)))
      .collect::<Result<Vec<_>, _>>()?;

    Ok(Self {
      name: spec.name,
      settings: spec.settings,
      projects,
      dag,
    })
  }

  pub fn from_defaults(paths: ProjectPaths) -> Result<Self, ConfigError> {
    Self::from_spec(RecipeSpec::defaults()?, paths)
  }

  pub fn for_variant(variant: &str, paths: ProjectPaths) -> Result<Self, ConfigError> {
    Self::from_spec(RecipeSpec::for_variant(variant)?, paths)
  }

  /// Load a tree-shaped YAML recipe (projects nest their builders).
  pub fn from_tree_yaml(path: &Path, paths: ProjectPaths) -> Result<Self, ConfigError> {
    let content = read_recipe(path)?;
    Self::from_spec(parse_tree_yaml(&content, path)?, paths)
  }

  /// Load a flat YAML recipe (builders listed separately, keyed by project).
  pub fn from_flat_yaml(path: &Path, paths: ProjectPaths) -> Result<Self, ConfigError> {
    let content = read_recipe(path)?;
    Self::from_spec(parse_flat_yaml(&content, path)?, paths)
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn settings(&self) -> &Settings {
    &self.settings
  }

  pub fn projects(&self) -> &[Project] {
    &self.projects
  }

  pub fn project(&self, name: &str) -> Option<&Project> {
    self.projects.iter().find(|p| p.name() == name)
  }

  fn index_of(&self, name: &str) -> Option<usize> {
    self.projects.iter().position(|p| p.name() == name)
  }

  /// The (project, verb) pairs `verb` runs, in execution order.
  pub fn schedule(&self, verb: Verb) -> Result<Vec<(&str, Verb)>, ConfigError> {
    Ok(
      self
        .schedule_indices(verb)?
        .into_iter()
        .map(|(i, v)| (self.projects[i].name(), v))
        .collect(),
    )
  }

  fn schedule_indices(&self, verb: Verb) -> Result<Vec<(usize, Verb)>, ConfigError> {
    let mut order: Vec<(usize, Verb)> = Vec::new();
    let mut push = |idx: usize, applied: Verb| {
      if !order.iter().any(|&(i, done)| i == idx && done.covers(applied)) {
        order.push((idx, applied));
      }
    };
    for (idx, project) in self.projects.iter().enumerate() {
      for dependency in self.dag.dependencies_of(project.name())? {
        if let Some(dep) = self.index_of(&dependency) {
          push(dep, verb.for_dependency());
        }
      }
      push(idx, verb);
    }
    Ok(order)
  }

  /// Run `verb` over every project, dependency projects first.
  pub async fn run(&mut self, verb: Verb, env: &Env) -> Result<()> {
    info!(recipe = %self.name, verb = %verb, "starting");
    for (idx, applied) in self.schedule_indices(verb)? {
      self.projects[idx].run(applied, env).await?;
    }
    info!(recipe = %self.name, verb = %verb, "finished");
    Ok(())
  }

  pub async fn reset(&mut self, env: &Env) -> Result<()> {
    self.run(Verb::Reset, env).await
  }

  pub async fn clean(&mut self, env: &Env) -> Result<()> {
    self.run(Verb::Clean, env).await
  }

  pub async fn build(&mut self, env: &Env) -> Result<()> {
    self.run(Verb::Build, env).await
  }

  pub async fn install(&mut self, env: &Env) -> Result<()> {
    self.run(Verb::Install, env).await
  }
}

fn read_recipe(path: &Path) -> Result<String, ConfigError> {
  std::fs::read_to_string(path).map_err(|source| ConfigError::ReadRecipe {
    path: path.to_path_buf(),
    source,
  })
}
