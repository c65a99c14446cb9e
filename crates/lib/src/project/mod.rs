//! Projects: ordered groups of builders.
//!
//! A project owns the builders declared for it plus the dependency builders they pull in
//! (materialized once per name from the preset catalog). Builder dependencies form a graph;
//! a builder never runs before its dependencies are satisfied for the current verb.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::build::{Builder, BuilderSpec, Verb};
use crate::dag::DependencyDag;
use crate::error::{ConfigError, Error, Result};
use crate::execute::Env;
use crate::platform::ProjectPaths;
use crate::settings::Settings;

/// Declarative description of a project.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSpec {
  pub name: String,
  pub settings: Settings,
  /// Projects processed before this one.
  pub depends_on: Vec<String>,
  pub builders: Vec<BuilderSpec>,
}

impl ProjectSpec {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      settings: Settings::new(),
      depends_on: Vec::new(),
      builders: Vec::new(),
    }
  }

  pub fn with_builder(mut self, builder: BuilderSpec) -> Self {
    self.builders.push(builder);
    self
  }

  pub fn with_depends_on<I, S>(mut self, depends_on: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.depends_on = depends_on.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_settings(mut self, settings: Settings) -> Self {
    self.settings = settings;
    self
  }
}

#[derive(Debug)]
pub struct Project {
  name: String,
  settings: Settings,
  depends_on: Vec<String>,
  /// Declared builders first, then materialized dependency builders.
  builders: Vec<Builder>,
  declared: usize,
  dag: DependencyDag,
  paths: Arc<ProjectPaths>,
}

impl Project {
  /// Bind a project spec to the workspace, layering its settings over `parent`.
  ///
  /// # Errors
  ///
  /// Duplicate builder names, dependencies on builders that are neither declared nor a known
  /// preset, and dependency cycles are configuration errors.
  pub fn from_spec(spec: ProjectSpec, parent: &Settings, paths: Arc<ProjectPaths>) -> Result<Self, ConfigError> {
    let settings = parent.merged(&spec.settings);
    let declared = spec.builders.len();

    let mut specs = spec.builders;
    let mut dag = DependencyDag::new();
    for builder in &specs {
      if !dag.add_node(&builder.name) {
        return Err(ConfigError::Duplicate {
          kind: "builder",
          name: builder.name.clone(),
        });
      }
    }

    // Materialize missing dependencies from presets, breadth-first in declaration order.
    let mut i = 0;
    while i < specs.len() {
      for dependency in specs[i].depends_on.clone() {
        if dag.contains(&dependency) {
          continue;
        }
        let preset = BuilderSpec::preset(&dependency).map_err(|_| ConfigError::UnknownBuilder {
          project: spec.name.clone(),
          builder: specs[i].name.clone(),
          dependency: dependency.clone(),
        })?;
        debug!(project = %spec.name, builder = %dependency, "adding dependency builder");
        dag.add_node(&preset.name);
        specs.push(preset);
      }
      i += 1;
    }

    for builder in &specs {
      for dependency in &builder.depends_on {
        dag.add_dependency(&builder.name, dependency);
      }
    }
    dag.topological_order()?;

    let builders = specs
      .into_iter()
      .map(|s| Builder::new(s, &settings, Arc::clone(&paths)))
      .collect::<Result<Vec<_>, _>>()?;

    Ok(Self {
      name: spec.name,
      settings,
      depends_on: spec.depends_on,
      builders,
      declared,
      dag,
      paths,
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn settings(&self) -> &Settings {
    &self.settings
  }

  pub fn depends_on(&self) -> &[String] {
    &self.depends_on
  }

  pub fn paths(&self) -> &ProjectPaths {
    &self.paths
  }

  /// Declared builders, in attachment order.
  pub fn builders(&self) -> &[Builder] {
    &self.builders[..self.declared]
  }

  /// Declared builders followed by the dependency builders they pulled in.
  pub fn all_builders(&self) -> &[Builder] {
    &self.builders
  }

  pub fn builder(&self, name: &str) -> Option<&Builder> {
    self.builders.iter().find(|b| b.name() == name)
  }

  fn index_of(&self, name: &str) -> Option<usize> {
    self.builders.iter().position(|b| b.name() == name)
  }

  /// Indices of the transitive dependencies of builder `idx`, dependencies first.
  fn dependency_indices(&self, idx: usize) -> Result<Vec<usize>, ConfigError> {
    Ok(
      self
        .dag
        .dependencies_of(self.builders[idx].name())?
        .iter()
        .filter_map(|name| self.index_of(name))
        .collect(),
    )
  }

  /// Every builder a verb touches: each declared builder preceded by its dependencies, once each.
  pub fn sequence(&self) -> Result<Vec<&str>, ConfigError> {
    Ok(
      self
        .sequence_indices()?
        .into_iter()
        .map(|i| self.builders[i].name())
        .collect(),
    )
  }

  fn sequence_indices(&self) -> Result<Vec<usize>, ConfigError> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    for idx in 0..self.declared {
      for dep in self.dependency_indices(idx)? {
        if seen.insert(dep) {
          order.push(dep);
        }
      }
      if seen.insert(idx) {
        order.push(idx);
      }
    }
    Ok(order)
  }

  /// Run `verb` on this project.
  pub async fn run(&mut self, verb: Verb, env: &Env) -> Result<()> {
    info!(project = %self.name, verb = %verb, "running");
    self.run_inner(verb, env).await.map_err(|source| Error::Verb {
      verb,
      project: self.name.clone(),
      source: Box::new(source),
    })
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

  async fn run_inner(&mut self, verb: Verb, env: &Env) -> Result<()> {
    match verb {
      Verb::Reset | Verb::Clean => {
        for idx in self.sequence_indices()? {
          let builder = &mut self.builders[idx];
          if verb == Verb::Reset {
            builder.reset(env).await?;
          } else {
            builder.clean(env).await?;
          }
        }
      }
      Verb::Build | Verb::Install => {
        let mut satisfied: HashSet<usize> = HashSet::new();
        for idx in 0..self.declared {
          self.satisfy_dependencies(idx, env, &mut satisfied).await?;
          let builder = &mut self.builders[idx];
          if verb == Verb::Install {
            builder.install(env).await?;
          } else {
            builder.make(env).await?;
          }
          satisfied.insert(idx);
        }
      }
    }
    Ok(())
  }

  /// Install each dependency of builder `idx` that is neither built nor already handled.
  async fn satisfy_dependencies(&mut self, idx: usize, env: &Env, satisfied: &mut HashSet<usize>) -> Result<()> {
    for dep in self.dependency_indices(idx)? {
      if satisfied.contains(&dep) {
        continue;
      }
      let builder = &mut self.builders[dep];
      if builder.is_built() {
        debug!(builder = %builder.name(), "dependency already built");
      } else {
        builder.install(env).await?;
      }
      satisfied.insert(dep);
    }
    Ok(())
  }
}
