//! YAML recipe formats.
//!
//! Tree form nests builders under their project:
//!
//! ```yaml
//! name: pybundle
//! settings: { ziplib: true }
//! projects:
//!   - name: python
//!     builders:
//!       - name: src-shared-ext
//!         version: 3.9.2
//! ```
//!
//! Flat form lists projects as a mapping (its key order is the execution order) and builders
//! separately, each naming its project:
//!
//! ```yaml
//! recipe: { name: pybundle }
//! projects:
//!   python: { depends_on: [] }
//! builders:
//!   - { project: python, name: src-shared-ext }
//! ```
//!
//! A builder's `variant` defaults to its `name`; omitted fields keep the preset's values.

use std::path::Path;

use serde::Deserialize;

use crate::build::BuilderSpec;
use crate::consts::APP_NAME;
use crate::error::ConfigError;
use crate::project::ProjectSpec;
use crate::settings::Settings;

use super::RecipeSpec;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TreeRecipe {
  #[serde(default)]
  name: Option<String>,
  #[serde(default)]
  settings: Settings,
  #[serde(default)]
  projects: Vec<TreeProject>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TreeProject {
  name: String,
  #[serde(default)]
  settings: Settings,
  #[serde(default)]
  depends_on: Vec<String>,
  #[serde(default)]
  builders: Vec<BuilderEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BuilderEntry {
  name: String,
  #[serde(default)]
  variant: Option<String>,
  #[serde(default)]
  version: Option<String>,
  #[serde(default)]
  depends_on: Option<Vec<String>>,
  #[serde(default)]
  settings: Settings,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FlatRecipe {
  #[serde(default)]
  recipe: FlatHeader,
  #[serde(default)]
  projects: serde_yaml::Mapping,
  #[serde(default)]
  builders: Vec<FlatBuilder>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FlatHeader {
  #[serde(default)]
  name: Option<String>,
  #[serde(default)]
  settings: Settings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FlatProject {
  #[serde(default)]
  settings: Settings,
  #[serde(default)]
  depends_on: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FlatBuilder {
  project: String,
  name: String,
  #[serde(default)]
  variant: Option<String>,
  #[serde(default)]
  version: Option<String>,
  #[serde(default)]
  depends_on: Option<Vec<String>>,
  #[serde(default)]
  settings: Settings,
}

impl FlatBuilder {
  fn split(self) -> (String, BuilderEntry) {
    let entry = BuilderEntry {
      name: self.name,
      variant: self.variant,
      version: self.version,
      depends_on: self.depends_on,
      settings: self.settings,
    };
    (self.project, entry)
  }
}

impl BuilderEntry {
  fn into_spec(self) -> Result<BuilderSpec, ConfigError> {
    let variant = self.variant.as_deref().unwrap_or(&self.name);
    let mut spec = BuilderSpec::preset(variant)?.with_name(self.name.clone());
    if let Some(version) = self.version {
      spec = spec.with_version(version);
    }
    if let Some(depends_on) = self.depends_on {
      spec = spec.with_depends_on(depends_on);
    }
    Ok(spec.with_settings(self.settings))
  }
}

fn parse_error(path: &Path) -> impl FnOnce(serde_yaml::Error) -> ConfigError + '_ {
  move |source| ConfigError::ParseRecipe {
    path: path.to_path_buf(),
    source,
  }
}

/// Parse a tree-form recipe. `path` is only used in error messages.
pub fn parse_tree_yaml(content: &str, path: &Path) -> Result<RecipeSpec, ConfigError> {
  let tree: TreeRecipe = serde_yaml::from_str(content).map_err(parse_error(path))?;

  let mut spec = RecipeSpec::new(tree.name.unwrap_or_else(|| APP_NAME.to_string())).with_settings(tree.settings);
  for project in tree.projects {
    let mut p = ProjectSpec::new(project.name)
      .with_settings(project.settings)
      .with_depends_on(project.depends_on);
    for entry in project.builders {
      p = p.with_builder(entry.into_spec()?);
    }
    spec = spec.with_project(p);
  }
  Ok(spec)
}

/// Parse a flat-form recipe. `path` is only used in error messages.
pub fn parse_flat_yaml(content: &str, path: &Path) -> Result<RecipeSpec, ConfigError> {
  let flat: FlatRecipe = serde_yaml::from_str(content).map_err(parse_error(path))?;

  let mut projects: Vec<ProjectSpec> = Vec::with_capacity(flat.projects.len());
  for (key, value) in flat.projects {
    let name: String = serde_yaml::from_value(key).map_err(parse_error(path))?;
    let project: FlatProject = if value.is_null() {
      FlatProject::default()
    } else {
      serde_yaml::from_value(value).map_err(parse_error(path))?
    };
    projects.push(
      ProjectSpec::new(name)
        .with_settings(project.settings)
        .with_depends_on(project.depends_on),
    );
  }

  for builder in flat.builders {
    let (owner, entry) = builder.split();
    let Some(project) = projects.iter_mut().find(|p| p.name == owner) else {
      return Err(ConfigError::UnknownOwner {
        builder: entry.name,
        project: owner,
      });
    };
    project.builders.push(entry.into_spec()?);
  }

  let header = flat.recipe;
  let mut spec = RecipeSpec::new(header.name.unwrap_or_else(|| APP_NAME.to_string())).with_settings(header.settings);
  spec.projects = projects;
  Ok(spec)
}
