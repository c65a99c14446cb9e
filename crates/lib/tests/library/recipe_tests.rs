//! Recipe and project ordering across the lifecycle verbs.

use std::fs;

use pybundle_lib::build::{BuilderSpec, Verb};
use pybundle_lib::{ConfigError, ProjectSpec, Recipe, RecipeSpec};

use super::common::Harness;

fn project(name: &str, builders: &[&str]) -> ProjectSpec {
  builders.iter().fold(ProjectSpec::new(name), |p, b| {
    p.with_builder(BuilderSpec::preset(b).unwrap())
  })
}

#[tokio::test]
async fn dependency_projects_build_before_dependents() {
  let h = Harness::new();
  let spec = RecipeSpec::new("r")
    .with_project(project("tools", &["bzip2"]).with_depends_on(["crypto"]))
    .with_project(project("crypto", &["openssl"]));
  let mut recipe = Recipe::from_spec(spec, h.paths()).unwrap();

  recipe.build(&h.env).await.unwrap();

  assert_eq!(h.toolchain.compiled(), vec!["openssl", "bzip2"]);
}

#[tokio::test]
async fn sibling_builders_keep_declaration_order() {
  let h = Harness::new();
  let spec = RecipeSpec::new("r").with_project(project("libs", &["bzip2", "openssl"]));
  let mut recipe = Recipe::from_spec(spec, h.paths()).unwrap();

  recipe.install(&h.env).await.unwrap();

  assert_eq!(h.toolchain.compiled(), vec!["bzip2", "openssl"]);
}

#[tokio::test]
async fn each_project_runs_once_per_verb() {
  let h = Harness::new();
  let spec = RecipeSpec::new("r")
    .with_project(project("a", &[]).with_depends_on(["libs"]))
    .with_project(project("b", &[]).with_depends_on(["libs"]))
    .with_project(project("libs", &["bzip2"]));
  let mut recipe = Recipe::from_spec(spec, h.paths()).unwrap();

  recipe.build(&h.env).await.unwrap();

  assert_eq!(h.toolchain.compiled(), vec!["bzip2"]);
}

#[tokio::test]
async fn install_resets_dependency_declared_later() {
  let h = Harness::new();
  let spec = RecipeSpec::new("r")
    .with_project(project("app", &[]).with_depends_on(["libs"]))
    .with_project(project("libs", &["bzip2"]));
  let mut recipe = Recipe::from_spec(spec, h.paths()).unwrap();
  let src = recipe.project("libs").unwrap().builder("bzip2").unwrap().layout().src_path();
  fs::create_dir_all(&src).unwrap();
  fs::write(src.join("STALE"), "left over from an interrupted build").unwrap();

  assert_eq!(
    recipe.schedule(Verb::Install).unwrap(),
    vec![("libs", Verb::Build), ("app", Verb::Install), ("libs", Verb::Install)]
  );
  recipe.install(&h.env).await.unwrap();

  assert!(!src.join("STALE").exists());
  assert!(src.join("configure").exists());
}

#[test]
fn builder_cycle_rejected_at_construction() {
  let h = Harness::new();
  let a = BuilderSpec::preset("openssl").unwrap().with_name("a").with_depends_on(["b"]);
  let b = BuilderSpec::preset("bzip2").unwrap().with_name("b").with_depends_on(["a"]);
  let spec = RecipeSpec::new("r").with_project(ProjectSpec::new("p").with_builder(a).with_builder(b));

  let err = Recipe::from_spec(spec, h.paths()).unwrap_err();

  assert!(matches!(err, ConfigError::Cycle { ref members } if members.len() == 2));
}

#[test]
fn yaml_recipes_load_from_disk() {
  let h = Harness::new();
  let tree = h.temp.path().join("tree.yml");
  fs::write(
    &tree,
    "name: t\nprojects:\n  - name: python\n    builders:\n      - name: src-shared-ext\n",
  )
  .unwrap();
  let flat = h.temp.path().join("flat.yml");
  fs::write(&flat, "projects:\n  libs:\nbuilders:\n  - project: libs\n    name: bzip2\n").unwrap();

  let recipe = Recipe::from_tree_yaml(&tree, h.paths()).unwrap();
  assert_eq!(recipe.name(), "t");
  assert_eq!(recipe.projects()[0].all_builders().len(), 3);

  let recipe = Recipe::from_flat_yaml(&flat, h.paths()).unwrap();
  assert_eq!(recipe.projects()[0].builders()[0].name(), "bzip2");

  let err = Recipe::from_tree_yaml(&h.temp.path().join("missing.yml"), h.paths()).unwrap_err();
  assert!(matches!(err, ConfigError::ReadRecipe { .. }));
}
