//! Relocation of built runtimes for the package and extension contexts.

use std::fs;
use std::path::Path;

use pybundle_lib::relocate::resolve_load_path;
use pybundle_lib::util::hash::hash_directory;
use pybundle_lib::{Recipe, StepError};

use super::common::{Harness, read_binary};

fn reference_to<'a>(refs: &'a [String], name: &str) -> &'a str {
  refs
    .iter()
    .find(|r| r.ends_with(name))
    .unwrap_or_else(|| panic!("no reference to {} in {:?}", name, refs))
}

mod package {
  use super::*;

  #[tokio::test]
  async fn shared_package_resolves_after_moving_tree() {
    let h = Harness::new();
    let mut recipe = Recipe::for_variant("src-shared-pkg", h.paths()).unwrap();
    recipe.install(&h.env).await.unwrap();

    let support = h.root().join("support/python");
    let library = support.join("lib/3.9/libpython_3.9.dylib");
    assert!(library.is_file());
    assert!(!support.join("lib/libpython3.9.dylib").exists());

    // Move the whole workspace somewhere else.
    let moved = h.temp.path().join("elsewhere");
    fs::rename(h.root(), &moved).unwrap();
    let library = moved.join("support/python/lib/3.9/libpython_3.9.dylib");
    let interpreter = moved.join("support/python/bin/python3.9");

    let exe = read_binary(&interpreter);
    let reference = reference_to(&exe.refs, "libpython_3.9.dylib");
    assert!(reference.starts_with("@loader_path/"));
    assert_eq!(resolve_load_path(reference, &interpreter), library);

    let lib = read_binary(&library);
    let id = lib.id.unwrap();
    let plugin = moved.join("externals/py.mxo/Contents/MacOS/py");
    assert_eq!(resolve_load_path(&id, &plugin), library);
  }

  #[tokio::test]
  async fn reapplying_relocation_is_idempotent() {
    let h = Harness::new();
    let mut recipe = Recipe::for_variant("shared", h.paths()).unwrap();
    recipe.install(&h.env).await.unwrap();
    let support = h.root().join("support/python");
    let interpreter = support.join("bin/python3.9");
    let before = read_binary(&interpreter);
    let tree_before = hash_directory(&support, &[]).unwrap();

    let builder = &recipe.projects()[0].builders()[0];
    pybundle_lib::relocate::apply(&builder.relocation_plan(), h.env.editor.as_ref())
      .await
      .unwrap();

    assert_eq!(read_binary(&interpreter), before);
    assert_eq!(hash_directory(&support, &[]).unwrap(), tree_before);
  }
}

mod extension {
  use super::*;

  #[tokio::test]
  async fn shared_extension_lives_in_plugin_resources() {
    let h = Harness::new();
    let plugin = h.plugin("py", "@rpath/libpython3.9.dylib");
    let mut recipe = Recipe::for_variant("src-shared-ext", h.paths()).unwrap();

    recipe.install(&h.env).await.unwrap();

    let resources = h.root().join("externals/py.mxo/Contents/Resources/python");
    let library = resources.join("lib/3.9/libpython_3.9.dylib");
    assert!(library.is_file());

    let exe = read_binary(&plugin);
    let reference = reference_to(&exe.refs, "libpython_3.9.dylib");
    assert_eq!(reference, "@loader_path/../Resources/python/lib/3.9/libpython_3.9.dylib");
    assert_eq!(resolve_load_path(reference, &plugin), library);

    let copied = resources.join("bin/python3.9");
    let reference = reference_to(&read_binary(&copied).refs, "libpython_3.9.dylib").to_string();
    assert_eq!(resolve_load_path(&reference, &copied), library);
    assert_eq!(
      read_binary(&library).id.as_deref(),
      Some("@loader_path/../Resources/python/lib/3.9/libpython_3.9.dylib")
    );
  }

  #[tokio::test]
  async fn framework_extension_copies_framework_bundle() {
    let h = Harness::new();
    let plugin = h.plugin("py", "/Library/Frameworks/Python.framework/Versions/3.9/Python");
    let mut recipe = Recipe::for_variant("src-framework-ext", h.paths()).unwrap();

    recipe.install(&h.env).await.unwrap();

    let library = h
      .root()
      .join("externals/py.mxo/Contents/Resources/Python.framework/Versions/3.9/Python");
    assert!(library.is_file());
    let reference = reference_to(&read_binary(&plugin).refs, "Python").to_string();
    assert_eq!(resolve_load_path(&reference, &plugin), library);
  }

  #[tokio::test]
  async fn missing_plugin_executable_is_reported() {
    let h = Harness::new();
    let mut recipe = Recipe::for_variant("src-shared-ext", h.paths()).unwrap();

    let err = recipe.install(&h.env).await.unwrap_err();

    match err.step_error() {
      Some(StepError::MissingArtifact { path, .. }) => {
        assert!(path.ends_with(Path::new("Contents/MacOS/py")));
      }
      other => panic!("unexpected error: {:?}", other),
    }
  }

  #[tokio::test]
  async fn plugin_without_python_reference_is_reported() {
    let h = Harness::new();
    h.plugin("py", "/usr/lib/libSystem.B.dylib");
    let mut recipe = Recipe::for_variant("src-shared-ext", h.paths()).unwrap();

    let err = recipe.install(&h.env).await.unwrap_err();

    assert!(matches!(err.step_error(), Some(StepError::MissingReference { .. })));
  }
}
