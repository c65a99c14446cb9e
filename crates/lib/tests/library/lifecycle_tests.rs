//! Builder lifecycle: downloads, static builds, failures.

use std::fs;

use pybundle_lib::build::{Builder, BuilderSpec, Product, Step};
use pybundle_lib::{Error, Recipe, Settings, StepError};

use super::common::{Harness, files_matching};

mod download {
  use super::*;
  use std::sync::Arc;

  #[tokio::test]
  async fn second_download_does_not_fetch() {
    let h = Harness::new();
    let spec = BuilderSpec::preset("bzip2").unwrap();
    let mut builder = Builder::new(spec, &Settings::new(), Arc::new(h.paths())).unwrap();

    builder.download(&h.env).await.unwrap();
    let first = builder.archive_checksum().unwrap().unwrap();

    builder.download(&h.env).await.unwrap();
    let second = builder.archive_checksum().unwrap().unwrap();

    assert_eq!(h.fetcher.count(), 1);
    assert_eq!(first, second);
    assert!(builder.layout().src_path().join("configure").exists());
  }

  #[tokio::test]
  async fn download_reextracts_missing_source() {
    let h = Harness::new();
    let spec = BuilderSpec::preset("openssl").unwrap();
    let mut builder = Builder::new(spec, &Settings::new(), Arc::new(h.paths())).unwrap();

    builder.download(&h.env).await.unwrap();
    fs::remove_dir_all(builder.layout().src_path()).unwrap();
    builder.download(&h.env).await.unwrap();

    assert_eq!(h.fetcher.count(), 1);
    assert!(builder.layout().src_path().join("Modules/Setup").exists());
  }

  #[tokio::test]
  async fn pre_process_requires_source() {
    let h = Harness::new();
    let spec = BuilderSpec::preset("static").unwrap();
    let mut builder = Builder::new(spec, &Settings::new(), Arc::new(h.paths())).unwrap();

    let err = builder.pre_process(&h.env).await.unwrap_err();
    assert_eq!(err.failed_step(), Some(("static", Step::PreProcess)));
    assert!(matches!(err.step_error(), Some(StepError::MissingArtifact { .. })));
  }

  #[tokio::test]
  async fn disabled_modules_are_written_to_setup_local() {
    let h = Harness::new();
    let spec = BuilderSpec::preset("shared").unwrap();
    let settings = Settings::new().with("disabled_modules", serde_json::json!(["_tkinter", "_curses"]));
    let mut builder = Builder::new(spec, &settings, Arc::new(h.paths())).unwrap();

    builder.download(&h.env).await.unwrap();
    builder.pre_process(&h.env).await.unwrap();

    let setup = fs::read_to_string(builder.layout().src_path().join("Modules/Setup.local")).unwrap();
    assert_eq!(setup, "*disabled*\n_tkinter\n_curses\n");
  }

  #[tokio::test]
  async fn setup_local_is_copied_from_patch_dir() {
    let h = Harness::new();
    let patch = h.root().join("patch/3.9/setup-static.local");
    fs::create_dir_all(patch.parent().unwrap()).unwrap();
    fs::write(&patch, "zlib zlibmodule.c\n").unwrap();

    let spec = BuilderSpec::preset("static").unwrap();
    let settings = Settings::new().with("setup_local", "setup-static.local");
    let mut builder = Builder::new(spec, &settings, Arc::new(h.paths())).unwrap();

    builder.download(&h.env).await.unwrap();
    builder.pre_process(&h.env).await.unwrap();

    let setup = fs::read_to_string(builder.layout().src_path().join("Modules/Setup.local")).unwrap();
    assert_eq!(setup, "zlib zlibmodule.c\n");
  }
}

mod static_build {
  use super::*;

  #[tokio::test]
  async fn install_produces_staged_static_library() {
    let h = Harness::new();
    let mut recipe = Recipe::for_variant("static", h.paths()).unwrap();

    recipe.install(&h.env).await.unwrap();

    let support = h.root().join("support/python");
    assert!(support.join("lib/3.9/libpython_3.9.a").is_file());
    assert!(!support.join("lib/libpython3.9.a").exists());

    let site_packages = support.join("lib/python3.9/site-packages");
    assert!(site_packages.is_dir());
    assert!(site_packages.join("demo/core.py").exists());
    assert!(files_matching(&site_packages, |n| n.starts_with("test_") && n.ends_with(".py")).is_empty());
    assert!(files_matching(&support, |n| n.ends_with(".pyc")).is_empty());
    assert!(!support.join("lib/python3.9/idlelib").exists());
    assert!(!support.join("bin/python3.9-config").exists());

    assert_eq!(h.toolchain.compiled(), vec!["openssl", "bzip2", "python"]);
    assert_eq!(h.fetcher.count(), 3);
    let python = &recipe.projects()[0].builders()[0];
    assert!(python.product().is_some());
    assert!(python.is_built());
  }

  #[tokio::test]
  async fn repeated_post_process_leaves_tree_unchanged() {
    let h = Harness::new();
    let spec = BuilderSpec::preset("shared").unwrap();
    let mut python = Builder::new(spec, &Settings::new(), std::sync::Arc::new(h.paths())).unwrap();
    assert_eq!(python.tree_checksum().unwrap(), None);

    python.install(&h.env).await.unwrap();
    let installed = python.tree_checksum().unwrap().unwrap();
    python.post_process(&h.env).await.unwrap();

    assert_eq!(python.tree_checksum().unwrap(), Some(installed));
  }

  #[tokio::test]
  async fn build_after_install_skips_built_dependencies() {
    let h = Harness::new();
    let mut recipe = Recipe::for_variant("static", h.paths()).unwrap();
    recipe.install(&h.env).await.unwrap();

    let mut again = Recipe::for_variant("static", h.paths()).unwrap();
    again.build(&h.env).await.unwrap();

    assert_eq!(h.toolchain.compiled(), vec!["openssl", "bzip2", "python", "python"]);
    assert_eq!(h.fetcher.count(), 3);
  }

  #[tokio::test]
  async fn ziplib_compresses_stdlib() {
    let h = Harness::new();
    let spec = pybundle_lib::RecipeSpec::for_variant("static")
      .unwrap()
      .with_settings(Settings::new().with("ziplib", true));
    let mut recipe = Recipe::from_spec(spec, h.paths()).unwrap();

    recipe.install(&h.env).await.unwrap();

    let lib = h.root().join("support/python/lib");
    assert!(lib.join("python39.zip").is_file());
    assert!(lib.join("python3.9/os.py").is_file());
    assert!(!lib.join("python3.9/json").exists());
  }

  #[tokio::test]
  async fn reset_removes_sources_and_prefix() {
    let h = Harness::new();
    let mut recipe = Recipe::for_variant("static", h.paths()).unwrap();
    recipe.install(&h.env).await.unwrap();

    recipe.reset(&h.env).await.unwrap();

    assert!(!h.root().join("support/python").exists());
    assert!(!h.root().join("targets/build/src/Python-3.9.2").exists());
    assert!(!h.root().join("targets/build/lib/openssl").exists());
    assert!(h.root().join("targets/build/downloads/Python-3.9.2.tgz").exists());
  }

  #[tokio::test]
  async fn clean_drops_library_sources() {
    let h = Harness::new();
    let mut recipe = Recipe::for_variant("static", h.paths()).unwrap();
    recipe.install(&h.env).await.unwrap();

    recipe.clean(&h.env).await.unwrap();

    assert!(!h.root().join("targets/build/src/openssl-1.1.1g").exists());
    assert!(h.root().join("targets/build/lib/openssl/lib/libssl.a").exists());
    assert!(h.root().join("support/python/lib/3.9/libpython_3.9.a").exists());
  }
}

mod failures {
  use super::*;

  #[tokio::test]
  async fn missing_artifact_aborts_with_context() {
    let h = Harness::new();
    h.toolchain.break_product(Product::Bzip2);
    let mut recipe = Recipe::for_variant("shared", h.paths()).unwrap();

    let err = recipe.install(&h.env).await.unwrap_err();

    assert!(matches!(err, Error::Verb { ref project, .. } if project == "shared"));
    assert_eq!(err.failed_step(), Some(("bzip2", Step::Build)));
    let message = err.to_string();
    assert!(message.contains("install of project 'shared' failed"));
    assert!(message.contains("libbz2.a"));
    assert_eq!(h.toolchain.compiled(), vec!["openssl", "bzip2"]);
  }
}
