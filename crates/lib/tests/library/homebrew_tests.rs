//! Homebrew variants adapt an existing installation without downloading or compiling.

use std::path::{Path, PathBuf};

use pybundle_lib::relocate::resolve_load_path;
use pybundle_lib::{Recipe, RecipeSpec, Settings};

use super::common::{FakeBinary, Harness, install_python_tree, read_binary, touch, write_binary};

const FRAMEWORK_ID: &str = "/usr/local/opt/python3/Frameworks/Python.framework/Versions/3.9/Python";

/// A fake `.../Python.framework/Versions/3.9` tree.
fn homebrew_root(base: &Path) -> PathBuf {
  let root = base.join("homebrew/Python.framework/Versions/3.9");
  write_binary(
    &root.join("Python"),
    &FakeBinary {
      id: Some(FRAMEWORK_ID.to_string()),
      refs: vec!["/usr/lib/libSystem.B.dylib".to_string()],
    },
  );
  write_binary(
    &root.join("bin/python3.9"),
    &FakeBinary {
      id: None,
      refs: vec![FRAMEWORK_ID.to_string()],
    },
  );
  install_python_tree(&root.join("lib/python3.9"));
  touch(&root.join("include/python3.9/Python.h"), "");
  root
}

fn recipe(h: &Harness, variant: &str, root: &Path) -> Recipe {
  let settings = Settings::new().with("homebrew_root", root.to_string_lossy().to_string());
  let spec = RecipeSpec::for_variant(variant).unwrap().with_settings(settings);
  Recipe::from_spec(spec, h.paths()).unwrap()
}

#[tokio::test]
async fn extension_copies_library_into_plugin() {
  let h = Harness::new();
  let root = homebrew_root(h.temp.path());
  let plugin = h.plugin("py", FRAMEWORK_ID);

  recipe(&h, "bin-homebrew-ext", &root).install(&h.env).await.unwrap();

  assert_eq!(h.fetcher.count(), 0);
  assert!(h.toolchain.compiled().is_empty());

  let resources = h.root().join("externals/py.mxo/Contents/Resources/python39");
  let library = resources.join("lib/3.9/libpython_3.9.dylib");
  assert!(library.is_file());
  assert!(!resources.join("Python").exists());

  let reference = read_binary(&plugin).refs[0].clone();
  assert_eq!(resolve_load_path(&reference, &plugin), library);

  let interpreter = resources.join("bin/python3.9");
  let reference = read_binary(&interpreter).refs[0].clone();
  assert!(reference.starts_with("@loader_path/"));
  assert_eq!(resolve_load_path(&reference, &interpreter), library);

  // The homebrew installation itself is untouched.
  assert_eq!(read_binary(&root.join("bin/python3.9")).refs, vec![FRAMEWORK_ID.to_string()]);
}

#[tokio::test]
async fn package_fixes_interpreter_self_reference() {
  let h = Harness::new();
  let root = homebrew_root(h.temp.path());

  recipe(&h, "bin-homebrew-pkg", &root).install(&h.env).await.unwrap();

  let prefix = h.root().join("support/python39");
  let interpreter = prefix.join("bin/python3.9");
  let reference = read_binary(&interpreter).refs[0].clone();
  assert_eq!(reference, "@loader_path/../lib/3.9/libpython_3.9.dylib");
  assert!(!prefix.join("lib/python3.9/site-packages/demo/test_core.py").exists());
  assert!(prefix.join("include/python3.9/Python.h").exists());
}

#[tokio::test]
async fn sys_only_verifies() {
  let h = Harness::new();
  let root = homebrew_root(h.temp.path());

  recipe(&h, "bin-homebrew-sys", &root).install(&h.env).await.unwrap();

  assert!(!h.root().join("support").exists());
  assert_eq!(h.fetcher.count(), 0);
}

#[tokio::test]
async fn missing_installation_is_reported() {
  let h = Harness::new();
  let missing = h.temp.path().join("no-homebrew");

  let err = recipe(&h, "bin-homebrew-pkg", &missing).install(&h.env).await.unwrap_err();

  assert!(err.to_string().contains("no-homebrew"));
  assert!(h.toolchain.compiled().is_empty());
}

/// Add the symlinks a real homebrew framework carries: a library alias and a `site-packages`
/// that lives in the host's `/usr/local/lib`.
#[cfg(unix)]
fn link_like_homebrew(base: &Path, root: &Path) {
  use std::os::unix::fs::symlink;

  let host_site = base.join("usr-local-lib/python3.9/site-packages");
  touch(&host_site.join("pip/__init__.py"), "");
  let site = root.join("lib/python3.9/site-packages");
  std::fs::remove_dir_all(&site).unwrap();
  symlink(&host_site, &site).unwrap();
  symlink("../Python", root.join("lib/libpython3.9.dylib")).unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn package_bundle_does_not_point_at_host() {
  let h = Harness::new();
  let root = homebrew_root(h.temp.path());
  link_like_homebrew(h.temp.path(), &root);

  recipe(&h, "bin-homebrew-pkg", &root).install(&h.env).await.unwrap();

  let prefix = h.root().join("support/python39");
  let site = prefix.join("lib/python3.9/site-packages");
  assert!(site.is_dir());
  assert!(!site.is_symlink());
  assert!(!site.join("pip").exists());

  let alias = prefix.join("lib/libpython3.9.dylib");
  assert_eq!(std::fs::read_link(&alias).unwrap(), PathBuf::from("3.9/libpython_3.9.dylib"));
  assert!(alias.exists());
  assert!(!prefix.join("Python").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn extension_copy_keeps_links_inside_resources() {
  let h = Harness::new();
  let root = homebrew_root(h.temp.path());
  link_like_homebrew(h.temp.path(), &root);
  h.plugin("py", FRAMEWORK_ID);

  recipe(&h, "bin-homebrew-ext", &root).install(&h.env).await.unwrap();

  let resources = h.root().join("externals/py.mxo/Contents/Resources/python39");
  let alias = resources.join("lib/libpython3.9.dylib");
  assert_eq!(std::fs::read_link(&alias).unwrap(), PathBuf::from("3.9/libpython_3.9.dylib"));
  assert!(alias.exists());
  let site = resources.join("lib/python3.9/site-packages");
  assert!(site.is_dir());
  assert!(!site.is_symlink());
}
