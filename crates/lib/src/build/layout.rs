//! Derived paths of a builder.
//!
//! Every path is a pure function of the builder spec, the project paths and the plugin name;
//! nothing is cached, so changing the version moves every path consistently.

use std::path::PathBuf;

use super::catalog::BuilderSpec;
use super::types::{ArtifactKind, Product, Provenance, Version};
use crate::consts::{FRAMEWORK_LIBRARY, SITE_PACKAGES, VERSION_PLACEHOLDER};
use crate::execute::url_to_filename;
use crate::platform::ProjectPaths;

#[derive(Debug, Clone, Copy)]
pub struct Layout<'a> {
  spec: &'a BuilderSpec,
  paths: &'a ProjectPaths,
  external: &'a str,
}

impl<'a> Layout<'a> {
  pub fn new(spec: &'a BuilderSpec, paths: &'a ProjectPaths, external: &'a str) -> Self {
    Self { spec, paths, external }
  }

  fn product(&self) -> Product {
    self.spec.variant.product
  }

  pub fn version(&self) -> Version {
    Version::new(self.spec.version.clone())
  }

  /// `Python-3.9.2`, also the archive's top-level directory.
  pub fn product_version(&self) -> String {
    format!("{}-{}", self.product().archive_stem(), self.spec.version)
  }

  /// `python3.9`
  pub fn name_ver(&self) -> String {
    format!("{}{}", self.product().name(), self.version().ver())
  }

  pub fn url(&self) -> String {
    self.spec.url_template.replace(VERSION_PLACEHOLDER, &self.spec.version)
  }

  pub fn archive_name(&self) -> String {
    url_to_filename(&self.url())
  }

  pub fn download_path(&self) -> PathBuf {
    self.paths.downloads().join(self.archive_name())
  }

  pub fn src_path(&self) -> PathBuf {
    self.paths.src().join(self.product_version())
  }

  pub fn prefix(&self) -> PathBuf {
    let variant = &self.spec.variant;
    if !variant.is_python() {
      return self.paths.build_lib().join(self.product().name());
    }
    match (variant.provenance, variant.kind) {
      (Provenance::Homebrew, _) => self
        .paths
        .support()
        .join(format!("python{}", self.version().ver_nodot())),
      (Provenance::Source, ArtifactKind::Framework) => self
        .paths
        .framework_bundle()
        .join("Versions")
        .join(self.version().ver()),
      (Provenance::Source, _) => self.paths.support().join(self.product().name()),
    }
  }

  pub fn prefix_lib(&self) -> PathBuf {
    self.prefix().join("lib")
  }

  pub fn prefix_include(&self) -> PathBuf {
    self.prefix().join("include")
  }

  pub fn prefix_bin(&self) -> PathBuf {
    self.prefix().join("bin")
  }

  /// The standard library directory, `<prefix>/lib/python3.9`.
  pub fn python_lib(&self) -> PathBuf {
    self.prefix_lib().join(self.name_ver())
  }

  pub fn site_packages(&self) -> PathBuf {
    self.python_lib().join(SITE_PACKAGES)
  }

  pub fn lib_dynload(&self) -> PathBuf {
    self.python_lib().join("lib-dynload")
  }

  /// Zipped standard library written by `ziplib`, `<prefix>/lib/python39.zip`.
  pub fn zipped_lib(&self) -> PathBuf {
    self
      .prefix_lib()
      .join(format!("python{}.zip", self.version().ver_nodot()))
  }

  /// Library as the toolchain (or the homebrew copy) leaves it, before staging.
  pub fn built_library(&self) -> PathBuf {
    let ver = self.version().ver();
    match (self.spec.variant.provenance, self.spec.variant.kind) {
      (Provenance::Homebrew, _) | (_, ArtifactKind::Framework) => self.prefix().join(FRAMEWORK_LIBRARY),
      (_, ArtifactKind::Static) => self.prefix_lib().join(format!("libpython{}.a", ver)),
      (_, ArtifactKind::Shared) => self.prefix_lib().join(format!("libpython{}.dylib", ver)),
    }
  }

  /// Consumer-facing library artifact.
  pub fn library(&self) -> PathBuf {
    let ver = self.version().ver();
    let variant = &self.spec.variant;
    match (variant.provenance, variant.kind) {
      (Provenance::Source, ArtifactKind::Framework) => self.prefix().join(FRAMEWORK_LIBRARY),
      (Provenance::Source, ArtifactKind::Static) => self.prefix_lib().join(&ver).join(format!("libpython_{}.a", ver)),
      _ => self.prefix_lib().join(&ver).join(format!("libpython_{}.dylib", ver)),
    }
  }

  pub fn interpreter(&self) -> PathBuf {
    self.prefix_bin().join(self.name_ver())
  }

  /// File names a binary may use to reference the python library.
  pub fn library_names(&self) -> Vec<String> {
    let ver = self.version().ver();
    vec![
      format!("libpython_{}.dylib", ver),
      format!("libpython{}.dylib", ver),
      FRAMEWORK_LIBRARY.to_string(),
    ]
  }

  /// Artifacts that must exist once the toolchain finishes.
  pub fn artifacts(&self) -> Vec<PathBuf> {
    let lib = self.prefix_lib();
    match self.product() {
      Product::Python => vec![self.built_library(), self.interpreter(), self.python_lib()],
      Product::OpenSsl => vec![lib.join("libssl.a"), lib.join("libcrypto.a")],
      Product::Bzip2 => vec![lib.join("libbz2.a")],
    }
  }

  /// Directory tree copied as a whole into the plugin resources.
  pub fn bundle_root(&self) -> PathBuf {
    if self.spec.variant.kind == ArtifactKind::Framework && !self.spec.variant.is_homebrew() {
      self.paths.framework_bundle()
    } else {
      self.prefix()
    }
  }

  pub fn external_name(&self) -> &str {
    self.external
  }

  pub fn plugin_bundle(&self) -> PathBuf {
    self.paths.external(self.external)
  }

  /// `Contents/MacOS`, the directory of the plugin executable.
  pub fn plugin_macos(&self) -> PathBuf {
    self.plugin_bundle().join("Contents").join("MacOS")
  }

  pub fn plugin_executable(&self) -> PathBuf {
    self.plugin_macos().join(self.external)
  }

  pub fn plugin_resources(&self) -> PathBuf {
    self.plugin_bundle().join("Contents").join("Resources")
  }

  /// Location of the copied bundle root inside the plugin resources.
  pub fn resources_root(&self) -> PathBuf {
    let root = self.bundle_root();
    let name = root.file_name().map(PathBuf::from).unwrap_or_default();
    self.plugin_resources().join(name)
  }
}
