//! Named builder presets.
//!
//! Each preset is a [`BuilderSpec`] with default version, source URL and builder dependencies.
//! Recipes start from a preset and override individual fields per instance.

use serde::Serialize;

use super::types::{ArtifactKind, Product, Provenance, RelocationPolicy, Variant};
use crate::error::ConfigError;
use crate::settings::Settings;

/// Declarative description of one builder, before it is bound to a project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuilderSpec {
  /// Unique key of the builder within its project.
  pub name: String,
  pub variant: Variant,
  pub version: String,
  /// Download URL with `${VERSION}` placeholders.
  pub url_template: String,
  /// Builders that must be built before this one.
  pub depends_on: Vec<String>,
  pub settings: Settings,
}

/// Preset names with a one-line description, in display order.
pub const PRESETS: &[(&str, &str)] = &[
  ("static", "python compiled from source as a static library"),
  ("shared", "python compiled from source as a shared library, package fixups"),
  ("framework", "python compiled from source as a framework, package fixups"),
  ("src-static-pkg", "static python for a standalone package"),
  ("src-static-ext", "static python for a plugin external"),
  ("src-shared-pkg", "shared python for a standalone package"),
  ("src-shared-ext", "shared python embedded in a plugin external"),
  ("src-framework-pkg", "framework python for a standalone package"),
  ("src-framework-ext", "framework python embedded in a plugin external"),
  ("bin-homebrew-sys", "verify an existing homebrew python"),
  ("bin-homebrew-pkg", "homebrew python adapted for a standalone package"),
  ("bin-homebrew-ext", "homebrew python embedded in a plugin external"),
  ("openssl", "openssl static libraries"),
  ("bzip2", "bzip2 static library"),
];

/// Builders every source-compiled python depends on.
const PYTHON_DEPENDENCIES: &[&str] = &["openssl", "bzip2"];

impl BuilderSpec {
  /// A spec for `variant` with the product's default version, URL and no dependencies.
  pub fn new(name: impl Into<String>, variant: Variant) -> Self {
    Self {
      name: name.into(),
      variant,
      version: variant.product.default_version().to_string(),
      url_template: variant.product.url_template().to_string(),
      depends_on: Vec::new(),
      settings: Settings::new(),
    }
  }

  /// Look up a named preset.
  pub fn preset(name: &str) -> Result<Self, ConfigError> {
    use ArtifactKind::*;
    use Provenance::*;
    use RelocationPolicy as Policy;

    let variant = match name {
      "static" => Variant::python(Source, Static, Policy::None),
      "shared" => Variant::python(Source, Shared, Policy::Package),
      "framework" => Variant::python(Source, Framework, Policy::Package),
      "src-static-pkg" => Variant::python(Source, Static, Policy::Package),
      "src-static-ext" => Variant::python(Source, Static, Policy::Extension),
      "src-shared-pkg" => Variant::python(Source, Shared, Policy::Package),
      "src-shared-ext" => Variant::python(Source, Shared, Policy::Extension),
      "src-framework-pkg" => Variant::python(Source, Framework, Policy::Package),
      "src-framework-ext" => Variant::python(Source, Framework, Policy::Extension),
      "bin-homebrew-sys" => Variant::python(Homebrew, Shared, Policy::None),
      "bin-homebrew-pkg" => Variant::python(Homebrew, Shared, Policy::Package),
      "bin-homebrew-ext" => Variant::python(Homebrew, Shared, Policy::Extension),
      "openssl" => Variant::library(Product::OpenSsl),
      "bzip2" => Variant::library(Product::Bzip2),
      other => return Err(ConfigError::UnknownVariant(other.to_string())),
    };

    let mut spec = Self::new(name, variant);
    if variant.is_python() && !variant.is_homebrew() {
      spec.depends_on = PYTHON_DEPENDENCIES.iter().map(|d| d.to_string()).collect();
    }
    Ok(spec)
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn with_version(mut self, version: impl Into<String>) -> Self {
    self.version = version.into();
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
