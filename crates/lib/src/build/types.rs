//! Core builder vocabulary: verbs, steps, products and variant descriptors.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::consts::{BZIP2_URL, BZIP2_VERSION, OPENSSL_URL, OPENSSL_VERSION, PYTHON_URL, PYTHON_VERSION};

/// A lifecycle verb driven from a recipe or project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
  Reset,
  Clean,
  Build,
  Install,
}

impl Verb {
  /// The verb a dependency project receives while this verb runs.
  ///
  /// `install` only needs its dependencies built, every other verb propagates unchanged.
  pub fn for_dependency(self) -> Verb {
    match self {
      Verb::Install => Verb::Build,
      other => other,
    }
  }

  /// Whether a project that already ran `self` needs no separate run of `other`.
  pub fn covers(self, other: Verb) -> bool {
    self == other || (self == Verb::Install && other == Verb::Build)
  }
}

impl fmt::Display for Verb {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Verb::Reset => "reset",
      Verb::Clean => "clean",
      Verb::Build => "build",
      Verb::Install => "install",
    };
    f.write_str(name)
  }
}

/// A single builder lifecycle step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
  Reset,
  Download,
  PreProcess,
  Build,
  PostProcess,
  Clean,
}

impl fmt::Display for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Step::Reset => "reset",
      Step::Download => "download",
      Step::PreProcess => "pre_process",
      Step::Build => "build",
      Step::PostProcess => "post_process",
      Step::Clean => "clean",
    };
    f.write_str(name)
  }
}

/// The software a builder produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Product {
  Python,
  OpenSsl,
  Bzip2,
}

impl Product {
  /// Lowercase name, used for dependency prefixes and `python<ver>` style names.
  pub fn name(self) -> &'static str {
    match self {
      Product::Python => "python",
      Product::OpenSsl => "openssl",
      Product::Bzip2 => "bzip2",
    }
  }

  /// Name used by the upstream archive and its top-level directory.
  pub fn archive_stem(self) -> &'static str {
    match self {
      Product::Python => "Python",
      Product::OpenSsl => "openssl",
      Product::Bzip2 => "bzip2",
    }
  }

  pub fn default_version(self) -> &'static str {
    match self {
      Product::Python => PYTHON_VERSION,
      Product::OpenSsl => OPENSSL_VERSION,
      Product::Bzip2 => BZIP2_VERSION,
    }
  }

  pub fn url_template(self) -> &'static str {
    match self {
      Product::Python => PYTHON_URL,
      Product::OpenSsl => OPENSSL_URL,
      Product::Bzip2 => BZIP2_URL,
    }
  }
}

impl fmt::Display for Product {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Binary layout of the compiled product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
  Static,
  Shared,
  Framework,
}

impl fmt::Display for ArtifactKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      ArtifactKind::Static => "static",
      ArtifactKind::Shared => "shared",
      ArtifactKind::Framework => "framework",
    };
    f.write_str(name)
  }
}

/// Where the product comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
  /// Downloaded and compiled from upstream sources.
  Source,
  /// Adapted from an existing Homebrew installation.
  Homebrew,
}

impl fmt::Display for Provenance {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Provenance::Source => f.write_str("source"),
      Provenance::Homebrew => f.write_str("homebrew"),
    }
  }
}

/// Deployment context the runtime is fixed up for after it is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelocationPolicy {
  None,
  /// Standalone relocatable bundle under `support/`.
  Package,
  /// Embedded in a plugin bundle's `Contents/Resources`.
  Extension,
}

impl fmt::Display for RelocationPolicy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      RelocationPolicy::None => "none",
      RelocationPolicy::Package => "package",
      RelocationPolicy::Extension => "extension",
    };
    f.write_str(name)
  }
}

/// Variant descriptor selecting layout, provisioning and post-build fixups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Variant {
  pub product: Product,
  pub provenance: Provenance,
  pub kind: ArtifactKind,
  pub policy: RelocationPolicy,
}

impl Variant {
  pub const fn python(provenance: Provenance, kind: ArtifactKind, policy: RelocationPolicy) -> Self {
    Self {
      product: Product::Python,
      provenance,
      kind,
      policy,
    }
  }

  /// A third-party static library compiled from source.
  pub const fn library(product: Product) -> Self {
    Self {
      product,
      provenance: Provenance::Source,
      kind: ArtifactKind::Static,
      policy: RelocationPolicy::None,
    }
  }

  pub fn is_python(&self) -> bool {
    self.product == Product::Python
  }

  pub fn is_homebrew(&self) -> bool {
    self.provenance == Provenance::Homebrew
  }

  /// Whether the library artifact is loaded at runtime and carries load paths.
  pub fn is_dynamic(&self) -> bool {
    self.kind != ArtifactKind::Static
  }
}

impl fmt::Display for Variant {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {} {} ({})", self.provenance, self.kind, self.product, self.policy)
  }
}

/// A dotted product version with its derived forms.
///
/// For `3.9.2`: `full()` is `3.9.2`, `ver()` is `3.9`, `ver_nodot()` is `39`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Version(pub String);

impl Version {
  pub fn new(version: impl Into<String>) -> Self {
    Self(version.into())
  }

  pub fn full(&self) -> &str {
    &self.0
  }

  /// The major.minor form.
  pub fn ver(&self) -> String {
    self.0.split('.').take(2).collect::<Vec<_>>().join(".")
  }

  pub fn ver_nodot(&self) -> String {
    self.ver().replace('.', "")
  }
}

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Output descriptor recorded by a successful `build` step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductInfo {
  pub product: Product,
  pub version: Version,
  pub prefix: PathBuf,
  /// Library artifacts as produced by the build, before staging.
  pub artifacts: Vec<PathBuf>,
}
