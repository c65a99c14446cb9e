//! The builder lifecycle.
//!
//! A [`Builder`] owns one product variant and runs it through
//! `reset → download → pre_process → build → post_process`. Each step is safe to re-run:
//! downloads are skipped when the archive exists, extraction when the source tree exists, and
//! relocation rewrites whatever reference it finds.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use super::catalog::BuilderSpec;
use super::layout::Layout;
use super::strip::{self, StripOptions};
use super::types::{ArtifactKind, Product, ProductInfo, RelocationPolicy, Step, Variant, Version};
use crate::consts::{
  DEFAULT_EXTERNAL, FRAMEWORK_LIBRARY, HOMEBREW_ROOT, MAC_DEP_TARGET, SITE_PACKAGES, VERSION_PLACEHOLDER,
};
use crate::error::{ConfigError, Error, Result, StepError};
use crate::execute::{CompileJob, Env, download_to, unpack_archive};
use crate::platform::ProjectPaths;
use crate::relocate::{self, RelocationPlan, RelocationTargets};
use crate::settings::Settings;
use crate::util::fs::{copy_file, copy_tree_within, ensure_dir, move_path, remove_path, repoint_symlinks};
use crate::util::hash::{ContentHash, hash_directory, hash_file};

/// A builder bound to a project.
#[derive(Debug, Clone)]
pub struct Builder {
  spec: BuilderSpec,
  /// Effective settings: recipe ⊕ project ⊕ builder.
  settings: Settings,
  paths: Arc<ProjectPaths>,
  external: String,
  product: Option<ProductInfo>,
}

impl Builder {
  /// Bind `spec` to a project, layering its settings over `parent`.
  pub fn new(spec: BuilderSpec, parent: &Settings, paths: Arc<ProjectPaths>) -> Result<Self, ConfigError> {
    let settings = parent.merged(&spec.settings);
    let external = settings.str_or("external", DEFAULT_EXTERNAL)?;
    Ok(Self {
      spec,
      settings,
      paths,
      external,
      product: None,
    })
  }

  pub fn name(&self) -> &str {
    &self.spec.name
  }

  pub fn spec(&self) -> &BuilderSpec {
    &self.spec
  }

  pub fn variant(&self) -> Variant {
    self.spec.variant
  }

  pub fn version(&self) -> Version {
    Version::new(self.spec.version.clone())
  }

  pub fn depends_on(&self) -> &[String] {
    &self.spec.depends_on
  }

  pub fn settings(&self) -> &Settings {
    &self.settings
  }

  pub fn paths(&self) -> &ProjectPaths {
    &self.paths
  }

  /// Output descriptor recorded by the last successful `build`.
  pub fn product(&self) -> Option<&ProductInfo> {
    self.product.as_ref()
  }

  pub fn layout(&self) -> Layout<'_> {
    Layout::new(&self.spec, &self.paths, &self.external)
  }

  /// Homebrew installation adapted by the homebrew variants.
  pub fn homebrew_root(&self) -> Result<PathBuf, ConfigError> {
    let default = HOMEBREW_ROOT.replace(VERSION_PLACEHOLDER, &self.version().ver());
    Ok(PathBuf::from(self.settings.str_or("homebrew_root", &default)?))
  }

  /// Whether the consumer-facing artifacts are already in place.
  pub fn is_built(&self) -> bool {
    let layout = self.layout();
    if self.spec.variant.is_python() {
      layout.library().exists()
    } else {
      layout.artifacts().iter().all(|a| a.exists())
    }
  }

  /// Checksum of the downloaded source archive, if present.
  pub fn archive_checksum(&self) -> Result<Option<ContentHash>, StepError> {
    let path = self.layout().download_path();
    if !path.exists() {
      return Ok(None);
    }
    hash_file(&path).map(Some)
  }

  /// Checksum of the installed prefix, bytecode caches excluded. `None` before anything is installed.
  pub fn tree_checksum(&self) -> Result<Option<ContentHash>, StepError> {
    let prefix = self.layout().prefix();
    if !prefix.is_dir() {
      return Ok(None);
    }
    hash_directory(&prefix, &["__pycache__"]).map(Some)
  }

  pub fn relocation_targets(&self) -> RelocationTargets {
    let layout = self.layout();
    RelocationTargets {
      kind: self.spec.variant.kind,
      library: layout.library(),
      interpreter: layout.interpreter(),
      library_names: layout.library_names(),
      bundle_root: layout.bundle_root(),
      resources_root: layout.resources_root(),
      plugin_macos: layout.plugin_macos(),
      plugin_executable: layout.plugin_executable(),
    }
  }

  /// Edits `post_process` applies for this variant's relocation policy.
  pub fn relocation_plan(&self) -> RelocationPlan {
    if !self.spec.variant.is_python() {
      return Vec::new();
    }
    relocate::plan(self.spec.variant.policy, &self.relocation_targets())
  }

  fn fail(&self, step: Step, source: StepError) -> Error {
    Error::Step {
      builder: self.spec.name.clone(),
      step,
      source,
    }
  }

  /// `reset → download → pre_process → build → post_process`
  pub async fn install(&mut self, env: &Env) -> Result<()> {
    info!(builder = %self.name(), "installing");
    self.reset(env).await?;
    self.make(env).await
  }

  /// `download → pre_process → build → post_process`, resuming on top of existing state.
  pub async fn make(&mut self, env: &Env) -> Result<()> {
    self.download(env).await?;
    self.pre_process(env).await?;
    self.build(env).await?;
    self.post_process(env).await
  }

  /// Remove the extracted sources, the install prefix and any plugin copy.
  pub async fn reset(&mut self, _env: &Env) -> Result<()> {
    info!(builder = %self.name(), step = %Step::Reset, "resetting");
    self.product = None;
    self.do_reset().map_err(|e| self.fail(Step::Reset, e))
  }

  fn do_reset(&self) -> Result<(), StepError> {
    let layout = self.layout();
    let variant = self.spec.variant;
    if !variant.is_homebrew() {
      remove_path(&layout.src_path())?;
    }
    if variant.is_homebrew() && variant.policy == RelocationPolicy::None {
      // Verifying builders never write a prefix.
      return Ok(());
    }
    remove_path(&layout.prefix())?;
    if variant.policy == RelocationPolicy::Extension {
      remove_path(&layout.resources_root())?;
    }
    Ok(())
  }

  /// Fetch the source archive if missing and extract it if the source tree is missing.
  pub async fn download(&mut self, env: &Env) -> Result<()> {
    if self.spec.variant.is_homebrew() {
      debug!(builder = %self.name(), "homebrew variant, nothing to download");
      return Ok(());
    }
    info!(builder = %self.name(), step = %Step::Download, "downloading");
    self.do_download(env).await.map_err(|e| self.fail(Step::Download, e))
  }

  async fn do_download(&self, env: &Env) -> Result<(), StepError> {
    let layout = self.layout();
    let url = layout.url();
    let archive = layout.download_path();

    if download_to(env.fetcher.as_ref(), &url, &archive).await? {
      info!(url = %url, path = %archive.display(), "downloaded");
    }

    let src = layout.src_path();
    if src.exists() {
      debug!(src = %src.display(), "source already extracted");
    } else {
      let extracted = unpack_archive(&archive, &src);
      if extracted.is_err() {
        remove_path(&src)?;
      }
      extracted?;
    }
    Ok(())
  }

  /// Write `Modules/Setup.local` for python source builds.
  pub async fn pre_process(&mut self, _env: &Env) -> Result<()> {
    let variant = self.spec.variant;
    if !variant.is_python() || variant.is_homebrew() {
      return Ok(());
    }
    info!(builder = %self.name(), step = %Step::PreProcess, "pre-processing");
    self.do_pre_process().map_err(|e| self.fail(Step::PreProcess, e))
  }

  fn do_pre_process(&self) -> Result<(), StepError> {
    let layout = self.layout();
    let src = layout.src_path();
    if !src.is_dir() {
      return Err(StepError::missing("extracted source", src));
    }
    let setup_local = src.join("Modules").join("Setup.local");

    if let Some(file) = self.settings.get_str("setup_local")? {
      let patch = self.paths.patch().join(self.version().ver()).join(file);
      if !patch.is_file() {
        return Err(StepError::missing("Setup.local patch", patch));
      }
      copy_file(&patch, &setup_local)?;
      info!(patch = %patch.display(), "installed Setup.local");
      return Ok(());
    }

    let disabled = self.settings.list_or("disabled_modules", &[])?;
    if !disabled.is_empty() {
      let mut content = String::from("*disabled*\n");
      for module in &disabled {
        content.push_str(module);
        content.push('\n');
      }
      ensure_dir(&src.join("Modules"))?;
      std::fs::write(&setup_local, content).map_err(StepError::io(&setup_local))?;
      info!(modules = ?disabled, "disabled modules in Setup.local");
    }
    Ok(())
  }

  /// Compile (or, for homebrew, copy) the product into its prefix and record it.
  pub async fn build(&mut self, env: &Env) -> Result<()> {
    info!(builder = %self.name(), step = %Step::Build, "building");
    let product = if self.spec.variant.is_homebrew() {
      self.adapt_homebrew()
    } else {
      self.compile(env).await
    }
    .map_err(|e| self.fail(Step::Build, e))?;

    info!(builder = %self.name(), prefix = %product.prefix.display(), "built");
    self.product = Some(product);
    Ok(())
  }

  async fn compile(&self, env: &Env) -> Result<ProductInfo, StepError> {
    let job = self.compile_job()?;
    if !job.src_dir.is_dir() {
      return Err(StepError::missing("extracted source", job.src_dir));
    }
    ensure_dir(&job.prefix)?;
    env.toolchain.compile(&job).await?;

    for artifact in &job.expected {
      if !artifact.exists() {
        return Err(StepError::missing("build artifact", artifact));
      }
    }
    Ok(ProductInfo {
      product: self.spec.variant.product,
      version: self.version(),
      prefix: job.prefix,
      artifacts: job.expected,
    })
  }

  /// The toolchain invocation for a source build.
  pub fn compile_job(&self) -> Result<CompileJob, ConfigError> {
    let layout = self.layout();
    let variant = self.spec.variant;
    let prefix = layout.prefix();
    let deps = self.paths.build_lib();

    let mut configure = Vec::new();
    let mut env = BTreeMap::new();
    env.insert(
      "MACOSX_DEPLOYMENT_TARGET".to_string(),
      self.settings.str_or("mac_dep_target", MAC_DEP_TARGET)?,
    );

    match variant.product {
      Product::Python => {
        match variant.kind {
          ArtifactKind::Static => {
            configure.push(format!("--prefix={}", prefix.display()));
            configure.push("--disable-shared".to_string());
          }
          ArtifactKind::Shared => {
            configure.push(format!("--prefix={}", prefix.display()));
            configure.push("--enable-shared".to_string());
          }
          ArtifactKind::Framework => {
            configure.push(format!("--enable-framework={}", self.paths.frameworks().display()));
          }
        }
        configure.push("--without-ensurepip".to_string());
        if self.depends_on_product(Product::OpenSsl) {
          configure.push(format!("--with-openssl={}", deps.join(Product::OpenSsl.name()).display()));
        }
        if self.depends_on_product(Product::Bzip2) {
          let bzip2 = deps.join(Product::Bzip2.name());
          env.insert("CPPFLAGS".to_string(), format!("-I{}", bzip2.join("include").display()));
          env.insert("LDFLAGS".to_string(), format!("-L{}", bzip2.join("lib").display()));
        }
      }
      Product::OpenSsl => {
        configure.push("no-shared".to_string());
        configure.push("no-tests".to_string());
        configure.push(format!("--prefix={}", prefix.display()));
      }
      Product::Bzip2 => {}
    }

    let jobs = match self.settings.get_u64("jobs")? {
      Some(n) => usize::try_from(n)
        .ok()
        .filter(|&jobs| jobs > 0)
        .ok_or_else(|| ConfigError::SettingType {
          key: "jobs".to_string(),
          expected: "a positive integer",
        })?,
      None => std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
    };

    Ok(CompileJob {
      product: variant.product,
      kind: variant.kind,
      src_dir: layout.src_path(),
      prefix,
      configure,
      env,
      jobs,
      expected: layout.artifacts(),
    })
  }

  fn depends_on_product(&self, product: Product) -> bool {
    self.spec.depends_on.iter().any(|d| d == product.name())
  }

  /// Copy the distributable parts of a homebrew python into the prefix.
  fn adapt_homebrew(&self) -> Result<ProductInfo, StepError> {
    let layout = self.layout();
    let root = self.homebrew_root()?;
    let interpreter = root.join("bin").join(layout.name_ver());
    let library = root.join(FRAMEWORK_LIBRARY);

    let required = [
      ("homebrew python", &root),
      ("homebrew interpreter", &interpreter),
      ("homebrew library", &library),
    ];
    for (what, path) in required {
      if !path.exists() {
        return Err(StepError::missing(what, path));
      }
    }

    if self.spec.variant.policy == RelocationPolicy::None {
      info!(root = %root.display(), "homebrew python verified");
      return Ok(ProductInfo {
        product: Product::Python,
        version: self.version(),
        prefix: root,
        artifacts: vec![library],
      });
    }

    let prefix = layout.prefix();
    remove_path(&prefix)?;
    for dir in ["bin", "lib", "include"] {
      let from = root.join(dir);
      if from.exists() {
        copy_tree_within(&from, &prefix.join(dir), &root, &[SITE_PACKAGES])?;
      }
    }
    // Third-party packages of the host installation are not distributed.
    ensure_dir(&layout.site_packages())?;
    copy_file(&library, &layout.built_library())?;
    info!(root = %root.display(), prefix = %prefix.display(), "copied homebrew python");

    let artifacts = vec![layout.built_library(), layout.interpreter()];
    for artifact in &artifacts {
      if !artifact.exists() {
        return Err(StepError::missing("build artifact", artifact));
      }
    }
    Ok(ProductInfo {
      product: Product::Python,
      version: self.version(),
      prefix,
      artifacts,
    })
  }

  /// Strip, optionally zip the standard library, stage the library and relocate.
  pub async fn post_process(&mut self, env: &Env) -> Result<()> {
    let variant = self.spec.variant;
    if !variant.is_python() || (variant.is_homebrew() && variant.policy == RelocationPolicy::None) {
      return Ok(());
    }
    info!(builder = %self.name(), step = %Step::PostProcess, "post-processing");
    self
      .do_post_process(env)
      .await
      .map_err(|e| self.fail(Step::PostProcess, e))?;
    if let Some(checksum) = self.tree_checksum().map_err(|e| self.fail(Step::PostProcess, e))? {
      info!(builder = %self.name(), checksum = %checksum, "installed tree");
    }
    Ok(())
  }

  async fn do_post_process(&self, env: &Env) -> Result<(), StepError> {
    let layout = self.layout();
    let prefix = layout.prefix();
    if !prefix.is_dir() {
      return Err(StepError::missing("install prefix", prefix));
    }

    let options = StripOptions::from_settings(&self.settings)?;
    strip::strip(&layout, &options)?;

    if self.settings.bool_or("ziplib", false)? {
      strip::ziplib(&layout)?;
    }

    self.stage_library()?;

    let plan = self.relocation_plan();
    if !plan.is_empty() {
      info!(builder = %self.name(), policy = %self.spec.variant.policy, edits = plan.len(), "relocating");
      relocate::apply(&plan, env.editor.as_ref()).await?;
    }
    Ok(())
  }

  /// Move the library from where the build left it to its consumer-facing location.
  fn stage_library(&self) -> Result<(), StepError> {
    let layout = self.layout();
    let built = layout.built_library();
    let library = layout.library();
    if built != library && built.exists() {
      move_path(&built, &library)?;
      let links = repoint_symlinks(&layout.prefix(), &built, &library)?;
      debug!(from = %built.display(), to = %library.display(), links, "staged library");
    }
    if !library.exists() {
      return Err(StepError::missing("library artifact", library));
    }
    Ok(())
  }

  /// Strip an installed python tree again, or drop a library's extracted sources.
  pub async fn clean(&mut self, _env: &Env) -> Result<()> {
    info!(builder = %self.name(), step = %Step::Clean, "cleaning");
    self.do_clean().map_err(|e| self.fail(Step::Clean, e))
  }

  fn do_clean(&self) -> Result<(), StepError> {
    let layout = self.layout();
    let variant = self.spec.variant;
    if !variant.is_python() {
      remove_path(&layout.src_path())?;
      return Ok(());
    }
    if variant.is_homebrew() && variant.policy == RelocationPolicy::None {
      return Ok(());
    }
    if layout.prefix().is_dir() {
      let options = StripOptions::from_settings(&self.settings)?;
      strip::strip(&layout, &options)?;
    }
    Ok(())
  }
}
