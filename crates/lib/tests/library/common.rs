//! Shared doubles and fixtures for the library integration tests.
//!
//! Binaries are simulated as JSON files (`{"id": ..., "refs": [...]}`) so relocation can be
//! observed without Mach-O tooling.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use pybundle_lib::build::Product;
use pybundle_lib::execute::{CompileJob, Fetcher, Toolchain};
use pybundle_lib::relocate::{LoadPathEditor, reference_name};
use pybundle_lib::{Env, StepError};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

/// Writes a small source tarball for any URL and counts the calls.
#[derive(Default)]
pub struct FakeFetcher {
  pub calls: AtomicUsize,
}

impl FakeFetcher {
  pub fn count(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Fetcher for FakeFetcher {
  async fn fetch(&self, _url: &str, dest: &Path) -> Result<(), StepError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let file = fs::File::create(dest).map_err(StepError::io(dest))?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    for (name, content) in [("configure", "#!/bin/sh\n"), ("Modules/Setup", "# modules\n")] {
      let mut header = tar::Header::new_gnu();
      header.set_size(content.len() as u64);
      header.set_mode(0o755);
      header.set_cksum();
      builder
        .append_data(&mut header, format!("src/{}", name), content.as_bytes())
        .map_err(StepError::io(dest))?;
    }
    let encoder = builder.into_inner().map_err(StepError::io(dest))?;
    encoder.finish().map_err(StepError::io(dest))?;
    Ok(())
  }
}

/// Simulated Mach-O binary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FakeBinary {
  pub id: Option<String>,
  pub refs: Vec<String>,
}

pub fn write_binary(path: &Path, binary: &FakeBinary) {
  fs::create_dir_all(path.parent().unwrap()).unwrap();
  fs::write(path, serde_json::to_string(binary).unwrap()).unwrap();
}

pub fn read_binary(path: &Path) -> FakeBinary {
  serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

pub fn touch(path: &Path, content: &str) {
  fs::create_dir_all(path.parent().unwrap()).unwrap();
  fs::write(path, content).unwrap();
}

/// Populate a python prefix the way `make install` would.
pub fn install_python_tree(python_lib: &Path) {
  touch(&python_lib.join("os.py"), "import sys\n");
  touch(&python_lib.join("json/__init__.py"), "");
  touch(&python_lib.join("json/__pycache__/__init__.cpython-39.pyc"), "");
  touch(&python_lib.join("test/test_os.py"), "");
  touch(&python_lib.join("idlelib/idle.py"), "");
  touch(&python_lib.join("site-packages/README.txt"), "");
  touch(&python_lib.join("site-packages/demo/core.py"), "");
  touch(&python_lib.join("site-packages/demo/test_core.py"), "");
  touch(&python_lib.join("lib-dynload/_json.cpython-39-darwin.so"), "");
  touch(&python_lib.join("lib-dynload/_tkinter.cpython-39-darwin.so"), "");
}

/// Creates the artifacts a real build would and records what it compiled.
#[derive(Default)]
pub struct RecordingToolchain {
  pub compiled: Mutex<Vec<String>>,
  /// Products for which the toolchain "succeeds" without producing anything.
  pub broken: Mutex<HashSet<Product>>,
}

impl RecordingToolchain {
  pub fn compiled(&self) -> Vec<String> {
    self.compiled.lock().unwrap().clone()
  }

  pub fn break_product(&self, product: Product) {
    self.broken.lock().unwrap().insert(product);
  }
}

#[async_trait]
impl Toolchain for RecordingToolchain {
  async fn compile(&self, job: &CompileJob) -> Result<(), StepError> {
    self.compiled.lock().unwrap().push(job.product.name().to_string());
    if self.broken.lock().unwrap().contains(&job.product) {
      return Ok(());
    }

    match job.product {
      Product::Python => {
        let library = &job.expected[0];
        let interpreter = &job.expected[1];
        let python_lib = &job.expected[2];
        let install_name = library.to_string_lossy().to_string();
        if library.extension().is_some_and(|e| e == "a") {
          touch(library, "!<arch>\n");
        } else {
          write_binary(
            library,
            &FakeBinary {
              id: Some(install_name.clone()),
              refs: vec!["/usr/lib/libSystem.B.dylib".to_string()],
            },
          );
        }
        write_binary(
          interpreter,
          &FakeBinary {
            id: None,
            refs: vec![install_name, "/usr/lib/libSystem.B.dylib".to_string()],
          },
        );
        install_python_tree(python_lib);
        touch(&job.prefix.join("bin/python3.9-config"), "");
      }
      _ => {
        for artifact in &job.expected {
          touch(artifact, "!<arch>\n");
        }
      }
    }
    Ok(())
  }
}

/// Load-path editor over [`FakeBinary`] files.
pub struct JsonEditor;

fn load(binary: &Path) -> Result<FakeBinary, StepError> {
  let content = fs::read_to_string(binary).map_err(StepError::io(binary))?;
  serde_json::from_str(&content).map_err(|e| StepError::Io {
    path: binary.to_path_buf(),
    source: std::io::Error::other(e),
  })
}

fn store(binary: &Path, value: &FakeBinary) -> Result<(), StepError> {
  let content = serde_json::to_string(value).map_err(|e| StepError::Io {
    path: binary.to_path_buf(),
    source: std::io::Error::other(e),
  })?;
  fs::write(binary, content).map_err(StepError::io(binary))
}

#[async_trait]
impl LoadPathEditor for JsonEditor {
  async fn install_name(&self, binary: &Path) -> Result<Option<String>, StepError> {
    Ok(load(binary)?.id)
  }

  async fn references(&self, binary: &Path) -> Result<Vec<String>, StepError> {
    Ok(load(binary)?.refs)
  }

  async fn set_install_name(&self, binary: &Path, id: &str) -> Result<(), StepError> {
    let mut value = load(binary)?;
    value.id = Some(id.to_string());
    store(binary, &value)
  }

  async fn change_reference(&self, binary: &Path, old: &str, new: &str) -> Result<(), StepError> {
    let mut value = load(binary)?;
    let Some(slot) = value.refs.iter_mut().find(|r| r.as_str() == old) else {
      return Err(StepError::MissingReference {
        binary: binary.to_path_buf(),
        library: reference_name(old).to_string(),
      });
    };
    *slot = new.to_string();
    store(binary, &value)
  }
}

/// A temporary workspace with doubles wired into an [`Env`].
pub struct Harness {
  pub temp: TempDir,
  pub fetcher: Arc<FakeFetcher>,
  pub toolchain: Arc<RecordingToolchain>,
  pub env: Env,
}

impl Harness {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let fetcher = Arc::new(FakeFetcher::default());
    let toolchain = Arc::new(RecordingToolchain::default());
    let env = Env::new(fetcher.clone(), toolchain.clone(), Arc::new(JsonEditor));
    Self {
      temp,
      fetcher,
      toolchain,
      env,
    }
  }

  pub fn root(&self) -> PathBuf {
    self.temp.path().join("workspace")
  }

  pub fn paths(&self) -> pybundle_lib::platform::ProjectPaths {
    pybundle_lib::platform::ProjectPaths::new(self.root())
  }

  /// Create the plugin executable of `external`, linked against `reference`.
  pub fn plugin(&self, external: &str, reference: &str) -> PathBuf {
    let path = self
      .root()
      .join(format!("externals/{}.mxo/Contents/MacOS/{}", external, external));
    write_binary(
      &path,
      &FakeBinary {
        id: None,
        refs: vec![reference.to_string()],
      },
    );
    path
  }
}

/// All files below `root` whose name matches `pred`.
pub fn files_matching(root: &Path, pred: impl Fn(&str) -> bool) -> Vec<PathBuf> {
  walkdir::WalkDir::new(root)
    .into_iter()
    .filter_map(Result::ok)
    .filter(|e| e.file_type().is_file() && pred(&e.file_name().to_string_lossy()))
    .map(|e| e.into_path())
    .collect()
}
