//! Archive extraction and creation.
//!
//! Source archives are gzipped tarballs with a single top-level directory, which is stripped
//! on extraction. `zip_directory` writes the compressed standard library for `ziplib`.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::info;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

use crate::error::StepError;

/// Extract a source archive into `dest`, dropping the archive's top-level directory.
///
/// Supports `.tar.gz`, `.tgz` and `.tar`.
pub fn unpack_archive(archive_path: &Path, dest: &Path) -> Result<(), StepError> {
  let name = archive_path.to_string_lossy();

  fs::create_dir_all(dest).map_err(StepError::io(dest))?;

  let result = if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
    let file = File::open(archive_path).map_err(StepError::io(archive_path))?;
    unpack_tar(Archive::new(GzDecoder::new(BufReader::new(file))), dest)
  } else if name.ends_with(".tar") {
    let file = File::open(archive_path).map_err(StepError::io(archive_path))?;
    unpack_tar(Archive::new(BufReader::new(file)), dest)
  } else {
    return Err(StepError::Archive {
      path: archive_path.to_path_buf(),
      message: "unsupported archive format".to_string(),
    });
  };

  result.map_err(|e| StepError::Archive {
    path: archive_path.to_path_buf(),
    message: e.to_string(),
  })?;

  info!(archive = %archive_path.display(), dest = %dest.display(), "unpacked");
  Ok(())
}

fn unpack_tar<R: io::Read>(mut archive: Archive<R>, dest: &Path) -> io::Result<()> {
  let root = fs::canonicalize(dest)?;

  for entry in archive.entries()? {
    let mut entry = entry?;
    let stripped = strip_top_level(&entry.path()?)?;

    if stripped.as_os_str().is_empty() {
      continue;
    }

    let dest_path = dest.join(&stripped);

    if let Some(parent) = dest_path.parent() {
      fs::create_dir_all(parent)?;
      // A symlink unpacked earlier must not redirect later entries.
      if !fs::canonicalize(parent)?.starts_with(&root) {
        return Err(escapes(&stripped));
      }
    }

    entry.unpack(&dest_path)?;
  }

  Ok(())
}

/// Drop the archive's top-level directory (e.g. `Python-3.9.2/`), keeping only plain components.
fn strip_top_level(path: &Path) -> io::Result<PathBuf> {
  let mut stripped = PathBuf::new();
  for component in path.components().skip(1) {
    match component {
      Component::Normal(part) => stripped.push(part),
      Component::CurDir => {}
      Component::ParentDir | Component::RootDir | Component::Prefix(_) => return Err(escapes(path)),
    }
  }
  Ok(stripped)
}

fn escapes(path: &Path) -> io::Error {
  io::Error::new(
    io::ErrorKind::InvalidData,
    format!("entry {} escapes the extraction directory", path.display()),
  )
}

/// Write the contents of `src` into a deflated zip at `dest`, paths relative to `src`.
pub fn zip_directory(src: &Path, dest: &Path) -> Result<(), StepError> {
  let archive_err = |message: String| StepError::Archive {
    path: dest.to_path_buf(),
    message,
  };

  let file = File::create(dest).map_err(StepError::io(dest))?;
  let mut writer = zip::ZipWriter::new(BufWriter::new(file));
  let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

  for entry in WalkDir::new(src).sort_by_file_name() {
    let entry = entry.map_err(|e| archive_err(e.to_string()))?;
    let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
    if rel.as_os_str().is_empty() {
      continue;
    }
    let name = rel.to_string_lossy().replace('\\', "/");

    if entry.file_type().is_dir() {
      writer
        .add_directory(name, options)
        .map_err(|e| archive_err(e.to_string()))?;
    } else if entry.file_type().is_file() {
      writer
        .start_file(name, options)
        .map_err(|e| archive_err(e.to_string()))?;
      let mut input = File::open(entry.path()).map_err(StepError::io(entry.path()))?;
      io::copy(&mut input, &mut writer).map_err(StepError::io(dest))?;
    }
  }

  writer.finish().map_err(|e| archive_err(e.to_string()))?;
  info!(src = %src.display(), dest = %dest.display(), "zipped");
  Ok(())
}
