//! Source archive downloads.

use std::path::Path;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::StepError;

/// Downloads a URL to a local file.
#[async_trait]
pub trait Fetcher: Send + Sync {
  async fn fetch(&self, url: &str, dest: &Path) -> Result<(), StepError>;
}

/// Production fetcher over HTTP(S).
#[derive(Debug, Default, Clone)]
pub struct HttpFetcher;

#[async_trait]
impl Fetcher for HttpFetcher {
  async fn fetch(&self, url: &str, dest: &Path) -> Result<(), StepError> {
    info!(url = %url, "fetching URL");

    let response = reqwest::get(url).await.map_err(|e| StepError::Fetch {
      url: url.to_string(),
      message: e.to_string(),
    })?;

    if !response.status().is_success() {
      return Err(StepError::Fetch {
        url: url.to_string(),
        message: format!("HTTP {}", response.status()),
      });
    }

    let bytes = response.bytes().await.map_err(|e| StepError::Fetch {
      url: url.to_string(),
      message: e.to_string(),
    })?;

    let mut file = fs::File::create(dest).await.map_err(StepError::io(dest))?;
    file.write_all(&bytes).await.map_err(StepError::io(dest))?;
    file.flush().await.map_err(StepError::io(dest))?;

    info!(path = ?dest, size = bytes.len(), "download complete");
    Ok(())
  }
}

/// Download `url` to `dest` unless it is already there.
///
/// The payload is written to `<dest>.part` first and renamed once complete, so an interrupted
/// download never leaves a truncated archive at `dest`.
///
/// # Returns
///
/// `true` if a download happened, `false` if the archive was already present.
pub async fn download_to(fetcher: &dyn Fetcher, url: &str, dest: &Path) -> Result<bool, StepError> {
  if dest.exists() {
    debug!(path = ?dest, "archive already downloaded");
    return Ok(false);
  }

  if let Some(parent) = dest.parent() {
    fs::create_dir_all(parent).await.map_err(StepError::io(parent))?;
  }

  let mut part = dest.as_os_str().to_owned();
  part.push(".part");
  let part = Path::new(&part);

  fetcher.fetch(url, part).await?;
  fs::rename(part, dest).await.map_err(StepError::io(part))?;
  Ok(true)
}

/// Convert a URL to a safe filename.
///
/// Takes the last path component and sanitizes it. Falls back to a hash of the URL if no
/// suitable filename can be extracted.
pub fn url_to_filename(url: &str) -> String {
  if let Some(filename) = url.rsplit('/').next() {
    let filename = filename.split('?').next().unwrap_or(filename);

    let sanitized: String = filename
      .chars()
      .map(|c| {
        if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
          c
        } else {
          '_'
        }
      })
      .collect();

    if !sanitized.is_empty() && sanitized != "." && sanitized != ".." {
      return sanitized;
    }
  }

  let mut hasher = Sha256::new();
  hasher.update(url.as_bytes());
  format!("download_{}", &hex::encode(hasher.finalize())[..16])
}
