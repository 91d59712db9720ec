//! Theme and content assets.
//!
//! An asset is addressed by `folder` + `filename` and backed by a local file,
//! a remote URL or bytes already in memory. Bytes are read on first use and
//! kept for the asset's lifetime, so a writer that both checksums and
//! uploads an asset only reads it once.

use sha2::{Digest, Sha256};
use std::cell::OnceCell;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to fetch {url}: {source}")]
    Fetch { url: String, source: reqwest::Error },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    File(PathBuf),
    Url(String),
    Inline(Vec<u8>),
}

impl fmt::Display for AssetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetSource::File(path) => write!(f, "{}", path.display()),
            AssetSource::Url(url) => f.write_str(url),
            AssetSource::Inline(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

impl AssetSource {
    fn load(&self) -> Result<Vec<u8>, AssetError> {
        match self {
            AssetSource::File(path) => std::fs::read(path).map_err(|source| AssetError::Io {
                path: path.clone(),
                source,
            }),
            AssetSource::Url(url) => {
                let fetch = |source| AssetError::Fetch {
                    url: url.clone(),
                    source,
                };
                let response = reqwest::blocking::get(url)
                    .and_then(|r| r.error_for_status())
                    .map_err(fetch)?;
                Ok(response.bytes().map_err(fetch)?.to_vec())
            }
            AssetSource::Inline(bytes) => Ok(bytes.clone()),
        }
    }
}

/// Lazily-loaded bytes shared by both asset kinds.
#[derive(Debug, Clone)]
struct Blob {
    source: AssetSource,
    content: OnceCell<Vec<u8>>,
}

impl Blob {
    fn new(source: AssetSource) -> Self {
        Self {
            source,
            content: OnceCell::new(),
        }
    }

    fn content(&self) -> Result<&[u8], AssetError> {
        if let Some(bytes) = self.content.get() {
            return Ok(bytes);
        }
        let bytes = self.source.load()?;
        Ok(self.content.get_or_init(|| bytes))
    }

    fn checksum(&self) -> Result<String, AssetError> {
        let mut hasher = Sha256::new();
        hasher.update(self.content()?);
        Ok(format!("{:x}", hasher.finalize()))
    }
}

/// A file the site's theme serves: stylesheets, scripts, fonts, images.
#[derive(Debug, Clone)]
pub struct ThemeAsset {
    pub id: Option<String>,
    pub folder: String,
    pub filename: String,
    blob: Blob,
}

impl ThemeAsset {
    pub fn new(folder: impl Into<String>, filename: impl Into<String>, source: AssetSource) -> Self {
        Self {
            id: None,
            folder: folder.into(),
            filename: filename.into(),
            blob: Blob::new(source),
        }
    }

    /// `folder/filename`, the asset's identity on both sides.
    pub fn path(&self) -> String {
        join(&self.folder, &self.filename)
    }

    pub fn source(&self) -> &AssetSource {
        &self.blob.source
    }

    pub fn content(&self) -> Result<&[u8], AssetError> {
        self.blob.content()
    }

    /// Hex SHA-256 of the content.
    pub fn checksum(&self) -> Result<String, AssetError> {
        self.blob.checksum()
    }
}

/// A file uploaded as site content (sample images, documents).
#[derive(Debug, Clone)]
pub struct ContentAsset {
    pub id: Option<String>,
    pub folder: String,
    pub filename: String,
    blob: Blob,
}

impl ContentAsset {
    pub fn new(folder: impl Into<String>, filename: impl Into<String>, source: AssetSource) -> Self {
        Self {
            id: None,
            folder: folder.into(),
            filename: filename.into(),
            blob: Blob::new(source),
        }
    }

    pub fn path(&self) -> String {
        join(&self.folder, &self.filename)
    }

    pub fn source(&self) -> &AssetSource {
        &self.blob.source
    }

    pub fn content(&self) -> Result<&[u8], AssetError> {
        self.blob.content()
    }

    pub fn checksum(&self) -> Result<String, AssetError> {
        self.blob.checksum()
    }
}

fn join(folder: &str, filename: &str) -> String {
    if folder.is_empty() {
        filename.to_string()
    } else {
        format!("{folder}/{filename}")
    }
}

/// Split a path relative to the asset root into `(folder, filename)`.
pub fn split_asset_path(relative: &Path) -> (String, String) {
    let filename = relative
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let folder = relative
        .parent()
        .map(|p| {
            p.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default();
    (folder, filename)
}
