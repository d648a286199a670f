//! Image reference resolution for photo evidence.
//!
//! Two addressing schemes are understood:
//!   - filesystem paths, bare or as `file://` URIs
//!   - `content://<authority>/<path>` handles, backed by a directory on disk
//!     (the content root). These are copied into a temporary file first; the
//!     temporary file lives as long as the returned `ResolvedImage`.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::util::image_mime_for;

const CONTENT_SCHEME: &str = "content://";
const FILE_SCHEME: &str = "file://";
const EVIDENCE_AUTHORITY: &str = "ecoquest";

#[derive(Debug, Error)]
pub enum ImageError {
  #[error("unsupported image reference scheme: {0}")]
  UnsupportedScheme(String),
  #[error("invalid content handle: {0}")]
  InvalidHandle(String),
  #[error(transparent)]
  Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
  Path(PathBuf),
  Content { authority: String, path: PathBuf },
}

impl ImageRef {
  pub fn parse(reference: &str) -> Result<Self, ImageError> {
    if let Some(rest) = reference.strip_prefix(FILE_SCHEME) {
      if rest.is_empty() {
        return Err(ImageError::InvalidHandle(reference.into()));
      }
      return Ok(Self::Path(PathBuf::from(rest)));
    }
    if let Some(rest) = reference.strip_prefix(CONTENT_SCHEME) {
      let (authority, path) = rest
        .split_once('/')
        .ok_or_else(|| ImageError::InvalidHandle(reference.into()))?;
      let path = PathBuf::from(path);
      let confined = !authority.is_empty()
        && path.components().next().is_some()
        && path.components().all(|c| matches!(c, Component::Normal(_)))
        && !authority.contains("..");
      if !confined {
        return Err(ImageError::InvalidHandle(reference.into()));
      }
      return Ok(Self::Content { authority: authority.into(), path });
    }
    match reference.split_once("://") {
      Some((scheme, _)) => Err(ImageError::UnsupportedScheme(scheme.into())),
      None if reference.is_empty() => Err(ImageError::InvalidHandle(reference.into())),
      None => Ok(Self::Path(PathBuf::from(reference))),
    }
  }
}

/// Image bytes ready to send, plus the temp copy (if any) that backs them.
#[derive(Debug)]
pub struct ResolvedImage {
  pub bytes: Vec<u8>,
  pub mime_type: &'static str,
  temp: Option<tempfile::NamedTempFile>,
}

impl ResolvedImage {
  pub fn temp_path(&self) -> Option<&Path> {
    self.temp.as_ref().map(|t| t.path())
  }
}

#[derive(Clone, Debug)]
pub struct ImageResolver {
  content_root: PathBuf,
}

impl ImageResolver {
  pub fn new(content_root: impl Into<PathBuf>) -> Self {
    Self { content_root: content_root.into() }
  }

  #[instrument(level = "debug", skip(self))]
  pub fn resolve(&self, reference: &str) -> Result<ResolvedImage, ImageError> {
    match ImageRef::parse(reference)? {
      ImageRef::Path(path) => {
        let bytes = fs::read(&path)?;
        Ok(ResolvedImage { bytes, mime_type: image_mime_for(&path), temp: None })
      }
      ImageRef::Content { authority, path } => {
        let source = self.content_root.join(&authority).join(&path);
        let mut input = fs::File::open(&source)?;
        let suffix = path
          .extension()
          .and_then(|e| e.to_str())
          .map(|e| format!(".{e}"))
          .unwrap_or_else(|| ".tmp".into());
        let mut temp = tempfile::Builder::new().prefix("upload").suffix(&suffix).tempfile()?;
        io::copy(&mut input, temp.as_file_mut())?;
        let bytes = fs::read(temp.path())?;
        debug!(target: "vision", temp = %temp.path().display(), size = bytes.len(), "Copied content handle to temp file");
        Ok(ResolvedImage { bytes, mime_type: image_mime_for(temp.path()), temp: Some(temp) })
      }
    }
  }

  /// Store uploaded evidence under the content root and hand back its `content://` handle.
  #[instrument(level = "debug", skip(self, bytes), fields(size = bytes.len()))]
  pub fn store_evidence(&self, bytes: &[u8], extension: &str) -> Result<String, ImageError> {
    let ext: String = extension
      .trim_start_matches('.')
      .chars()
      .filter(|c| c.is_ascii_alphanumeric())
      .collect();
    let ext = if ext.is_empty() { "jpg".to_string() } else { ext.to_ascii_lowercase() };
    let name = format!("{}.{}", Uuid::new_v4(), ext);
    let dir = self.content_root.join(EVIDENCE_AUTHORITY).join("evidence");
    fs::create_dir_all(&dir)?;
    fs::write(dir.join(&name), bytes)?;
    Ok(format!("{CONTENT_SCHEME}{EVIDENCE_AUTHORITY}/evidence/{name}"))
  }

  /// Delete a `content://` handle's backing file once it is no longer needed.
  pub fn discard(&self, handle: &str) -> Result<(), ImageError> {
    match ImageRef::parse(handle)? {
      ImageRef::Content { authority, path } => Ok(fs::remove_file(self.content_root.join(authority).join(path))?),
      ImageRef::Path(_) => Err(ImageError::InvalidHandle(handle.into())),
    }
  }
}
