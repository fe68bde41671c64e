//! Asset byte sources and still-image decoding.

use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::util::{Error, Result};

/// Resolves catalog `src` strings to bytes.
pub trait AssetSource: Send + Sync {
    /// Read the whole asset.
    fn read(&self, src: &str) -> Result<Vec<u8>>;

    /// Local filesystem path, for decoders that open files themselves.
    fn locate(&self, src: &str) -> Result<PathBuf>;
}

/// Files relative to a catalog root. Absolute `src` paths are used as is.
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetSource for FsSource {
    fn read(&self, src: &str) -> Result<Vec<u8>> {
        let path = self.locate(src)?;
        Ok(std::fs::read(path)?)
    }

    fn locate(&self, src: &str) -> Result<PathBuf> {
        let src = src.trim();
        if src.is_empty() {
            return Err(Error::FileNotFound(PathBuf::new()));
        }
        let path = Path::new(src);
        let path = if path.is_absolute() { path.to_path_buf() } else { self.root.join(path) };
        if !path.is_file() {
            return Err(Error::FileNotFound(path));
        }
        Ok(path)
    }
}

/// Decode an image; animated formats yield their first frame.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage> {
    if bytes.is_empty() {
        return Err(Error::Decode("empty image".into()));
    }
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}
