//! Caller-owned cache of decoded dish photographs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use image::RgbImage;

use crate::error::{MeasureError, Result};

struct CachedImage {
    modified: Option<SystemTime>,
    image: Arc<RgbImage>,
}

/// Decoded RGB images keyed by path and file modification time.
///
/// A file rewritten on disk since it was cached is decoded again. The cache
/// holds no global state; whoever measures owns it and decides its lifetime.
#[derive(Default)]
pub struct ImageCache {
    entries: HashMap<PathBuf, CachedImage>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Image at `path`, decoded on first use or when the file changed.
    pub fn get_or_load(&mut self, path: &Path) -> Result<Arc<RgbImage>> {
        let modified = std::fs::metadata(path)
            .map_err(|e| MeasureError::ImageLoad {
                path: path.to_path_buf(),
                source: image::ImageError::IoError(e),
            })?
            .modified()
            .ok();

        if let Some(entry) = self.entries.get(path) {
            if modified.is_some() && entry.modified == modified {
                return Ok(Arc::clone(&entry.image));
            }
        }

        let image = image::open(path)
            .map_err(|source| MeasureError::ImageLoad {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgb8();
        tracing::debug!(
            path = %path.display(),
            w = image.width(),
            h = image.height(),
            "decoded dish image"
        );
        let image = Arc::new(image);
        self.entries.insert(
            path.to_path_buf(),
            CachedImage {
                modified,
                image: Arc::clone(&image),
            },
        );
        Ok(image)
    }

    /// Drop the entry for `path`, if any.
    pub fn invalidate(&mut self, path: &Path) {
        self.entries.remove(path);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
