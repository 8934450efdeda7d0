//! Resolves opaque image references (logos, clip images) to bitmaps.

use crate::error::{RenderError, Result};
use image::RgbaImage;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// A resolved image: the reference it came from and its decoded pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub source: String,
    pub bitmap: Arc<RgbaImage>,
}

impl Asset {
    pub fn new(source: impl Into<String>, bitmap: RgbaImage) -> Self {
        Self {
            source: source.into(),
            bitmap: Arc::new(bitmap),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.bitmap.dimensions()
    }
}

/// Turns a source reference into a bitmap, or fails with [`RenderError::MissingAsset`].
pub trait AssetResolver: Send + Sync {
    fn resolve(&self, source: &str) -> Result<Asset>;
}

/// Loads images from disk, relative to an optional base directory.
#[derive(Debug, Clone, Default)]
pub struct FileAssetResolver {
    base_dir: Option<PathBuf>,
}

impl FileAssetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }
}

impl AssetResolver for FileAssetResolver {
    fn resolve(&self, source: &str) -> Result<Asset> {
        if source.is_empty() {
            return Err(RenderError::MissingAsset("empty source".to_string()));
        }
        let path = match &self.base_dir {
            Some(base) => base.join(source),
            None => PathBuf::from(source),
        };
        if !path.is_file() {
            return Err(RenderError::MissingAsset(path.display().to_string()));
        }
        let bitmap = image::open(&path)
            .map_err(|e| RenderError::MissingAsset(format!("{}: {e}", path.display())))?
            .to_rgba8();
        Ok(Asset::new(source, bitmap))
    }
}

/// Serves bitmaps registered up front.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssetResolver {
    assets: HashMap<String, Arc<RgbaImage>>,
}

impl MemoryAssetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: impl Into<String>, bitmap: RgbaImage) -> &mut Self {
        self.assets.insert(source.into(), Arc::new(bitmap));
        self
    }
}

impl AssetResolver for MemoryAssetResolver {
    fn resolve(&self, source: &str) -> Result<Asset> {
        self.assets
            .get(source)
            .map(|bitmap| Asset {
                source: source.to_string(),
                bitmap: Arc::clone(bitmap),
            })
            .ok_or_else(|| RenderError::MissingAsset(source.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_memory_resolver() {
        let mut resolver = MemoryAssetResolver::new();
        resolver.insert("logo", RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])));
        let asset = resolver.resolve("logo").unwrap();
        assert_eq!(asset.dimensions(), (4, 4));
        assert!(matches!(resolver.resolve("other"), Err(RenderError::MissingAsset(_))));
    }

    #[test]
    fn test_file_resolver() {
        let dir = tempfile::tempdir().unwrap();
        RgbaImage::from_pixel(3, 2, Rgba([0, 0, 255, 255]))
            .save(dir.path().join("logo.png"))
            .unwrap();

        let resolver = FileAssetResolver::with_base_dir(dir.path());
        assert_eq!(resolver.resolve("logo.png").unwrap().dimensions(), (3, 2));
        assert!(matches!(resolver.resolve("absent.png"), Err(RenderError::MissingAsset(_))));
        assert!(matches!(resolver.resolve(""), Err(RenderError::MissingAsset(_))));
    }
}
