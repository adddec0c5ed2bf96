//! Texture loading for scenes.
//!
//! Scenes ask a [`TextureLoader`] for textures by name during construction
//! and hold on to the returned [`TextureHandle`]s. Handles carry CPU-side
//! RGBA pixels only; the GPU backend uploads each handle the first time it
//! is bound and caches the result by [`TextureHandle::id`].
//!
//! A missing or unreadable texture is not an error for the scene: the loader
//! logs it and returns `None`, and the backend binds a transparent fallback.
//!
//! # Supported Formats
//!
//! - PNG (recommended)
//! - JPEG

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::TextureError;

/// Filter mode for texture sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Smooth linear filtering. Good for photos and gradients.
    Linear,
    /// Sharp nearest-neighbor filtering (default). Good for pixel art.
    #[default]
    Nearest,
}

/// Decoded RGBA pixels.
#[derive(Debug, Clone)]
pub struct TextureData {
    /// Raw RGBA pixel data (width * height * 4 bytes).
    pub data: Vec<u8>,
    /// Texture width in pixels.
    pub width: u32,
    /// Texture height in pixels.
    pub height: u32,
    /// Filter mode for magnification/minification.
    pub filter: FilterMode,
}

impl TextureData {
    /// Wrap raw RGBA data.
    ///
    /// # Panics
    ///
    /// Panics if `data` is not exactly `width * height * 4` bytes.
    pub fn from_rgba(data: Vec<u8>, width: u32, height: u32) -> Self {
        assert_eq!(
            data.len(),
            (width * height * 4) as usize,
            "RGBA data size mismatch"
        );
        Self {
            data,
            width,
            height,
            filter: FilterMode::Nearest,
        }
    }

    /// Decode an image file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TextureError> {
        let bytes = std::fs::read(path.as_ref())?;
        let img = image::load_from_memory(&bytes)?.into_rgba8();
        let (width, height) = img.dimensions();
        Ok(Self {
            data: img.into_raw(),
            width,
            height,
            filter: FilterMode::Nearest,
        })
    }

    /// A solid color texture (1x1 pixel).
    pub fn solid(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::from_rgba(vec![r, g, b, a], 1, 1)
    }

    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }
}

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Shared, immutable texture loaded by name.
#[derive(Debug, Clone)]
pub struct TextureHandle {
    id: u64,
    name: Arc<str>,
    data: Arc<TextureData>,
}

impl TextureHandle {
    pub fn new(name: &str, data: TextureData) -> Self {
        Self {
            id: NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed),
            name: Arc::from(name),
            data: Arc::new(data),
        }
    }

    /// Process-unique id, stable across clones.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &TextureData {
        &self.data
    }
}

/// Source of named textures.
pub trait TextureLoader: Send + Sync {
    /// Load `name`, or `None` if it does not exist or fails to decode.
    fn load(&self, name: &str) -> Option<TextureHandle>;
}

/// Loads `<root>/<name>.png` (or `.jpg` / `.jpeg`) from disk.
///
/// Each name is decoded once; later loads return the cached handle.
pub struct ImageTextureLoader {
    root: PathBuf,
    cache: std::sync::Mutex<HashMap<String, TextureHandle>>,
}

impl ImageTextureLoader {
    const EXTENSIONS: [&'static str; 3] = ["png", "jpg", "jpeg"];

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn find(&self, name: &str) -> Option<PathBuf> {
        Self::EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{name}.{ext}")))
            .find(|path| path.is_file())
    }
}

impl TextureLoader for ImageTextureLoader {
    fn load(&self, name: &str) -> Option<TextureHandle> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(handle) = cache.get(name) {
                return Some(handle.clone());
            }
        }

        let Some(path) = self.find(name) else {
            log::warn!("Texture '{}' not found in {}", name, self.root.display());
            return None;
        };

        match TextureData::from_file(&path) {
            Ok(data) => {
                log::debug!("Loaded texture '{}' ({}x{})", name, data.width, data.height);
                let handle = TextureHandle::new(name, data);
                if let Ok(mut cache) = self.cache.lock() {
                    cache.insert(name.to_string(), handle.clone());
                }
                Some(handle)
            }
            Err(e) => {
                log::warn!("Failed to load texture '{}': {}", path.display(), e);
                None
            }
        }
    }
}

/// In-memory textures, mostly for tests and headless runs.
#[derive(Default)]
pub struct MemoryTextureLoader {
    textures: HashMap<String, TextureHandle>,
}

impl MemoryTextureLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_texture(mut self, name: &str, data: TextureData) -> Self {
        self.textures
            .insert(name.to_string(), TextureHandle::new(name, data));
        self
    }
}

impl TextureLoader for MemoryTextureLoader {
    fn load(&self, name: &str) -> Option<TextureHandle> {
        self.textures.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_loader_returns_same_handle() {
        let loader = MemoryTextureLoader::new().with_texture("dot", TextureData::solid(255, 0, 0, 255));
        let a = loader.load("dot").expect("texture registered");
        let b = loader.load("dot").expect("texture registered");
        assert_eq!(a.id(), b.id());
        assert_eq!(a.name(), "dot");
        assert!(loader.load("missing").is_none());
    }

    #[test]
    fn test_handles_get_distinct_ids() {
        let a = TextureHandle::new("a", TextureData::solid(0, 0, 0, 0));
        let b = TextureHandle::new("a", TextureData::solid(0, 0, 0, 0));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    #[should_panic(expected = "RGBA data size mismatch")]
    fn test_from_rgba_checks_size() {
        TextureData::from_rgba(vec![0; 7], 1, 2);
    }

    #[test]
    fn test_image_loader_missing_dir() {
        let loader = ImageTextureLoader::new("/definitely/not/here");
        assert!(loader.load("cyberpunk_street_background").is_none());
    }

    #[test]
    fn test_image_loader_decodes_png() {
        let dir = std::env::temp_dir().join(format!("hardway-tex-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        img.save(dir.join("tile.png")).unwrap();

        let loader = ImageTextureLoader::new(&dir);
        let handle = loader.load("tile").expect("png decodes");
        assert_eq!((handle.data().width, handle.data().height), (3, 2));
        assert_eq!(&handle.data().data[0..4], &[10, 20, 30, 255]);
        assert_eq!(loader.load("tile").map(|h| h.id()), Some(handle.id()));

        std::fs::remove_dir_all(&dir).ok();
    }
}
