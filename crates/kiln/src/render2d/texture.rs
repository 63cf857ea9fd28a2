//! # Texture — Shared Handles and the Path Cache
//!
//! A [`Texture2D`] is an image living on the device. Components hold it as
//! `Rc<Texture2D>`: any number of sprites can share one texture, and the
//! device copy is released when the last holder lets go.
//!
//! ## Release Without a Device
//!
//! `Drop` can't reach the device, so a dropped texture pushes its handle onto
//! the owning renderer's reclaim queue. The renderer drains the queue at
//! `begin_scene`, `collect_garbage` and `dispose`.
//!
//! ```text
//! Rc<Texture2D> ──drop──► reclaim queue ──begin_scene──► device.release_texture
//!                          (Weak)
//! ```
//!
//! The texture only holds a `Weak` to the queue. If the renderer is already
//! gone the handle can't be released any more; that's a leak and gets logged.
//!
//! ## The Path Cache
//!
//! [`TextureCache`] memoizes `path → Rc<Texture2D>`, so two systems asking for
//! `"tiles.png"` in the same frame share a single device texture. The cache
//! itself keeps textures alive; [`TextureCache::evict_unused`] drops entries
//! nobody else references and [`TextureCache::clear`] drops them all.
//!
//! A path that fails to load is not an error for the caller: the cache logs a
//! warning and hands back the renderer's white texture. The failure is
//! remembered, so later requests for that path get the white texture without
//! touching the disk or logging again until [`TextureCache::clear`].
//!
//! The first texture cached under a path wins. [`TextureCache::insert`] on an
//! occupied path leaves the entry alone and returns the cached texture.
//!
//! ## Comparison
//!
//! - **Bevy** (`AssetServer`): ref-counted `Handle<Image>`, freed by a
//!   background sweep. Same idea, plus async loading.
//! - **Macroquad**: `Texture2D` handles are freed explicitly with `delete()`.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use thiserror::Error;

use super::device::{RenderDevice, TextureHandle};
use super::renderer::Renderer2D;

/// Handles of dropped textures waiting for the renderer to release them.
pub(crate) type ReclaimQueue = Rc<RefCell<Vec<TextureHandle>>>;

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("failed to load texture {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("texture size must be non-zero, got {width}x{height}")]
    ZeroSize { width: u32, height: u32 },
    #[error("{width}x{height} RGBA8 texture needs {expected} bytes, got {actual}")]
    DataSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Decode an image file into tightly packed RGBA8 pixels.
pub fn decode_rgba(path: &Path) -> Result<(u32, u32, Vec<u8>), TextureError> {
    let image = image::open(path)
        .map_err(|source| TextureError::Decode {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgba8();
    let (width, height) = image.dimensions();
    Ok((width, height, image.into_raw()))
}

/// Check that `rgba` holds exactly `width * height` RGBA8 pixels.
pub(crate) fn check_rgba(width: u32, height: u32, rgba: &[u8]) -> Result<(), TextureError> {
    if width == 0 || height == 0 {
        return Err(TextureError::ZeroSize { width, height });
    }
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        return Err(TextureError::DataSize {
            width,
            height,
            expected,
            actual: rgba.len(),
        });
    }
    Ok(())
}

/// A texture resident on the render device.
///
/// Identity is the device handle: two `Texture2D` values are equal only if
/// they name the same device texture.
pub struct Texture2D {
    handle: TextureHandle,
    width: u32,
    height: u32,
    path: Option<PathBuf>,
    reclaim: Weak<RefCell<Vec<TextureHandle>>>,
}

impl Texture2D {
    pub(crate) fn new(
        handle: TextureHandle,
        width: u32,
        height: u32,
        path: Option<PathBuf>,
        reclaim: &ReclaimQueue,
    ) -> Self {
        Self {
            handle,
            width,
            height,
            path,
            reclaim: Rc::downgrade(reclaim),
        }
    }

    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The file this texture was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl PartialEq for Texture2D {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for Texture2D {}

impl fmt::Debug for Texture2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture2D")
            .field("handle", &self.handle)
            .field("size", &(self.width, self.height))
            .field("path", &self.path)
            .finish()
    }
}

impl Drop for Texture2D {
    fn drop(&mut self) {
        match self.reclaim.upgrade() {
            Some(queue) => queue.borrow_mut().push(self.handle),
            None => log::warn!(
                "texture {:?} ({}) dropped after its renderer; device handle leaked",
                self.handle,
                self.path
                    .as_deref()
                    .map_or_else(|| "<memory>".to_owned(), |p| p.display().to_string())
            ),
        }
    }
}

/// Path-keyed cache of loaded textures.
#[derive(Debug, Default)]
pub struct TextureCache {
    entries: HashMap<PathBuf, Rc<Texture2D>>,
    failed: HashSet<PathBuf>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The texture for `path`, loading it on first request.
    ///
    /// Falls back to the renderer's white texture (with a warning) if the
    /// file can't be read or decoded. The failure is remembered and later
    /// calls for the same path return the white texture straight away.
    pub fn load<D: RenderDevice>(
        &mut self,
        renderer: &mut Renderer2D<D>,
        path: impl AsRef<Path>,
    ) -> Rc<Texture2D> {
        let path = path.as_ref();
        if let Some(texture) = self.entries.get(path) {
            return Rc::clone(texture);
        }
        if self.failed.contains(path) {
            return renderer.white_texture();
        }
        match renderer.load_texture(path) {
            Ok(texture) => {
                log::debug!(
                    "loaded texture {} ({}x{})",
                    path.display(),
                    texture.width(),
                    texture.height()
                );
                self.entries.insert(path.to_path_buf(), Rc::clone(&texture));
                texture
            }
            Err(err) => {
                log::warn!("{err}; using the white texture instead");
                self.failed.insert(path.to_path_buf());
                renderer.white_texture()
            }
        }
    }

    /// Cache an already created texture under `path` and return the texture
    /// now cached there. An existing entry is kept.
    pub fn insert(&mut self, path: impl Into<PathBuf>, texture: Rc<Texture2D>) -> Rc<Texture2D> {
        let path = path.into();
        self.failed.remove(&path);
        let cached = self.entries.entry(path).or_insert_with(|| Rc::clone(&texture));
        if !Rc::ptr_eq(cached, &texture) {
            log::debug!(
                "texture cache already holds {:?}; keeping it over {:?}",
                cached.handle(),
                texture.handle()
            );
        }
        Rc::clone(cached)
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<Rc<Texture2D>> {
        self.entries.get(path.as_ref()).cloned()
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.entries.contains_key(path.as_ref())
    }

    /// Whether loading `path` failed and the failure is being remembered.
    pub fn has_failed(&self, path: impl AsRef<Path>) -> bool {
        self.failed.contains(path.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry only the cache still references. Returns how many
    /// were evicted.
    pub fn evict_unused(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, texture| Rc::strong_count(texture) > 1);
        before - self.entries.len()
    }

    /// Drop every cache reference and forget past load failures.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.failed.clear();
    }
}
