//! RGBA textures addressed by opaque handles.
//!
//! A handle is reserved before its image arrives; until the slot is filled
//! the renderer falls back to flat colours.

use crate::error::{Error, Result};

/// Red overlay applied to the hit variant of a sprite.
pub const HIT_TINT: [u8; 3] = [255, 0, 0];
pub const HIT_TINT_ALPHA: f32 = 0.6;

#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    width: u32,
    height: u32,
    /// Row-major RGBA8.
    pixels: Vec<u8>,
}

impl Texture {
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 {
            return Err(Error::Texture(format!("empty texture {}x{}", width, height)));
        }
        if pixels.len() != expected {
            return Err(Error::Texture(format!(
                "expected {} bytes for {}x{}, got {}",
                expected,
                width,
                height,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Single-colour texture, handy for placeholders and tests.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    #[inline(always)]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline(always)]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Width over height.
    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// `None` for coordinates outside the image; callers treat that as a
    /// failed draw and substitute a flat colour.
    #[inline(always)]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ])
    }

    /// Paints `rgb` at `alpha` over every non-transparent pixel, keeping the
    /// original alpha channel (a `source-atop` fill).
    pub fn tinted(&self, rgb: [u8; 3], alpha: f32) -> Texture {
        let mut pixels = self.pixels.clone();
        for px in pixels.chunks_exact_mut(4) {
            if px[3] == 0 {
                continue;
            }
            for c in 0..3 {
                let base = px[c] as f32;
                px[c] = (base * (1.0 - alpha) + rgb[c] as f32 * alpha).round() as u8;
            }
        }
        Texture {
            width: self.width,
            height: self.height,
            pixels,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(usize);

/// Base sprite plus its precomputed damage variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpriteSkin {
    pub base: TextureHandle,
    pub hit: TextureHandle,
}

#[derive(Default)]
pub struct TextureStore {
    slots: Vec<Option<Texture>>,
}

impl TextureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves an empty slot to be filled once the image decodes.
    pub fn reserve(&mut self) -> TextureHandle {
        self.slots.push(None);
        TextureHandle(self.slots.len() - 1)
    }

    pub fn insert(&mut self, texture: Texture) -> TextureHandle {
        self.slots.push(Some(texture));
        TextureHandle(self.slots.len() - 1)
    }

    pub fn fulfill(&mut self, handle: TextureHandle, texture: Texture) {
        if let Some(slot) = self.slots.get_mut(handle.0) {
            *slot = Some(texture);
        }
    }

    pub fn reserve_skin(&mut self) -> SpriteSkin {
        SpriteSkin {
            base: self.reserve(),
            hit: self.reserve(),
        }
    }

    /// Fills both halves of a skin from one decoded image.
    pub fn fulfill_skin(&mut self, skin: SpriteSkin, texture: Texture) {
        let hit = texture.tinted(HIT_TINT, HIT_TINT_ALPHA);
        self.fulfill(skin.hit, hit);
        self.fulfill(skin.base, texture);
    }

    #[inline(always)]
    pub fn get(&self, handle: TextureHandle) -> Option<&Texture> {
        self.slots.get(handle.0).and_then(|s| s.as_ref())
    }

    pub fn is_loaded(&self, handle: TextureHandle) -> bool {
        self.get(handle).is_some()
    }

    /// A wall set is drawn only once every image in it is ready.
    pub fn all_loaded(&self, handles: &[TextureHandle]) -> bool {
        !handles.is_empty() && handles.iter().all(|h| self.is_loaded(*h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgba_validates_size() {
        assert!(Texture::from_rgba(2, 2, vec![0; 16]).is_ok());
        assert!(Texture::from_rgba(2, 2, vec![0; 15]).is_err());
        assert!(Texture::from_rgba(0, 2, vec![]).is_err());
    }

    #[test]
    fn test_pixel_bounds() {
        let tex = Texture::solid(4, 2, [1, 2, 3, 255]);
        assert_eq!(tex.pixel(3, 1), Some([1, 2, 3, 255]));
        assert_eq!(tex.pixel(4, 0), None);
        assert_eq!(tex.pixel(0, 2), None);
        assert_eq!(tex.aspect(), 2.0);
    }

    #[test]
    fn test_tint_keeps_alpha_and_skips_transparent() {
        let tex = Texture::from_rgba(2, 1, vec![100, 100, 100, 255, 50, 50, 50, 0]).unwrap();
        let hit = tex.tinted(HIT_TINT, HIT_TINT_ALPHA);
        assert_eq!(hit.pixel(0, 0), Some([193, 40, 40, 255]));
        assert_eq!(hit.pixel(1, 0), Some([50, 50, 50, 0]));
    }

    #[test]
    fn test_store_loaded_flags() {
        let mut store = TextureStore::new();
        let a = store.reserve();
        let b = store.reserve();
        assert!(!store.is_loaded(a));
        assert!(!store.all_loaded(&[a, b]));
        assert!(!store.all_loaded(&[]));
        store.fulfill(a, Texture::solid(1, 1, [0, 0, 0, 255]));
        assert!(store.is_loaded(a));
        assert!(!store.all_loaded(&[a, b]));
        store.fulfill(b, Texture::solid(1, 1, [0, 0, 0, 255]));
        assert!(store.all_loaded(&[a, b]));
    }

    #[test]
    fn test_fulfill_skin_builds_hit_variant() {
        let mut store = TextureStore::new();
        let skin = store.reserve_skin();
        store.fulfill_skin(skin, Texture::solid(2, 2, [0, 0, 255, 255]));
        let hit = store.get(skin.hit).unwrap();
        assert_eq!(hit.pixel(0, 0), Some([153, 0, 102, 255]));
        assert_eq!(store.get(skin.base).unwrap().pixel(0, 0), Some([0, 0, 255, 255]));
    }
}
