//! Themed icons: embedded Material SVGs, rasterized with resvg and tinted.
//!
//! Icons are looked up by [`IconKind`]. Rendered textures are cached per
//! `(kind, color)`; switching theme color drops the whole cache.

use std::collections::HashMap;
use std::hash::Hash;

use resvg::{tiny_skia, usvg};
use tracing::{debug, warn};

use lm_common::Rgba;

/// Rasterized edge length in pixels. Icons are drawn at half this size, so
/// they stay sharp at a device pixel ratio of 2.
pub const ICON_PIXELS: u32 = 48;

macro_rules! material_svg {
    ($path:literal) => {
        concat!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24" width="24" height="24">"##,
            r##"<path fill="#000000" d=""##,
            $path,
            r##""/></svg>"##
        )
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IconKind {
    Play,
    Pause,
    VolumeHigh,
    VolumeOff,
    Warning,
}

impl IconKind {
    #[cfg(test)]
    pub const ALL: [IconKind; 5] = [
        Self::Play,
        Self::Pause,
        Self::VolumeHigh,
        Self::VolumeOff,
        Self::Warning,
    ];

    fn svg(self) -> &'static str {
        match self {
            Self::Play => material_svg!("M8 5v14l11-7z"),
            Self::Pause => material_svg!("M6 19h4V5H6v14zm8-14v14h4V5h-4z"),
            Self::VolumeHigh => material_svg!(
                "M3 9v6h4l5 5V4L7 9H3zm13.5 3c0-1.77-1.02-3.29-2.5-4.03v8.05c1.48-.73 2.5-2.25 2.5-4.02zM14 3.23v2.06c2.89.86 5 3.54 5 6.71s-2.11 5.85-5 6.71v2.06c4.01-.91 7-4.49 7-8.77s-2.99-7.86-7-8.77z"
            ),
            Self::VolumeOff => material_svg!(
                "M16.5 12c0-1.77-1.02-3.29-2.5-4.03v2.21l2.45 2.45c.03-.2.05-.41.05-.63zm2.5 0c0 .94-.2 1.82-.54 2.64l1.51 1.51C20.63 14.91 21 13.5 21 12c0-4.28-2.99-7.86-7-8.77v2.06c2.89.86 5 3.54 5 6.71zM4.27 3L3 4.27 7.73 9H3v6h4l5 5v-6.73l4.25 4.25c-.67.52-1.42.93-2.25 1.18v2.06c1.38-.31 2.63-.95 3.69-1.81L19.73 21 21 19.73l-9-9L4.27 3zM12 4L9.91 6.09 12 8.18V4z"
            ),
            Self::Warning => material_svg!("M1 21h22L12 2 1 21zm12-3h-2v-2h2v2zm0-4h-2v-4h2v4z"),
        }
    }

    fn texture_name(self) -> &'static str {
        match self {
            Self::Play => "icon-play",
            Self::Pause => "icon-pause",
            Self::VolumeHigh => "icon-volume-high",
            Self::VolumeOff => "icon-volume-off",
            Self::Warning => "icon-warning",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IconError {
    #[error("failed to parse {kind:?} icon: {source}")]
    Parse {
        kind: IconKind,
        #[source]
        source: usvg::Error,
    },

    #[error("cannot allocate a {size}x{size} pixmap")]
    Pixmap { size: u32 },
}

/// A rasterized icon: premultiplied RGBA8, `size` x `size`.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedIcon {
    pub kind: IconKind,
    pub size: u32,
    pub pixels: Vec<u8>,
}

/// Rasterize `kind` at `size` pixels and tint it with `color`.
pub fn render_icon(kind: IconKind, color: Rgba, size: u32) -> Result<RenderedIcon, IconError> {
    let opts = usvg::Options::default();
    let tree = usvg::Tree::from_data(kind.svg().as_bytes(), &opts)
        .map_err(|source| IconError::Parse { kind, source })?;

    let mut pixmap = tiny_skia::Pixmap::new(size, size).ok_or(IconError::Pixmap { size })?;
    let sx = size as f32 / tree.size().width();
    let sy = size as f32 / tree.size().height();
    resvg::render(&tree, tiny_skia::Transform::from_scale(sx, sy), &mut pixmap.as_mut());

    let mut pixels = pixmap.take();
    tint_source_in(&mut pixels, color);
    Ok(RenderedIcon { kind, size, pixels })
}

/// Replace every pixel's color with `color`, keeping its coverage.
///
/// Works on premultiplied RGBA8. Equivalent to filling with `color` using
/// source-in compositing.
pub fn tint_source_in(pixels: &mut [u8], color: Rgba) {
    for px in pixels.chunks_exact_mut(4) {
        let coverage = px[3] as u32;
        let alpha = (coverage * color.a as u32 + 127) / 255;
        let premul = |c: u8| ((c as u32 * alpha + 127) / 255) as u8;
        px[0] = premul(color.r);
        px[1] = premul(color.g);
        px[2] = premul(color.b);
        px[3] = alpha as u8;
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// Map that builds missing values on demand and counts builds.
#[derive(Debug)]
pub struct KeyedCache<K, V> {
    entries: HashMap<K, V>,
    builds: usize,
}

impl<K: Eq + Hash, V> Default for KeyedCache<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            builds: 0,
        }
    }
}

impl<K: Eq + Hash, V> KeyedCache<K, V> {
    pub fn get_or_try_insert<E>(
        &mut self,
        key: K,
        build: impl FnOnce() -> Result<V, E>,
    ) -> Result<&V, E> {
        use std::collections::hash_map::Entry;
        match self.entries.entry(key) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let value = build()?;
                self.builds += 1;
                Ok(entry.insert(value))
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
impl<K: Eq + Hash, V> KeyedCache<K, V> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Total values built over the cache's lifetime.
    pub fn builds(&self) -> usize {
        self.builds
    }
}

/// Icon textures for the current theme color.
pub struct IconCache {
    ctx: egui::Context,
    color: Rgba,
    textures: KeyedCache<(IconKind, Rgba), egui::TextureHandle>,
}

impl IconCache {
    pub fn new(ctx: egui::Context, color: Rgba) -> Self {
        Self {
            ctx,
            color,
            textures: KeyedCache::default(),
        }
    }

    /// Switch the tint color. A different color invalidates every texture.
    pub fn set_color(&mut self, color: Rgba) {
        if color != self.color {
            debug!(from = %self.color.to_hex(), to = %color.to_hex(), "Icon color changed");
            self.color = color;
            self.textures.clear();
        }
    }

    /// Texture for `kind` in the current color. `None` if it failed to
    /// render, which is logged.
    pub fn icon(&mut self, kind: IconKind) -> Option<&egui::TextureHandle> {
        let color = self.color;
        let ctx = &self.ctx;
        let result = self.textures.get_or_try_insert((kind, color), || {
            let icon = render_icon(kind, color, ICON_PIXELS)?;
            let side = icon.size as usize;
            let image = egui::ColorImage::from_rgba_premultiplied([side, side], &icon.pixels);
            Ok::<_, IconError>(ctx.load_texture(icon.kind.texture_name(), image, egui::TextureOptions::LINEAR))
        });
        match result {
            Ok(texture) => Some(texture),
            Err(e) => {
                warn!(?kind, error = %e, "Icon unavailable");
                None
            }
        }
    }
}

#[cfg(test)]
impl IconCache {
    pub fn color(&self) -> Rgba {
        self.color
    }

    /// Textures rendered since startup.
    pub fn renders(&self) -> usize {
        self.textures.builds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_icon_parses_and_has_coverage() {
        for kind in IconKind::ALL {
            let icon = render_icon(kind, Rgba::WHITE, 24).unwrap();
            assert_eq!(icon.pixels.len(), 24 * 24 * 4);
            assert!(
                icon.pixels.chunks_exact(4).any(|px| px[3] == 255),
                "{kind:?} drew nothing"
            );
        }
    }

    #[test]
    fn tint_keeps_coverage_and_replaces_color() {
        // Opaque red, half-covered blue, empty.
        let mut pixels = vec![255, 0, 0, 255, 0, 0, 128, 128, 0, 0, 0, 0];
        tint_source_in(&mut pixels, Rgba::rgb(0x55, 0x55, 0x55));
        assert_eq!(&pixels[0..4], &[0x55, 0x55, 0x55, 255]);
        assert_eq!(&pixels[4..8], &[43, 43, 43, 128]);
        assert_eq!(&pixels[8..12], &[0, 0, 0, 0]);
    }

    #[test]
    fn rendered_icon_uses_tint_only() {
        let color = Rgba::rgb(0x1d, 0xe9, 0xb6);
        let icon = render_icon(IconKind::Play, color, 48).unwrap();
        let opaque = icon
            .pixels
            .chunks_exact(4)
            .find(|px| px[3] == 255)
            .unwrap();
        assert_eq!(opaque, &[0x1d, 0xe9, 0xb6, 255]);
    }

    #[test]
    fn keyed_cache_builds_once_per_key() {
        let mut cache: KeyedCache<(IconKind, Rgba), u32> = KeyedCache::default();
        let key = (IconKind::Play, Rgba::WHITE);
        for _ in 0..3 {
            let value = cache.get_or_try_insert(key, || Ok::<_, ()>(7)).unwrap();
            assert_eq!(*value, 7);
        }
        assert_eq!(cache.builds(), 1);

        let failed = cache.get_or_try_insert((IconKind::Pause, Rgba::WHITE), || Err("boom"));
        assert_eq!(failed, Err("boom"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn color_change_invalidates_textures() {
        let mut icons = IconCache::new(egui::Context::default(), Rgba::WHITE);
        assert!(icons.icon(IconKind::Play).is_some());
        assert!(icons.icon(IconKind::Play).is_some());
        assert_eq!(icons.renders(), 1);

        icons.set_color(Rgba::WHITE);
        assert!(icons.icon(IconKind::Play).is_some());
        assert_eq!(icons.renders(), 1);

        icons.set_color(Rgba::rgb(0x55, 0x55, 0x55));
        assert!(icons.icon(IconKind::Play).is_some());
        assert_eq!(icons.renders(), 2);
    }
}
