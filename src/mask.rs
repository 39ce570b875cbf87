//! Mask assets: preprocessed stencils encoding per-pixel blend weight.
//!
//! The compositor that applies the watermark renders a fixed white glyph
//! through a known transparency pattern. That pattern is shipped as a
//! "black background, white glyph" stencil bitmap; brightness encodes
//! coverage. Preprocessing reinterprets the stencil as an alpha mask with
//! a constant white color channel.

use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::error::{Error, Result};

/// The overlay color every stencil encodes (white), per channel.
pub const WATERMARK_COLOR: f32 = 255.0;

/// Where a stencil's encoded bytes come from.
#[derive(Debug, Clone)]
pub enum MaskSource {
    /// Raster bytes already in memory (PNG, BMP, ...).
    Bytes(Vec<u8>),
    /// Path to a raster file on disk.
    Path(PathBuf),
}

/// Configuration for one mask variant.
#[derive(Debug, Clone)]
pub struct MaskConfig {
    /// Nominal watermark size this stencil matches; also the repository key.
    pub nominal_size: u32,
    /// Stencil bitmap source (black background, white glyph).
    pub source: MaskSource,
    /// Offset from the image's bottom-right corner to the footprint corner.
    pub margin: u32,
}

impl MaskConfig {
    /// The reference deployment: a 96px stencil with 64px margin and a
    /// 48px stencil with 32px margin, loaded from `dir`.
    #[must_use]
    pub fn reference_set(dir: &Path) -> Vec<MaskConfig> {
        vec![
            MaskConfig {
                nominal_size: 96,
                source: MaskSource::Path(dir.join("mask_96.png")),
                margin: 64,
            },
            MaskConfig {
                nominal_size: 48,
                source: MaskSource::Path(dir.join("mask_48.png")),
                margin: 32,
            },
        ]
    }
}

/// A preprocessed stencil: per-pixel blend weight for one footprint size.
///
/// Built once at repository initialization and shared read-only; detection
/// and unblending never mutate it.
#[derive(Debug, Clone)]
pub struct MaskAsset {
    width: u32,
    height: u32,
    margin: u32,
    alpha: Vec<u8>,
}

/// Integer Rec. 601 luminance, rounded to nearest.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn luminance_u8(r: u8, g: u8, b: u8) -> u8 {
    let lum = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
    lum.round().clamp(0.0, 255.0) as u8
}

impl MaskAsset {
    /// Build an asset from a decoded stencil bitmap.
    ///
    /// Every pixel's luminance becomes its blend weight; the color channel
    /// is the fixed white of [`WATERMARK_COLOR`]. Output dimensions equal
    /// the stencil's exactly, no resampling.
    #[must_use]
    pub fn from_stencil(stencil: &RgbImage, margin: u32) -> Self {
        let alpha = stencil
            .pixels()
            .map(|px| luminance_u8(px[0], px[1], px[2]))
            .collect();

        Self {
            width: stencil.width(),
            height: stencil.height(),
            margin,
            alpha,
        }
    }

    /// Decode stencil bytes, then preprocess as [`MaskAsset::from_stencil`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::MaskDecode`] if the bytes are not a decodable raster.
    pub fn from_bytes(bytes: &[u8], margin: u32) -> Result<Self> {
        let stencil = image::load_from_memory(bytes)
            .map_err(Error::MaskDecode)?
            .to_rgb8();
        Ok(Self::from_stencil(&stencil, margin))
    }

    /// Stencil width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Stencil height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Offset from the image's bottom-right corner to the footprint corner.
    #[must_use]
    pub fn margin(&self) -> u32 {
        self.margin
    }

    /// Normalized blend weight in `[0, 1]` at mask coordinates.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` lies outside the stencil.
    #[must_use]
    pub fn alpha_at(&self, x: u32, y: u32) -> f32 {
        assert!(x < self.width && y < self.height, "mask index out of range");
        f32::from(self.alpha[(y * self.width + x) as usize]) / 255.0
    }

    /// Top-left corner of the footprint within an image of the given size,
    /// or `None` when the footprint does not fit at the anchored position.
    #[must_use]
    pub fn anchor_in(&self, image_width: u32, image_height: u32) -> Option<(u32, u32)> {
        let x = image_width.checked_sub(self.width + self.margin)?;
        let y = image_height.checked_sub(self.height + self.margin)?;
        Some((x, y))
    }

    /// Footprint corner as signed offsets; negative when partially off-canvas.
    #[must_use]
    pub fn signed_anchor_in(&self, image_width: u32, image_height: u32) -> (i64, i64) {
        let x = i64::from(image_width) - i64::from(self.width) - i64::from(self.margin);
        let y = i64::from(image_height) - i64::from(self.height) - i64::from(self.margin);
        (x, y)
    }

    /// Fraction of stencil pixels carrying non-negligible coverage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn coverage(&self) -> f32 {
        if self.alpha.is_empty() {
            return 0.0;
        }
        let covered = self.alpha.iter().filter(|&&a| a > 25).count();
        covered as f32 / self.alpha.len() as f32
    }
}
