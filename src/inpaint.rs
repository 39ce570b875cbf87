//! Manual repair: reconstruct a user-painted region by neighbor sampling.
//!
//! When no stencil matches, detection misses, or the automatic result is
//! declined, the user paints the suspected watermark with a red marker on
//! an overlay copy of the image. Every marked pixel is rewritten from the
//! untouched original at a small random horizontal displacement, a
//! deliberately simple texture fill that avoids directional banding
//! without inspecting gradients.

use image::{Rgb, RgbImage};
use rand::Rng;

use crate::error::{Error, Result};

/// Red must exceed both green and blue by this much for an overlay pixel
/// to count as marked. Coarse color keying, not a precise mask.
pub const DEFAULT_RED_DOMINANCE: u8 = 20;

/// Horizontal displacement, in pixels, of the donor sample.
pub const DEFAULT_SAMPLE_OFFSET: u32 = 20;

/// Tunables for a repair pass.
#[derive(Debug, Clone, Copy)]
pub struct RepairOptions {
    /// Marker color-key margin over green and blue.
    pub red_dominance: u8,
    /// Donor sample displacement in pixels.
    pub sample_offset: u32,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            red_dominance: DEFAULT_RED_DOMINANCE,
            sample_offset: DEFAULT_SAMPLE_OFFSET,
        }
    }
}

/// Accounting for one repair pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairStats {
    /// Pixels whose overlay color passed the marker test.
    pub marked: u64,
    /// Marked pixels rewritten from the original buffer. The rest had
    /// their donor column fall outside the image and were left alone.
    pub copied: u64,
}

/// Whether an overlay pixel carries the red marker.
#[must_use]
pub fn is_marked(px: &Rgb<u8>, red_dominance: u8) -> bool {
    let r = i16::from(px[0]);
    let g = i16::from(px[1]);
    let b = i16::from(px[2]);
    let margin = i16::from(red_dominance);
    r > g + margin && r > b + margin
}

/// Rewrite every marked pixel of `image` from `original`.
///
/// For each overlay pixel passing the marker test, a donor column at
/// +/- `sample_offset` (chosen per pixel by `rng`) in the same row of the
/// *untouched original* supplies the replacement RGB. Donor columns
/// outside the image leave the pixel unmodified. Unmarked pixels are
/// never written.
///
/// # Errors
///
/// Returns [`Error::BufferMismatch`] if `original` or `overlay` does not
/// share `image`'s dimensions.
pub fn repair<R: Rng>(
    image: &mut RgbImage,
    original: &RgbImage,
    overlay: &RgbImage,
    rng: &mut R,
    options: &RepairOptions,
) -> Result<RepairStats> {
    check_dimensions(image, original, "original")?;
    check_dimensions(image, overlay, "overlay")?;

    let width = i64::from(image.width());
    let offset = i64::from(options.sample_offset);
    let mut stats = RepairStats::default();

    for y in 0..image.height() {
        for x in 0..image.width() {
            if !is_marked(overlay.get_pixel(x, y), options.red_dominance) {
                continue;
            }
            stats.marked += 1;

            let donor_x = i64::from(x) + if rng.gen::<bool>() { offset } else { -offset };
            if donor_x < 0 || donor_x >= width {
                continue;
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let donor = *original.get_pixel(donor_x as u32, y);
            *image.get_pixel_mut(x, y) = donor;
            stats.copied += 1;
        }
    }

    Ok(stats)
}

fn check_dimensions(image: &RgbImage, other: &RgbImage, role: &'static str) -> Result<()> {
    if image.dimensions() == other.dimensions() {
        Ok(())
    } else {
        Err(Error::BufferMismatch {
            image_width: image.width(),
            image_height: image.height(),
            role,
            other_width: other.width(),
            other_height: other.height(),
        })
    }
}
