//! Reverse alpha compositing.
//!
//! The compositor produced each visible pixel as
//! `composite = original * (1 - alpha) + color * alpha`. With the overlay
//! color and per-pixel alpha known from the mask asset, the original is
//! `(composite - color * alpha) / (1 - alpha)`.

use image::RgbImage;

use crate::mask::{MaskAsset, WATERMARK_COLOR};

/// Default stencil intensity multiplier. Raise it when removal leaves
/// traces, lower it when removal overshoots.
pub const DEFAULT_INTENSITY: f32 = 1.0;

/// Blend weights below this leave the pixel untouched (negligible coverage).
pub const MIN_ALPHA: f32 = 0.01;

/// Blend weights above this cannot be inverted without information loss;
/// the pixel is left untouched and counted as unrecoverable.
pub const MAX_ALPHA: f32 = 0.99;

/// Per-pixel accounting for one unblend pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnblendStats {
    /// Pixels rewritten with reconstructed values.
    pub processed: u64,
    /// Pixels skipped for negligible coverage.
    pub skipped_low_alpha: u64,
    /// Fully opaque pixels left untouched.
    pub unrecoverable: u64,
}

/// Invert the composite under the mask footprint, in place.
///
/// `intensity` scales the stencil's blend weights before inversion,
/// compensating for slight mis-calibration of the luminance-to-alpha
/// mapping; see [`DEFAULT_INTENSITY`].
///
/// Mask pixels mapping outside the canvas are skipped individually, so a
/// footprint partially off-canvas is not an error. Pixels strictly outside
/// the footprint are never written.
pub fn unblend(image: &mut RgbImage, mask: &MaskAsset, intensity: f32) -> UnblendStats {
    let mut stats = UnblendStats::default();
    let img_w = i64::from(image.width());
    let img_h = i64::from(image.height());
    let (off_x, off_y) = mask.signed_anchor_in(image.width(), image.height());

    for my in 0..mask.height() {
        for mx in 0..mask.width() {
            let ix = off_x + i64::from(mx);
            let iy = off_y + i64::from(my);
            if ix < 0 || iy < 0 || ix >= img_w || iy >= img_h {
                continue;
            }

            let alpha = (mask.alpha_at(mx, my) * intensity).clamp(0.0, 1.0);
            if alpha < MIN_ALPHA {
                stats.skipped_low_alpha += 1;
                continue;
            }
            if alpha > MAX_ALPHA {
                stats.unrecoverable += 1;
                continue;
            }
            let inv_alpha = 1.0 - alpha;

            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let px = image.get_pixel_mut(ix as u32, iy as u32);
            for ch in 0..3 {
                let composite = f32::from(px[ch]);
                let original = (composite - WATERMARK_COLOR * alpha) / inv_alpha;
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                {
                    px[ch] = original.round().clamp(0.0, 255.0) as u8;
                }
            }
            stats.processed += 1;
        }
    }

    stats
}
