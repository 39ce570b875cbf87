//! Watermark presence detection.
//!
//! The overlay is a translucent white mark: where present, it raises the
//! brightness of its footprint relative to the pixels around it. Detection
//! compares the alpha-weighted mean luminance inside the footprint against
//! the unweighted mean of two reference bands beside it.

use image::{Rgb, RgbImage};

use crate::mask::MaskAsset;

/// Brightness difference (0-255 luminance units) above which the footprint
/// is judged watermarked. Calibrated against the source compositor's
/// overlay opacity, not derived.
pub const DEFAULT_BRIGHTNESS_THRESHOLD: f32 = 10.0;

/// Mask pixels at or below this normalized alpha are ignored when sampling
/// the footprint (negligible coverage).
pub const COVERAGE_CUTOFF: f32 = 0.1;

/// Reference brightness when no reference pixels could be sampled, a
/// neutral midtone preserving the sign of the comparison.
const NEUTRAL_REFERENCE: f32 = 128.0;

/// Outcome of a presence check. Ephemeral, produced per call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionResult {
    /// Alpha-weighted mean luminance inside the footprint.
    pub watermark_brightness: f32,
    /// Mean luminance of the reference bands beside the footprint.
    pub reference_brightness: f32,
    /// `watermark_brightness - reference_brightness`.
    pub difference: f32,
    /// Whether the difference cleared the threshold.
    pub present: bool,
}

impl DetectionResult {
    /// The result reported when the footprint does not fit the image.
    #[must_use]
    pub fn absent() -> Self {
        Self {
            watermark_brightness: 0.0,
            reference_brightness: 0.0,
            difference: 0.0,
            present: false,
        }
    }
}

fn luminance(px: &Rgb<u8>) -> f32 {
    0.299 * f32::from(px[0]) + 0.587 * f32::from(px[1]) + 0.114 * f32::from(px[2])
}

/// Decide whether the mask's footprint in `image` plausibly contains the
/// watermark.
///
/// The footprint anchors at the bottom-right corner, inset by the mask's
/// margin on both axes. If it does not fit there, the watermark is
/// reported absent without further computation; callers fall back to
/// manual mode.
///
/// Reference brightness samples two disjoint bands of width
/// `min(mask_width, mask_height)` immediately left of and above the
/// footprint, clipped to image bounds.
#[must_use]
pub fn detect(image: &RgbImage, mask: &MaskAsset, threshold: f32) -> DetectionResult {
    let Some((off_x, off_y)) = mask.anchor_in(image.width(), image.height()) else {
        return DetectionResult::absent();
    };

    let mut footprint_sum = 0.0_f32;
    let mut footprint_weight = 0.0_f32;
    for my in 0..mask.height() {
        for mx in 0..mask.width() {
            let alpha = mask.alpha_at(mx, my);
            if alpha > COVERAGE_CUTOFF {
                footprint_sum += luminance(image.get_pixel(off_x + mx, off_y + my)) * alpha;
                footprint_weight += alpha;
            }
        }
    }

    let band = mask.width().min(mask.height());
    let mut reference_sum = 0.0_f32;
    let mut reference_count = 0_u32;

    // Band to the left of the footprint.
    for y in off_y..(off_y + mask.height()).min(image.height()) {
        for x in off_x.saturating_sub(band)..off_x {
            reference_sum += luminance(image.get_pixel(x, y));
            reference_count += 1;
        }
    }
    // Band above the footprint.
    for y in off_y.saturating_sub(band)..off_y {
        for x in off_x..(off_x + mask.width()).min(image.width()) {
            reference_sum += luminance(image.get_pixel(x, y));
            reference_count += 1;
        }
    }

    let watermark_brightness = if footprint_weight > 0.0 {
        footprint_sum / footprint_weight
    } else {
        0.0
    };
    #[allow(clippy::cast_precision_loss)]
    let reference_brightness = if reference_count > 0 {
        reference_sum / reference_count as f32
    } else {
        NEUTRAL_REFERENCE
    };

    let difference = watermark_brightness - reference_brightness;
    DetectionResult {
        watermark_brightness,
        reference_brightness,
        difference,
        present: difference > threshold,
    }
}
