//! Core watermark removal engine.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::{DynamicImage, ImageFormat, RgbImage};
use rand::Rng;

use crate::blending::{self, UnblendStats, DEFAULT_INTENSITY};
use crate::detection::{self, DetectionResult, DEFAULT_BRIGHTNESS_THRESHOLD};
use crate::error::{Error, Result};
use crate::events::{EngineEvent, EventSink, NullSink};
use crate::inpaint::{self, RepairOptions, RepairStats};
use crate::mask::{MaskAsset, MaskConfig};
use crate::repository::{LoadFailure, MaskRepository};

/// Options controlling watermark processing behavior.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Skip presence detection, unblend unconditionally.
    pub force: bool,
    /// Brightness-difference detection threshold, in 0-255 luminance units.
    pub threshold: f32,
    /// Stencil intensity multiplier for unblending.
    pub intensity: f32,
    /// Force a nominal stencil size instead of rule-based selection.
    pub force_size: Option<u32>,
    /// Manual-repair tunables.
    pub repair: RepairOptions,
    /// Cooperative cancellation flag, checked between images in a batch.
    /// Once an image's unblend begins it runs to completion.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            force: false,
            threshold: DEFAULT_BRIGHTNESS_THRESHOLD,
            intensity: DEFAULT_INTENSITY,
            force_size: None,
            repair: RepairOptions::default(),
            cancel: None,
        }
    }
}

impl ProcessOptions {
    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// Result of processing a single image file.
#[derive(Debug)]
pub struct ProcessResult {
    /// Path of the processed file.
    pub path: PathBuf,
    /// Whether processing succeeded.
    pub success: bool,
    /// Whether the file was skipped (no mask, no watermark, cancelled).
    pub skipped: bool,
    /// Measured brightness difference, when detection ran.
    pub difference: Option<f32>,
    /// Human-readable status message.
    pub message: String,
}

impl ProcessResult {
    fn failure(path: &Path, message: String) -> Self {
        Self {
            path: path.to_path_buf(),
            success: false,
            skipped: false,
            difference: None,
            message,
        }
    }

    fn skip(path: &Path, message: String) -> Self {
        Self {
            path: path.to_path_buf(),
            success: true,
            skipped: true,
            difference: None,
            message,
        }
    }
}

/// The watermark engine holding the loaded mask repository.
///
/// Create once and reuse across images; the repository is immutable and
/// every per-image operation works on a buffer the caller owns.
pub struct WatermarkEngine {
    repository: MaskRepository,
    sink: Box<dyn EventSink>,
}

impl WatermarkEngine {
    /// Build an engine over an already-loaded repository.
    #[must_use]
    pub fn with_repository(repository: MaskRepository) -> Self {
        Self {
            repository,
            sink: Box::new(NullSink),
        }
    }

    /// Load every configured mask variant and build an engine.
    ///
    /// Never fails outright: per-variant failures are returned alongside
    /// the engine, and an empty repository leaves only manual mode working.
    #[must_use]
    pub fn load(configs: &[MaskConfig]) -> (Self, Vec<LoadFailure>) {
        let (repository, failures) = MaskRepository::load(configs);
        (Self::with_repository(repository), failures)
    }

    /// Redirect engine events to `sink` (a closure works).
    #[must_use]
    pub fn with_event_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// The loaded mask repository.
    #[must_use]
    pub fn repository(&self) -> &MaskRepository {
        &self.repository
    }

    fn emit(&self, event: EngineEvent) {
        self.sink.on_event(&event);
    }

    /// Pick the stencil variant for an image of the given size, honoring
    /// `force_size`. `None` routes the caller to manual mode.
    #[must_use]
    pub fn select_for(&self, width: u32, height: u32, opts: &ProcessOptions) -> Option<&MaskAsset> {
        let nominal_size = opts
            .force_size
            .unwrap_or_else(|| self.repository.nominal_size_for(width, height));
        let mask = self.repository.get(nominal_size);
        self.emit(EngineEvent::MaskSelected {
            nominal_size,
            found: mask.is_some(),
        });
        mask
    }

    /// Detect the watermark in an image.
    ///
    /// `None` means no stencil variant is available for this size class.
    #[must_use]
    pub fn detect(&self, image: &RgbImage, opts: &ProcessOptions) -> Option<DetectionResult> {
        let mask = self.select_for(image.width(), image.height(), opts)?;
        let result = detection::detect(image, mask, opts.threshold);
        self.emit(EngineEvent::Detection(result));
        Some(result)
    }

    /// Remove the watermark from an image in place.
    ///
    /// `None` means no stencil variant is available for this size class;
    /// the buffer is untouched in that case.
    pub fn remove(&self, image: &mut RgbImage, opts: &ProcessOptions) -> Option<UnblendStats> {
        let mask = self.select_for(image.width(), image.height(), opts)?;
        let stats = blending::unblend(image, mask, opts.intensity);
        self.emit(EngineEvent::Unblend(stats));
        Some(stats)
    }

    /// Manually repair a painted region, sampling donors with a thread-local
    /// RNG. See [`WatermarkEngine::manual_repair_with_rng`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferMismatch`] when the buffers disagree in size.
    pub fn manual_repair(
        &self,
        image: &mut RgbImage,
        original: &RgbImage,
        overlay: &RgbImage,
        opts: &ProcessOptions,
    ) -> Result<RepairStats> {
        self.manual_repair_with_rng(image, original, overlay, &mut rand::thread_rng(), opts)
    }

    /// Manually repair a painted region with a caller-supplied RNG, which
    /// makes the displacement choices reproducible.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferMismatch`] when the buffers disagree in size.
    pub fn manual_repair_with_rng<R: Rng>(
        &self,
        image: &mut RgbImage,
        original: &RgbImage,
        overlay: &RgbImage,
        rng: &mut R,
        opts: &ProcessOptions,
    ) -> Result<RepairStats> {
        let stats = inpaint::repair(image, original, overlay, rng, &opts.repair)?;
        self.emit(EngineEvent::Repair(stats));
        Ok(stats)
    }

    /// Process a single image file: load, select, detect, unblend, save.
    ///
    /// Returns a [`ProcessResult`] indicating success, skip, or failure;
    /// nothing here is fatal to sibling images in a batch.
    #[must_use]
    pub fn process_file(&self, input: &Path, output: &Path, opts: &ProcessOptions) -> ProcessResult {
        let dyn_img = match image::open(input) {
            Ok(img) => img,
            Err(e) => return ProcessResult::failure(input, format!("failed to load: {e}")),
        };
        let mut rgb_img = dyn_img.to_rgb8();
        let (w, h) = rgb_img.dimensions();

        let Some(mask) = self.select_for(w, h, opts) else {
            return ProcessResult::skip(
                input,
                "no stencil variant loaded for this size class, manual mode only".to_string(),
            );
        };

        if mask.anchor_in(w, h).is_none() {
            return ProcessResult::skip(
                input,
                format!(
                    "image too small ({w}x{h}) for {}x{} footprint plus {}px margin",
                    mask.width(),
                    mask.height(),
                    mask.margin()
                ),
            );
        }

        let mut difference = None;
        if !opts.force {
            let detected = detection::detect(&rgb_img, mask, opts.threshold);
            self.emit(EngineEvent::Detection(detected));
            difference = Some(detected.difference);

            if !detected.present {
                let mut result = ProcessResult::skip(
                    input,
                    format!(
                        "no watermark detected (footprint {:.1}, surroundings {:.1}, difference {:.1})",
                        detected.watermark_brightness,
                        detected.reference_brightness,
                        detected.difference,
                    ),
                );
                result.difference = difference;
                return result;
            }
        }

        let stats = blending::unblend(&mut rgb_img, mask, opts.intensity);
        self.emit(EngineEvent::Unblend(stats));

        if let Some(parent) = output.parent() {
            if !parent.exists() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    return ProcessResult::failure(
                        input,
                        format!("failed to create output directory: {e}"),
                    );
                }
            }
        }

        match save_image(&rgb_img, output) {
            Ok(()) => ProcessResult {
                path: input.to_path_buf(),
                success: true,
                skipped: false,
                difference,
                message: format!(
                    "watermark removed ({} px reconstructed, {} unrecoverable)",
                    stats.processed, stats.unrecoverable
                ),
            },
            Err(e) => ProcessResult::failure(input, format!("failed to save: {e}")),
        }
    }

    /// Manually repair a single image file from a painted overlay file.
    ///
    /// The overlay is a copy of the image with the watermark region painted
    /// in the red marker color; it must match the image's dimensions.
    #[must_use]
    pub fn repair_file(
        &self,
        input: &Path,
        overlay: &Path,
        output: &Path,
        opts: &ProcessOptions,
    ) -> ProcessResult {
        let original = match image::open(input) {
            Ok(img) => img.to_rgb8(),
            Err(e) => return ProcessResult::failure(input, format!("failed to load: {e}")),
        };
        let overlay_img = match image::open(overlay) {
            Ok(img) => img.to_rgb8(),
            Err(e) => return ProcessResult::failure(input, format!("failed to load overlay: {e}")),
        };

        let mut repaired = original.clone();
        let stats = match self.manual_repair(&mut repaired, &original, &overlay_img, opts) {
            Ok(stats) => stats,
            Err(e) => return ProcessResult::failure(input, e.to_string()),
        };

        match save_image(&repaired, output) {
            Ok(()) => ProcessResult {
                path: input.to_path_buf(),
                success: true,
                skipped: false,
                difference: None,
                message: format!(
                    "manually repaired ({} of {} marked pixels rewritten)",
                    stats.copied, stats.marked
                ),
            },
            Err(e) => ProcessResult::failure(input, format!("failed to save: {e}")),
        }
    }

    /// Process all supported images in a directory.
    ///
    /// Uses parallel iteration when the `cli` feature is enabled (via
    /// rayon). Honors the options' cancellation flag between images:
    /// images reached after the flag is set are reported as skipped.
    ///
    /// # Panics
    ///
    /// Panics if a directory entry has no filename (not possible for
    /// regular files).
    #[must_use]
    pub fn process_directory(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        opts: &ProcessOptions,
    ) -> Vec<ProcessResult> {
        let entries: Vec<_> = match std::fs::read_dir(input_dir) {
            Ok(rd) => rd
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
                .filter(|e| is_supported_image(e.path().as_path()))
                .collect(),
            Err(e) => {
                return vec![ProcessResult::failure(
                    input_dir,
                    format!("failed to read directory: {e}"),
                )];
            }
        };

        if !output_dir.exists() {
            if let Err(e) = std::fs::create_dir_all(output_dir) {
                return vec![ProcessResult::failure(
                    output_dir,
                    format!("failed to create output directory: {e}"),
                )];
            }
        }

        let process_one = |entry: &std::fs::DirEntry| {
            let input_path = entry.path();
            if opts.is_cancelled() {
                let mut result =
                    ProcessResult::skip(&input_path, "cancelled before processing".to_string());
                result.success = false;
                return result;
            }
            let filename = input_path.file_name().unwrap();
            let output_path = output_dir.join(filename);
            self.process_file(&input_path, &output_path, opts)
        };

        #[cfg(feature = "cli")]
        {
            use rayon::prelude::*;
            entries.par_iter().map(process_one).collect()
        }

        #[cfg(not(feature = "cli"))]
        {
            entries.iter().map(process_one).collect()
        }
    }
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp"
        ),
        None => false,
    }
}

/// Save an RGB image with format-specific quality settings.
///
/// # Errors
///
/// Returns an error if the format is unsupported or writing fails.
pub fn save_image(img: &RgbImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    let dyn_img = DynamicImage::ImageRgb8(img.clone());

    match format {
        ImageFormat::Jpeg => {
            let file = std::fs::File::create(path)?;
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, 100);
            encoder.encode_image(&dyn_img)?;
        }
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp => {
            dyn_img.save(path)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}

/// Generate a default output path from an input path.
///
/// Example: `"photo.jpg"` becomes `"photo_cleaned.jpg"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext = input.extension().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_cleaned.{ext}"))
}
