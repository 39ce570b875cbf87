//! Remove a fixed, known watermark overlay from photographs.
//!
//! The overlay is composited through a known, spatially fixed transparency
//! pattern ("mask") anchored near the image's bottom-right corner. With the
//! per-pixel blend weight and the overlay color known, the pre-watermark
//! pixels are recovered by inverting the alpha-composite equation. A manual
//! fallback reconstructs a user-painted region by neighbor displacement
//! when the automatic path is unavailable or declined.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use stencil_watermark_removal::mask::MaskConfig;
//! use stencil_watermark_removal::{ProcessOptions, WatermarkEngine};
//!
//! let configs = MaskConfig::reference_set(Path::new("assets"));
//! let (engine, failures) = WatermarkEngine::load(&configs);
//! for f in &failures {
//!     eprintln!("mask {} unavailable: {}", f.nominal_size, f.error);
//! }
//!
//! let mut img = image::open("photo.jpg").unwrap().to_rgb8();
//! let opts = ProcessOptions::default();
//! if engine.detect(&img, &opts).is_some_and(|d| d.present) {
//!     engine.remove(&mut img, &opts);
//!     img.save("cleaned.jpg").unwrap();
//! }
//! ```
//!
//! # Manual fallback
//!
//! When no stencil variant loaded, the footprint does not fit, or
//! detection misses, paint the watermark region with a red marker on a
//! copy of the image and hand all three buffers to
//! [`WatermarkEngine::manual_repair`].

#![deny(missing_docs)]

pub mod blending;
pub mod detection;
mod engine;
pub mod error;
pub mod events;
pub mod inpaint;
pub mod mask;
pub mod repository;

pub use engine::{
    default_output_path, is_supported_image, save_image, ProcessOptions, ProcessResult,
    WatermarkEngine,
};
pub use error::{Error, Result};
