//! Error types for the stencil-watermark-removal crate.

/// Errors that can occur during mask loading and image processing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to decode a mask stencil bitmap.
    #[error("failed to decode mask stencil: {0}")]
    MaskDecode(image::ImageError),

    /// Manual-repair buffers do not share dimensions.
    #[error(
        "buffer dimensions differ: image is {image_width}x{image_height}, \
         {role} is {other_width}x{other_height}"
    )]
    BufferMismatch {
        /// Width of the image being repaired.
        image_width: u32,
        /// Height of the image being repaired.
        image_height: u32,
        /// Which companion buffer mismatched ("original" or "overlay").
        role: &'static str,
        /// Width of the mismatched buffer.
        other_width: u32,
        /// Height of the mismatched buffer.
        other_height: u32,
    },

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred during image processing (load, save, encode).
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
