use std::path::PathBuf;

use thiserror::Error;

/// Library error type for carousel setup and asset preparation.
///
/// Every variant is fatal at startup: the viewer never opens a render loop
/// once one of these has been raised.
#[derive(Debug, Error)]
pub enum CarouselError {
    /// The carousel needs at least two images to rotate through.
    #[error("carousel needs at least 2 images, found {count}")]
    TooFewImages { count: usize },

    /// Labels are optional, but when present there must be one per image.
    #[error("{labels} labels configured for {images} images")]
    LabelCountMismatch { labels: usize, images: usize },

    /// Per-image background colours must line up with the image list.
    #[error("{backgrounds} background colours configured for {images} images")]
    BackgroundCountMismatch { backgrounds: usize, images: usize },

    /// A colour string could not be parsed as `#rrggbb` / `#rrggbbaa`.
    #[error("invalid colour {value:?}")]
    InvalidColor { value: String },

    /// The loader handed over a different number of images than configured.
    #[error("expected {expected} loaded images, received {received}")]
    ImageCountMismatch { expected: usize, received: usize },

    /// An image file could not be opened.
    #[error("failed to open image {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An image file was readable but could not be decoded.
    #[error("failed to decode image {}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Downscaling an oversized image for upload failed.
    #[error("failed to resize image {}: {reason}", path.display())]
    Resize { path: PathBuf, reason: String },
}
