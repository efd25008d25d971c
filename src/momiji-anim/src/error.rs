use std::io;

use thiserror::Error;

use momiji_wz::WzError;

/// Errors that may occur while rendering animations.
#[derive(Debug, Error)]
pub enum Error {
    /// Decoding the underlying archive data failed.
    #[error(transparent)]
    Wz(#[from] WzError),

    /// The targeted node is neither a property container holding
    /// numbered canvases nor a canvas itself.
    #[error("path does not name an animation container or canvas")]
    NotAnAnimation,

    /// There is nothing to composite.
    #[error("no frames to composite")]
    NoFrames,

    /// A track contributed no frames at all.
    #[error("animation track {0} is empty")]
    EmptyTrack(usize),

    /// The union of all frame placements exceeds a representable
    /// canvas.
    #[error("composited canvas of {width}x{height} px is not representable")]
    OversizedCanvas { width: i64, height: i64 },

    /// GIF encoding failed.
    #[error("failed to encode image data: {0}")]
    Image(#[from] image::ImageError),

    /// PNG or APNG encoding failed.
    #[error("failed to encode PNG data: {0}")]
    Png(#[from] png::EncodingError),

    /// Writing to the output sink failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}
