use image::RgbaImage;

/// One animation frame: a decoded bitmap plus placement metadata.
///
/// Frames keep their source sequence number through every transform
/// stage, so outputs stay attributable to the sprites they came from.
#[derive(Clone, Debug)]
pub struct Frame {
    /// The sequence number parsed from the source property name.
    pub number: i32,
    /// The decoded RGBA bitmap.
    pub image: RgbaImage,
    /// Placement in pixels.
    ///
    /// Extraction stores the sprite's anchor point as found on disk;
    /// compositing rewrites this into a top-left canvas position.
    pub offset: (i32, i32),
    /// Display duration in milliseconds.
    pub delay: u32,
}

impl Frame {
    /// Creates a frame from its parts.
    pub fn new(number: i32, image: RgbaImage, offset: (i32, i32), delay: u32) -> Self {
        Self {
            number,
            image,
            offset,
            delay,
        }
    }

    /// The bitmap dimensions in pixels.
    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}
