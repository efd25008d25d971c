//! Encoders for composited frame sequences.

use std::io::Write;

use image::{
    codecs::gif::{GifEncoder, Repeat},
    Delay, Frame as ImageFrame, RgbaImage,
};

use crate::{Error, Frame};

/// Color quantization speed for GIF output, where 1 is best quality
/// and 30 is fastest.
const GIF_SPEED: i32 = 4;

/// Writes frames as an animated GIF that repeats forever.
///
/// Delays round to the format's centisecond resolution.
pub fn write_gif<W: Write>(out: W, frames: Vec<Frame>) -> Result<(), Error> {
    if frames.is_empty() {
        return Err(Error::NoFrames);
    }

    let mut encoder = GifEncoder::new_with_speed(out, GIF_SPEED);
    encoder.set_repeat(Repeat::Infinite)?;

    for frame in frames {
        let delay = Delay::from_numer_denom_ms(frame.delay, 1);
        encoder.encode_frame(ImageFrame::from_parts(frame.image, 0, 0, delay))?;
    }

    Ok(())
}

/// Writes frames as an animated PNG that repeats forever.
///
/// Delays keep millisecond precision as fractions of a second; they
/// cap at the format's 16-bit numerator. All frames must share the
/// dimensions of the first.
pub fn write_apng<W: Write>(out: W, frames: &[Frame]) -> Result<(), Error> {
    let Some(first) = frames.first() else {
        return Err(Error::NoFrames);
    };
    let (width, height) = first.dimensions();

    let mut encoder = png::Encoder::new(out, width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_animated(frames.len() as u32, 0)?;

    let mut writer = encoder.write_header()?;
    for frame in frames {
        let delay = u16::try_from(frame.delay).unwrap_or(u16::MAX);
        writer.set_frame_delay(delay, 1000)?;
        writer.write_image_data(frame.image.as_raw())?;
    }
    writer.finish()?;

    Ok(())
}

/// Writes a single bitmap as a still PNG.
pub fn write_png<W: Write>(out: W, image: &RgbaImage) -> Result<(), Error> {
    let mut encoder = png::Encoder::new(out, image.width(), image.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder.write_header()?;
    writer.write_image_data(image.as_raw())?;
    writer.finish()?;

    Ok(())
}
