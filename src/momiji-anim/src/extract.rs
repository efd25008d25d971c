//! Extraction of animation frames from property subtrees.

use image::RgbaImage;
use momiji_wz::{
    property::{NodeRef, WzValue},
    Bitmap, CanvasDecoder, ImgView, WzError,
};

use crate::{Error, Frame};

/// The display duration assumed when a canvas has no `delay` child.
pub const DEFAULT_DELAY_MS: u32 = 100;

/// Extracts the animation frames below a container node.
///
/// A frame is any child whose name parses as an integer and that
/// resolves to a canvas; link children contribute their target's
/// bitmap and metadata under their own number. The anchor comes from
/// the canvas's `origin` child and the duration from its `delay`
/// child, an integer or a string holding one, defaulting to
/// [`DEFAULT_DELAY_MS`].
///
/// Canvases in formats the decoder does not support are skipped with
/// a warning instead of failing the whole animation. Frames return in
/// ascending numeric order.
pub fn animation_frames(view: ImgView<'_>, node: NodeRef<'_>) -> Result<Vec<Frame>, Error> {
    let node = node.resolve().ok_or(Error::NotAnAnimation)?;
    if !matches!(node.value(), WzValue::Sub(_)) {
        return Err(Error::NotAnAnimation);
    }

    let mut decoder = CanvasDecoder::new();
    let mut frames = Vec::new();

    for child in node.children() {
        let Ok(number) = child.name().parse::<i32>() else {
            continue;
        };
        let Some(target) = child.resolve() else {
            log::warn!("skipping frame {number}: link does not resolve");
            continue;
        };
        let Some(canvas) = target.canvas() else {
            continue;
        };

        let (anchor, delay) = anchor_and_delay(target);
        let bitmap = match decoder.decode(view.data, view.key, &canvas.block) {
            Ok(bitmap) => bitmap,
            Err(err @ WzError::UnsupportedCanvas { .. }) => {
                log::warn!("skipping frame {number}: {err}");
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        frames.push(Frame::new(number, rgba_image(bitmap), anchor, delay));
    }

    frames.sort_by_key(|f| f.number);
    Ok(frames)
}

/// Builds a one-frame track from a canvas node, following links.
///
/// The frame keeps the canvas's own anchor and delay, so it can sit
/// in the compositor next to real animation tracks.
pub fn canvas_frame(view: ImgView<'_>, node: NodeRef<'_>) -> Result<Frame, Error> {
    let node = node.resolve().ok_or(Error::NotAnAnimation)?;
    let canvas = node.canvas().ok_or(Error::NotAnAnimation)?;

    let (anchor, delay) = anchor_and_delay(node);
    let bitmap = CanvasDecoder::new().decode(view.data, view.key, &canvas.block)?;

    Ok(Frame::new(0, rgba_image(bitmap), anchor, delay))
}

/// Decodes a single canvas node into a bitmap, following links.
///
/// This is the still-image path: no anchor or delay handling, just
/// the pixels.
pub fn decode_canvas(view: ImgView<'_>, node: NodeRef<'_>) -> Result<RgbaImage, Error> {
    let node = node.resolve().ok_or(Error::NotAnAnimation)?;
    let canvas = node.canvas().ok_or(Error::NotAnAnimation)?;

    let bitmap = CanvasDecoder::new().decode(view.data, view.key, &canvas.block)?;
    Ok(rgba_image(bitmap))
}

/// Whether a node resolves to a single canvas rather than a container.
pub fn is_canvas(node: NodeRef<'_>) -> bool {
    node.resolve().is_some_and(|n| n.canvas().is_some())
}

fn anchor_and_delay(node: NodeRef<'_>) -> ((i32, i32), u32) {
    let origin = node
        .child("origin")
        .and_then(|n| n.vector())
        .unwrap_or_default();
    let delay = node
        .child("delay")
        .and_then(|n| n.int_value())
        .unwrap_or(DEFAULT_DELAY_MS as i32)
        .max(0) as u32;

    ((origin.x, origin.y), delay)
}

fn rgba_image(bitmap: Bitmap) -> RgbaImage {
    let Bitmap {
        width,
        height,
        data,
    } = bitmap;

    // The decoder sizes its output to exactly width * height * 4.
    RgbaImage::from_raw(width, height, data).unwrap()
}
