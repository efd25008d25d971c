//! Compositing of extracted frames onto common canvases.

use image::{imageops, Rgba, RgbaImage};

use crate::{Error, Frame};

/// Pixel padding around the composited content.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Padding {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Padding {
    /// The same padding on all four sides.
    pub const fn uniform(px: u32) -> Self {
        Self {
            left: px,
            top: px,
            right: px,
            bottom: px,
        }
    }
}

/// Composites frames onto background-filled canvases of a common size.
///
/// Both entry points normalize frame anchors so that no frame's
/// content is clipped, then paint every frame onto a fresh canvas
/// sized to the union of all placements plus padding. Mismatched
/// sprite sizes within an animation are expected and handled by the
/// normalization; empty inputs are rejected up front.
#[derive(Clone, Copy, Debug)]
pub struct Compositor {
    /// Padding around the union of all frame placements.
    pub padding: Padding,
    /// The fill color behind every frame.
    pub background: Rgba<u8>,
}

/// A frame with its placement lifted out into canvas coordinates.
struct Placed {
    frame: Frame,
    x: i64,
    y: i64,
}

/// A track's position within the time-axis merge.
struct Cursor {
    current: Placed,
    remaining: u32,
    frames: std::vec::IntoIter<Placed>,
}

impl Compositor {
    pub fn new(padding: Padding, background: Rgba<u8>) -> Self {
        Self {
            padding,
            background,
        }
    }

    /// Normalizes and paints a single animation track.
    ///
    /// Every frame shifts by `limit - anchor`, where `limit` is the
    /// largest frame dimension in the track; the output canvas covers
    /// the union of the shifted frames plus padding. Numbers and
    /// delays pass through unchanged. A single frame with zero
    /// padding degenerates to a plain copy.
    pub fn process(&self, frames: Vec<Frame>) -> Result<Vec<Frame>, Error> {
        if frames.is_empty() {
            return Err(Error::NoFrames);
        }

        let limit_w = frames.iter().map(|f| f.image.width()).max().unwrap_or(0);
        let limit_h = frames.iter().map(|f| f.image.height()).max().unwrap_or(0);

        let starts = frames
            .iter()
            .map(|f| {
                (
                    i64::from(limit_w) - i64::from(f.offset.0),
                    i64::from(limit_h) - i64::from(f.offset.1),
                )
            })
            .collect::<Vec<_>>();

        let min_x = starts.iter().map(|s| s.0).min().unwrap_or(0);
        let min_y = starts.iter().map(|s| s.1).min().unwrap_or(0);
        let max_x = starts
            .iter()
            .zip(&frames)
            .map(|(s, f)| s.0 + i64::from(f.image.width()))
            .max()
            .unwrap_or(0);
        let max_y = starts
            .iter()
            .zip(&frames)
            .map(|(s, f)| s.1 + i64::from(f.image.height()))
            .max()
            .unwrap_or(0);

        let (width, height) = self.canvas_size(max_x - min_x, max_y - min_y)?;

        let out = frames
            .into_iter()
            .zip(starts)
            .map(|(frame, (sx, sy))| {
                let mut canvas = self.blank(width, height);
                imageops::overlay(
                    &mut canvas,
                    &frame.image,
                    sx - min_x + i64::from(self.padding.left),
                    sy - min_y + i64::from(self.padding.top),
                );

                Frame::new(frame.number, canvas, (0, 0), frame.delay)
            })
            .collect();

        Ok(out)
    }

    /// Composites multiple concurrent tracks into one frame sequence.
    ///
    /// Anchors invert into placements and the smallest placement
    /// across all tracks normalizes to the padded top-left corner; the
    /// canvas size is the maximum of `padding + placement + dimensions
    /// + padding` over every frame of every track, so the leading
    /// padding counts once more than in the single-track path. Tracks
    /// then merge along the time axis: each output frame lasts until
    /// the soonest-expiring current frame, painting tracks in argument
    /// order so later tracks draw over earlier ones. Merged frames are
    /// numbered by a fresh counter; a lone track skips the merge and
    /// keeps its own numbers and delays.
    pub fn process_tracks(&self, tracks: Vec<Vec<Frame>>) -> Result<Vec<Frame>, Error> {
        if tracks.is_empty() {
            return Err(Error::NoFrames);
        }
        if let Some(empty) = tracks.iter().position(|t| t.is_empty()) {
            return Err(Error::EmptyTrack(empty));
        }

        let mut tracks = tracks
            .into_iter()
            .map(|track| {
                track
                    .into_iter()
                    .map(|frame| Placed {
                        x: -i64::from(frame.offset.0),
                        y: -i64::from(frame.offset.1),
                        frame,
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        let min_x = tracks.iter().flatten().map(|p| p.x).min().unwrap_or(0);
        let min_y = tracks.iter().flatten().map(|p| p.y).min().unwrap_or(0);

        let mut max_x = 0_i64;
        let mut max_y = 0_i64;
        for p in tracks.iter_mut().flatten() {
            p.x += i64::from(self.padding.left) - min_x;
            p.y += i64::from(self.padding.top) - min_y;
            max_x = max_x.max(p.x + i64::from(p.frame.image.width()));
            max_y = max_y.max(p.y + i64::from(p.frame.image.height()));
        }

        let (width, height) = self.canvas_size(max_x, max_y)?;

        for track in &mut tracks {
            track.sort_by_key(|p| p.frame.number);
        }

        if tracks.len() == 1 {
            let track = tracks.pop().unwrap_or_default();
            let out = track
                .into_iter()
                .map(|p| {
                    let mut canvas = self.blank(width, height);
                    imageops::overlay(&mut canvas, &p.frame.image, p.x, p.y);
                    Frame::new(p.frame.number, canvas, (0, 0), p.frame.delay)
                })
                .collect();

            return Ok(out);
        }

        Ok(self.merge(tracks, width, height))
    }

    fn merge(&self, tracks: Vec<Vec<Placed>>, width: u32, height: u32) -> Vec<Frame> {
        let mut cursors = tracks
            .into_iter()
            .filter_map(|track| {
                let mut frames = track.into_iter();
                frames.next().map(|current| Cursor {
                    remaining: current.frame.delay,
                    current,
                    frames,
                })
            })
            .collect::<Vec<_>>();

        let mut merged = Vec::new();
        let mut number = 0;
        while !cursors.is_empty() {
            // The output frame lasts until the soonest current frame
            // expires.
            let step = cursors.iter().map(|c| c.remaining).min().unwrap_or(0);

            let mut canvas = self.blank(width, height);
            for cursor in &mut cursors {
                let p = &cursor.current;
                imageops::overlay(&mut canvas, &p.frame.image, p.x, p.y);
                cursor.remaining -= step;
            }

            merged.push(Frame::new(number, canvas, (0, 0), step));
            number += 1;

            // Expired frames advance; exhausted tracks drop out.
            cursors.retain_mut(|cursor| {
                if cursor.remaining > 0 {
                    return true;
                }

                match cursor.frames.next() {
                    Some(next) => {
                        cursor.remaining = next.frame.delay;
                        cursor.current = next;
                        true
                    }
                    None => false,
                }
            });
        }

        merged
    }

    fn canvas_size(&self, content_w: i64, content_h: i64) -> Result<(u32, u32), Error> {
        self.canvas_size_at(
            content_w + i64::from(self.padding.left) + i64::from(self.padding.right),
            content_h + i64::from(self.padding.top) + i64::from(self.padding.bottom),
        )
    }

    fn canvas_size_at(&self, width: i64, height: i64) -> Result<(u32, u32), Error> {
        match (u32::try_from(width), u32::try_from(height)) {
            (Ok(w), Ok(h)) => Ok((w, h)),
            _ => Err(Error::OversizedCanvas { width, height }),
        }
    }

    fn blank(&self, width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, self.background)
    }
}
