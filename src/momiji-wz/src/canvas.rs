//! Decompression and unpacking of canvas pixel blocks.

use std::io;

use libdeflater::Decompressor;

use crate::{crypto::WzKey, WzError, WzReader};

/// The packed pixel payload of a canvas property.
///
/// Parsing only captures dimensions, format codes, and the location of
/// the compressed bytes; nothing is inflated until a [`CanvasDecoder`]
/// asks for the pixels.
#[derive(Debug)]
pub struct PixelBlock {
    /// Bitmap width in pixels.
    pub width: u32,
    /// Bitmap height in pixels.
    pub height: u32,
    /// The primary pixel format code.
    pub format: i32,
    /// The secondary pixel format code.
    pub format2: u8,
    data_offset: u64,
    data_len: usize,
}

impl PixelBlock {
    pub(crate) fn parse(reader: &mut WzReader<'_>) -> Result<Self, WzError> {
        let width = reader.read_compressed_int()?;
        let height = reader.read_compressed_int()?;
        let (width, height) = match (u32::try_from(width), u32::try_from(height)) {
            (Ok(w), Ok(h)) => (w, h),
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("negative canvas dimensions {width}x{height}"),
                )
                .into())
            }
        };

        let format = reader.read_compressed_int()?;
        let format2 = reader.read_u8()?;
        reader.skip(4);

        // The stored length counts one extra lead byte which is not
        // part of the compressed payload.
        let data_len = reader.read_i32()?.saturating_sub(1).max(0) as usize;
        reader.skip(1);

        let data_offset = reader.position();
        reader.skip(data_len as u64);

        Ok(Self {
            width,
            height,
            format,
            format2,
            data_offset,
            data_len,
        })
    }

    /// The compressed payload size in bytes.
    #[inline]
    pub fn data_len(&self) -> usize {
        self.data_len
    }

    fn slice<'a>(&self, region: &'a [u8]) -> Result<&'a [u8], WzError> {
        let start = usize::try_from(self.data_offset).map_err(|_| truncated())?;
        region
            .get(start..start.saturating_add(self.data_len))
            .ok_or_else(truncated)
    }
}

/// A decoded bitmap in row-major RGBA8 layout.
///
/// `data` holds exactly `width * height * 4` bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PixelFormat {
    // 4 bits per channel, nibble order BGRA.
    Bgra4444,
    // 8 bits per channel, byte order BGRA.
    Bgra8888,
    // 16-bit 5/6/5 packed RGB, fully opaque.
    Rgb565,
    // 1 bit per 16-pixel run of solid black or white.
    Mono,
}

impl PixelFormat {
    fn for_block(block: &PixelBlock) -> Result<Self, WzError> {
        match block.format.wrapping_add(i32::from(block.format2)) {
            1 => Ok(Self::Bgra4444),
            2 => Ok(Self::Bgra8888),
            513 => Ok(Self::Rgb565),
            517 => Ok(Self::Mono),
            _ => Err(WzError::UnsupportedCanvas {
                format: block.format,
                format2: block.format2,
            }),
        }
    }

    /// How many packed bytes the inflated stream must hold for the
    /// given dimensions.
    fn packed_len(self, width: u32, height: u32) -> Result<usize, WzError> {
        let pixels = u64::from(width) * u64::from(height);
        let bytes = match self {
            Self::Bgra4444 | Self::Rgb565 => pixels * 2,
            Self::Bgra8888 => pixels * 4,
            Self::Mono => pixels / 128,
        };

        usize::try_from(bytes).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, "canvas dimensions overflow").into()
        })
    }
}

/// Reusable decompression state for canvas pixel blocks.
///
/// Keeps the inflate scratch buffer alive between blocks so that
/// decoding many sprites in a row does not thrash the allocator.
pub struct CanvasDecoder {
    raw: Decompressor,
    scratch: Vec<u8>,
}

impl CanvasDecoder {
    /// Creates a new decoder with an empty scratch buffer.
    pub fn new() -> Self {
        Self::new_with(Vec::new())
    }

    /// Creates a new decoder reusing `scratch` as its buffer.
    pub fn new_with(scratch: Vec<u8>) -> Self {
        Self {
            raw: Decompressor::new(),
            scratch,
        }
    }

    /// Consumes the decoder and returns its scratch buffer.
    pub fn into_inner(self) -> Vec<u8> {
        self.scratch
    }

    /// Inflates and unpacks `block` into an RGBA8 [`Bitmap`].
    ///
    /// `region` is the byte region the block was parsed from, i.e. the
    /// whole archive mapping or a bare `.img` blob. `key` is only
    /// consulted for the masked chunk layout some distributions use.
    pub fn decode(
        &mut self,
        region: &[u8],
        key: &WzKey,
        block: &PixelBlock,
    ) -> Result<Bitmap, WzError> {
        let format = PixelFormat::for_block(block)?;
        let expected = format.packed_len(block.width, block.height)?;
        let data = block.slice(region)?;

        self.scratch.resize(expected, 0);
        let written = if data.len() >= 2 && data[0] == 0x78 && matches!(data[1], 0x9C | 0xDA) {
            self.raw.deflate_decompress(&data[2..], &mut self.scratch)?
        } else {
            let plain = unmask_chunks(data, key)?;
            let stream = plain.get(2..).ok_or_else(truncated)?;
            self.raw.deflate_decompress(stream, &mut self.scratch)?
        };

        if written != expected {
            return Err(WzError::PixelSizeMismatch {
                expected,
                actual: written,
            });
        }

        let out_len = block.width as usize * block.height as usize * 4;
        let packed = &self.scratch[..written];
        let mut rgba = Vec::with_capacity(out_len);
        match format {
            PixelFormat::Bgra4444 => unpack_bgra4444(packed, &mut rgba),
            PixelFormat::Bgra8888 => unpack_bgra8888(packed, &mut rgba),
            PixelFormat::Rgb565 => unpack_rgb565(packed, &mut rgba),
            PixelFormat::Mono => unpack_mono(packed, &mut rgba),
        }

        // 1bpp payloads only cover whole 128-pixel runs; whatever the
        // runs leave uncovered stays transparent.
        rgba.resize(out_len, 0);

        Ok(Bitmap {
            width: block.width,
            height: block.height,
            data: rgba,
        })
    }
}

impl Default for CanvasDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Reassembles the chunked, keystream-masked payload layout into the
/// plain zlib stream it encodes. The mask index restarts at zero for
/// every chunk.
fn unmask_chunks(data: &[u8], key: &WzKey) -> Result<Vec<u8>, WzError> {
    let mut plain = Vec::with_capacity(data.len());
    let mut pos = 0;

    while pos < data.len() {
        let header = data.get(pos..pos + 4).ok_or_else(truncated)?;
        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        pos += 4;

        let chunk = data.get(pos..pos.saturating_add(len)).ok_or_else(truncated)?;
        pos += len;

        let stream = key.prefix(len).ok_or(WzError::KeystreamExhausted(len))?;
        plain.extend(chunk.iter().zip(stream).map(|(&b, &k)| b ^ k));
    }

    Ok(plain)
}

fn truncated() -> WzError {
    io::Error::new(io::ErrorKind::UnexpectedEof, "pixel block truncated").into()
}

#[inline]
fn widen_lo(b: u8) -> u8 {
    let lo = b & 0x0F;
    lo | (lo << 4)
}

#[inline]
fn widen_hi(b: u8) -> u8 {
    let hi = b & 0xF0;
    hi | (hi >> 4)
}

fn unpack_bgra4444(packed: &[u8], rgba: &mut Vec<u8>) {
    for px in packed.chunks_exact(2) {
        rgba.extend_from_slice(&[
            widen_lo(px[1]),
            widen_hi(px[0]),
            widen_lo(px[0]),
            widen_hi(px[1]),
        ]);
    }
}

fn unpack_bgra8888(packed: &[u8], rgba: &mut Vec<u8>) {
    for px in packed.chunks_exact(4) {
        rgba.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
    }
}

fn unpack_rgb565(packed: &[u8], rgba: &mut Vec<u8>) {
    for px in packed.chunks_exact(2) {
        let v = u16::from_le_bytes([px[0], px[1]]);
        let r = ((v >> 11) & 0x1F) as u8;
        let g = ((v >> 5) & 0x3F) as u8;
        let b = (v & 0x1F) as u8;
        rgba.extend_from_slice(&[
            (r << 3) | (r >> 2),
            (g << 2) | (g >> 4),
            (b << 3) | (b >> 2),
            0xFF,
        ]);
    }
}

/// Every source bit paints a 16-pixel run of solid black or white.
/// Runs flow row-major, so wrapping at the bitmap width falls out of
/// the flat layout.
fn unpack_mono(packed: &[u8], rgba: &mut Vec<u8>) {
    for &byte in packed {
        for bit in (0..8).rev() {
            let v = if byte & (1 << bit) != 0 { 0xFF } else { 0x00 };
            for _ in 0..16 {
                rgba.extend_from_slice(&[v, v, v, 0xFF]);
            }
        }
    }
}
