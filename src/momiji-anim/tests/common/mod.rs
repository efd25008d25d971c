//! Byte fixtures for animation-bearing `.img` units.
//!
//! Everything here encodes against the all-zero Classic keystream,
//! which leaves only the rolling string masks in play and keeps the
//! builders short. The archive crate's own tests cover the encrypted
//! variants of these layouts.

#![allow(dead_code)]

use libdeflater::{CompressionLvl, Compressor};
use momiji_wz::crypto::{WzKey, WzRegion};

pub fn plain_key() -> WzKey {
    WzKey::derive(WzRegion::Classic)
}

/// Encodes the 1-or-5 byte variable-length integer.
pub fn compressed_int(value: i32) -> Vec<u8> {
    if (-127..=127).contains(&value) {
        vec![value as i8 as u8]
    } else {
        let mut out = vec![i8::MIN as u8];
        out.extend_from_slice(&value.to_le_bytes());
        out
    }
}

/// Encodes a short Latin-1 string under the rolling mask.
pub fn ascii_string(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    assert!(bytes.is_ascii() && bytes.len() < 128);

    let mut out = vec![-(bytes.len() as i32) as i8 as u8];
    let mut mask = 0xAA_u8;
    for &b in bytes {
        out.push(b ^ mask);
        mask = mask.wrapping_add(1);
    }

    out
}

/// Encodes an inline string block as used for names and string values.
pub fn name_block(s: &str) -> Vec<u8> {
    let mut out = vec![0x00];
    out.extend(ascii_string(s));
    out
}

/// Compresses `data` into a zlib stream with the sniffable header.
pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut compressor = Compressor::new(CompressionLvl::default());
    let mut out = vec![0; compressor.zlib_compress_bound(data.len())];

    let real_size = compressor.zlib_compress(data, &mut out).unwrap();
    out.truncate(real_size);
    out
}

/// Wraps encoded properties into a counted list.
pub fn prop_list(props: &[Vec<u8>]) -> Vec<u8> {
    let mut out = compressed_int(props.len() as i32);
    for p in props {
        out.extend_from_slice(p);
    }

    out
}

/// Encodes one named scalar property.
pub fn prop(name: &str, tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = name_block(name);
    out.push(tag);
    out.extend_from_slice(payload);
    out
}

/// Encodes one named extended property with an inline type name.
pub fn extended(name: &str, type_name: &str, payload: &[u8]) -> Vec<u8> {
    let mut inner = vec![0x73];
    inner.extend(ascii_string(type_name));
    inner.extend_from_slice(payload);

    let mut out = name_block(name);
    out.push(9);
    out.extend_from_slice(&(inner.len() as u32).to_le_bytes());
    out.extend(inner);
    out
}

/// Encodes the payload of a `Property` extended block.
pub fn sub_payload(list: &[u8]) -> Vec<u8> {
    let mut out = vec![0, 0];
    out.extend_from_slice(list);
    out
}

/// Encodes the payload of a `Canvas` extended block.
pub fn canvas_payload(children: Option<&[u8]>, block: &[u8]) -> Vec<u8> {
    let mut out = vec![0x00];
    match children {
        Some(list) => {
            out.push(1);
            out.extend_from_slice(&[0, 0]);
            out.extend_from_slice(list);
        }
        None => out.push(0),
    }

    out.extend_from_slice(block);
    out
}

/// Encodes a pixel block with the given compressed payload.
pub fn pixel_block(width: i32, height: i32, format: i32, format2: u8, data: &[u8]) -> Vec<u8> {
    let mut out = compressed_int(width);
    out.extend(compressed_int(height));
    out.extend(compressed_int(format));
    out.push(format2);
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&((data.len() + 1) as i32).to_le_bytes());
    out.push(0);
    out.extend_from_slice(data);
    out
}

/// Encodes a `Shape2D#Vector2D` payload.
pub fn vector_payload(x: i32, y: i32) -> Vec<u8> {
    let mut out = compressed_int(x);
    out.extend(compressed_int(y));
    out
}

/// Encodes the payload of a `UOL` extended block with an inline path.
pub fn uol_payload(path: &str) -> Vec<u8> {
    let mut out = vec![0x00, 0x00];
    out.extend(ascii_string(path));
    out
}

/// Encodes a whole standalone `.img` unit around a property list.
pub fn img(list: &[u8]) -> Vec<u8> {
    let mut out = vec![0x73];
    out.extend(ascii_string("Property"));
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(list);
    out
}

/// Encodes a BGRA8888 canvas filled with one color, carrying an
/// `origin` anchor and an optional integer `delay`.
pub fn solid_canvas(
    name: &str,
    width: u32,
    height: u32,
    rgba: [u8; 4],
    origin: (i32, i32),
    delay: Option<i32>,
) -> Vec<u8> {
    let bgra = [rgba[2], rgba[1], rgba[0], rgba[3]];
    let packed = bgra
        .iter()
        .copied()
        .cycle()
        .take((width * height * 4) as usize)
        .collect::<Vec<_>>();
    let block = pixel_block(width as i32, height as i32, 2, 0, &zlib(&packed));

    let mut children = vec![extended(
        "origin",
        "Shape2D#Vector2D",
        &vector_payload(origin.0, origin.1),
    )];
    if let Some(ms) = delay {
        children.push(prop("delay", 3, &compressed_int(ms)));
    }

    extended(
        name,
        "Canvas",
        &canvas_payload(Some(&prop_list(&children)), &block),
    )
}
