//! Byte-level fixture builders for the encodings the library decodes.
//!
//! Every transform in the format is XOR-symmetric, so the encoders
//! here are the decoders run in reverse against the same key material.

#![allow(dead_code)]

use libdeflater::{CompressionLvl, Compressor};
use momiji_wz::{
    crypto::{WzKey, WzRegion, OFFSET_CONSTANT},
    encrypted_version, version_hash,
};

pub const COPYRIGHT: &str = "Package file v1.0 Copyright 2002 Wizet, ZMS";

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

/// Encodes a length-prefixed Latin-1 string, applying the rolling mask
/// and the keystream XOR.
pub fn ascii_string(s: &str, key: &WzKey) -> Vec<u8> {
    let bytes = s.as_bytes();
    assert!(bytes.is_ascii(), "fixture strings must be ASCII");

    let mut out = Vec::with_capacity(bytes.len() + 1);
    if bytes.len() >= 128 {
        out.push(i8::MIN as u8);
        out.extend_from_slice(&(bytes.len() as i32).to_le_bytes());
    } else {
        out.push(-(bytes.len() as i32) as i8 as u8);
    }

    let stream = key.prefix(bytes.len()).unwrap();
    let mut mask = 0xAA_u8;
    for (i, &b) in bytes.iter().enumerate() {
        out.push(b ^ mask ^ stream[i]);
        mask = mask.wrapping_add(1);
    }

    out
}

/// Encodes a length-prefixed UTF-16 string.
pub fn unicode_string(s: &str, key: &WzKey) -> Vec<u8> {
    let units = s.encode_utf16().collect::<Vec<_>>();

    let mut out = Vec::with_capacity(units.len() * 2 + 1);
    if units.len() >= 127 {
        out.push(i8::MAX as u8);
        out.extend_from_slice(&(units.len() as i32).to_le_bytes());
    } else {
        out.push(units.len() as u8);
    }

    let stream = key.prefix(units.len() * 2).unwrap();
    let mut mask = 0xAAAA_u16;
    for (i, &unit) in units.iter().enumerate() {
        let k = u16::from(stream[i * 2 + 1]) << 8 | u16::from(stream[i * 2]);
        out.extend_from_slice(&(unit ^ mask ^ k).to_le_bytes());
        mask = mask.wrapping_add(1);
    }

    out
}

/// Encodes an inline string block as used for property names and
/// string values.
pub fn name_block(s: &str, key: &WzKey) -> Vec<u8> {
    let mut out = vec![0x00];
    out.extend(ascii_string(s, key));
    out
}

/// The salt half of the offset obfuscation for a field at `field_pos`.
pub fn offset_salt(field_pos: u32, file_start: u32, hash: u32) -> u32 {
    let mut salt = field_pos.wrapping_sub(file_start) ^ u32::MAX;
    salt = salt.wrapping_mul(hash);
    salt = salt.wrapping_sub(OFFSET_CONSTANT);
    salt.rotate_left(salt & 0x1F)
}

/// Encodes `target` as the obfuscated 4-byte offset field stored at
/// `field_pos`.
pub fn encoded_offset(field_pos: u32, target: u32, file_start: u32, hash: u32) -> [u8; 4] {
    let salt = offset_salt(field_pos, file_start, hash);
    (salt ^ target.wrapping_sub(file_start.wrapping_mul(2))).to_le_bytes()
}

/// Compresses `data` into a full zlib stream at the default level,
/// which emits the `78 9C` header the decoder sniffs for.
pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut compressor = Compressor::new(CompressionLvl::default());
    let mut out = vec![0; compressor.zlib_compress_bound(data.len())];

    let real_size = compressor.zlib_compress(data, &mut out).unwrap();
    out.truncate(real_size);
    out
}

/// Splits a zlib stream into the chunked, keystream-masked layout.
pub fn masked_chunks(stream: &[u8], key: &WzKey, chunk_len: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for chunk in stream.chunks(chunk_len) {
        out.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
        out.extend(chunk.iter().zip(key.bytes()).map(|(&b, &k)| b ^ k));
    }

    out
}

// Property tree encoding. Pieces compose bottom-up so that extended
// blocks know their byte length before the length field is written.

/// Wraps encoded properties into a counted list.
pub fn prop_list(props: &[Vec<u8>]) -> Vec<u8> {
    let mut out = compressed_int(props.len() as i32);
    for p in props {
        out.extend_from_slice(p);
    }

    out
}

/// Encodes one named scalar property.
pub fn prop(key: &WzKey, name: &str, tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = name_block(name, key);
    out.push(tag);
    out.extend_from_slice(payload);
    out
}

/// Encodes one named extended property with an inline type name.
pub fn extended(key: &WzKey, name: &str, type_name: &str, payload: &[u8]) -> Vec<u8> {
    let mut inner = vec![0x73];
    inner.extend(ascii_string(type_name, key));
    inner.extend_from_slice(payload);

    let mut out = name_block(name, key);
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

/// Encodes the payload of a `Sound_DX8` extended block.
pub fn sound_payload(duration_ms: i32, header: &[u8; 82], data: &[u8]) -> Vec<u8> {
    let mut out = vec![0x00];
    out.extend(compressed_int(data.len() as i32));
    out.extend(compressed_int(duration_ms));
    out.extend_from_slice(header);
    out.extend_from_slice(data);
    out
}

/// Encodes the payload of a `UOL` extended block with an inline path.
pub fn uol_payload(key: &WzKey, path: &str) -> Vec<u8> {
    let mut out = vec![0x00, 0x00];
    out.extend(ascii_string(path, key));
    out
}

/// Encodes a whole standalone `.img` unit around a property list.
pub fn img(key: &WzKey, list: &[u8]) -> Vec<u8> {
    let mut out = vec![0x73];
    out.extend(ascii_string("Property", key));
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(list);
    out
}

/// Incremental builder for whole archive files.
///
/// Offset fields are position-dependent and point forwards, so they
/// are reserved as zeros first and patched once their targets exist.
pub struct ArchiveBuilder<'k> {
    pub buf: Vec<u8>,
    key: &'k WzKey,
    file_start: u32,
    hash: u32,
}

impl<'k> ArchiveBuilder<'k> {
    pub fn new(key: &'k WzKey, version: u16) -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"PKG1");
        buf.extend_from_slice(&[0; 8]);

        let file_start = 16 + COPYRIGHT.len() as u32 + 1;
        buf.extend_from_slice(&file_start.to_le_bytes());
        buf.extend_from_slice(COPYRIGHT.as_bytes());
        buf.push(0);
        debug_assert_eq!(buf.len() as u32, file_start);

        let hash = version_hash(version);
        buf.extend_from_slice(&encrypted_version(hash).to_le_bytes());

        Self {
            buf,
            key,
            file_start,
            hash,
        }
    }

    pub fn pos(&self) -> u32 {
        self.buf.len() as u32
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_count(&mut self, count: i32) {
        self.push(&compressed_int(count));
    }

    /// Writes a type 1 filler entry the parser must skip.
    pub fn write_filler_entry(&mut self) {
        self.buf.push(1);
        self.push(&[0; 10]);
    }

    /// Writes a directory or image entry with an inline name and
    /// returns the position of its offset field for later patching.
    pub fn write_entry(&mut self, kind: u8, name: &str, size: i32, checksum: i32) -> u32 {
        self.buf.push(kind);
        self.push(&ascii_string(name, self.key));
        self.entry_tail(size, checksum)
    }

    /// Writes a type 2 entry whose name lives out of line. Returns the
    /// positions of the name reference field and the offset field.
    pub fn write_pooled_entry(&mut self, size: i32, checksum: i32) -> (u32, u32) {
        self.buf.push(2);
        let name_field = self.pos();
        self.push(&[0; 4]);
        let offset_field = self.entry_tail(size, checksum);

        (name_field, offset_field)
    }

    fn entry_tail(&mut self, size: i32, checksum: i32) -> u32 {
        self.push(&compressed_int(size));
        self.push(&compressed_int(checksum));

        let offset_field = self.pos();
        self.push(&[0; 4]);
        offset_field
    }

    /// Writes the out-of-line name record for a type 2 entry and
    /// patches the entry's reference field.
    pub fn write_pooled_name(&mut self, name_field: u32, kind: u8, name: &str) {
        let target = self.pos();
        self.buf.push(kind);
        self.push(&ascii_string(name, self.key));

        let rel = (target - self.file_start) as i32;
        self.patch(name_field, &rel.to_le_bytes());
    }

    pub fn patch_offset(&mut self, offset_field: u32, target: u32) {
        let encoded = encoded_offset(offset_field, target, self.file_start, self.hash);
        self.patch(offset_field, &encoded);
    }

    fn patch(&mut self, pos: u32, bytes: &[u8; 4]) {
        let pos = pos as usize;
        self.buf[pos..pos + 4].copy_from_slice(bytes);
    }

    /// Fills in the header's payload size and returns the bytes.
    pub fn finish(mut self) -> Vec<u8> {
        let payload = u64::from(self.pos() - self.file_start);
        self.buf[4..12].copy_from_slice(&payload.to_le_bytes());
        self.buf
    }
}
