//! Stateful binary cursor over WZ archive bytes.

use std::io::{self, Read};

use byteorder::{ReadBytesExt, LE};

use crate::{
    crypto::{WzKey, OFFSET_CONSTANT},
    WzError,
};

/// A seekable little-endian reader over a WZ byte region.
///
/// On top of plain primitive reads, this implements the format's three
/// special encodings: compressed integers, masked/encrypted strings
/// and obfuscated offsets. The cursor is stateful, so concurrent
/// decoding creates one reader per call stack over the same bytes.
pub struct WzReader<'a> {
    cursor: io::Cursor<&'a [u8]>,
    key: &'a WzKey,
    file_start: u32,
    version_hash: u32,
}

impl<'a> WzReader<'a> {
    /// Creates a new reader over `data`.
    ///
    /// `file_start` and `version_hash` only participate in offset
    /// deobfuscation; readers over bare `.img` regions pass zeros.
    pub fn new(data: &'a [u8], key: &'a WzKey, file_start: u32, version_hash: u32) -> Self {
        Self {
            cursor: io::Cursor::new(data),
            key,
            file_start,
            version_hash,
        }
    }

    /// The current absolute position of the cursor.
    #[inline]
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Moves the cursor to an absolute position.
    ///
    /// Seeking past the end is not an error until a read is attempted.
    #[inline]
    pub fn seek(&mut self, pos: u64) {
        self.cursor.set_position(pos);
    }

    /// Advances the cursor by `n` bytes without reading them.
    #[inline]
    pub fn skip(&mut self, n: u64) {
        let pos = self.cursor.position();
        self.cursor.set_position(pos + n);
    }

    /// The total length of the underlying byte region.
    #[inline]
    pub fn len(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    /// Whether the underlying byte region is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }

    /// The data-start offset of the surrounding archive.
    #[inline]
    pub fn file_start(&self) -> u32 {
        self.file_start
    }

    /// The keystream this reader decrypts with.
    #[inline]
    pub fn key(&self) -> &'a WzKey {
        self.key
    }

    pub fn read_u8(&mut self) -> Result<u8, WzError> {
        Ok(self.cursor.read_u8()?)
    }

    pub fn read_i8(&mut self) -> Result<i8, WzError> {
        Ok(self.cursor.read_i8()?)
    }

    pub fn read_u16(&mut self) -> Result<u16, WzError> {
        Ok(self.cursor.read_u16::<LE>()?)
    }

    pub fn read_i32(&mut self) -> Result<i32, WzError> {
        Ok(self.cursor.read_i32::<LE>()?)
    }

    pub fn read_u32(&mut self) -> Result<u32, WzError> {
        Ok(self.cursor.read_u32::<LE>()?)
    }

    pub fn read_u64(&mut self) -> Result<u64, WzError> {
        Ok(self.cursor.read_u64::<LE>()?)
    }

    pub fn read_f32(&mut self) -> Result<f32, WzError> {
        Ok(self.cursor.read_f32::<LE>()?)
    }

    pub fn read_f64(&mut self) -> Result<f64, WzError> {
        Ok(self.cursor.read_f64::<LE>()?)
    }

    /// Reads `len` raw bytes into a new buffer.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, WzError> {
        // Cap the pre-allocation so corrupt length fields fail with
        // a clean EOF instead of an absurd allocation.
        let mut buf = Vec::with_capacity(len.min(4096));
        self.cursor
            .by_ref()
            .take(len as u64)
            .read_to_end(&mut buf)?;

        if buf.len() != len {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }

        Ok(buf)
    }

    /// Reads the 1-or-5 byte variable-length signed integer encoding.
    ///
    /// A leading `i8::MIN` escapes to a full little-endian `i32`;
    /// any other leading byte is itself the value.
    pub fn read_compressed_int(&mut self) -> Result<i32, WzError> {
        match self.read_i8()? {
            i8::MIN => self.read_i32(),
            small => Ok(small.into()),
        }
    }

    /// Reads a length-prefixed string, undoing the rolling mask and,
    /// if `encrypted`, the keystream XOR.
    ///
    /// A positive prefix selects UTF-16 content, a negative one
    /// Latin-1; prefix values at the signed byte extremes escape to a
    /// 4-byte length field. A zero prefix yields `""` immediately.
    pub fn read_wz_string(&mut self, encrypted: bool) -> Result<String, WzError> {
        let prefix = self.read_i8()?;
        match prefix {
            0 => Ok(String::new()),
            1.. => {
                let len = if prefix == i8::MAX {
                    self.read_i32()?
                } else {
                    i32::from(prefix)
                };
                self.read_unicode_chars(len, encrypted)
            }
            _ => {
                let len = if prefix == i8::MIN {
                    self.read_i32()?
                } else {
                    -i32::from(prefix)
                };
                self.read_ascii_chars(len, encrypted)
            }
        }
    }

    fn read_unicode_chars(&mut self, len: i32, encrypted: bool) -> Result<String, WzError> {
        if len <= 0 {
            return Ok(String::new());
        }

        let len = len as usize;
        let raw = self.read_bytes(len * 2)?;
        let key = match encrypted {
            true => Some(self.keystream(len * 2)?),
            false => None,
        };

        let mut units = Vec::with_capacity(len);
        let mut mask = 0xAAAA_u16;
        for i in 0..len {
            let mut unit = u16::from_le_bytes([raw[i * 2], raw[i * 2 + 1]]) ^ mask;
            if let Some(key) = key {
                unit ^= u16::from(key[i * 2 + 1]) << 8 | u16::from(key[i * 2]);
            }

            units.push(unit);
            mask = mask.wrapping_add(1);
        }

        Ok(String::from_utf16_lossy(&units))
    }

    fn read_ascii_chars(&mut self, len: i32, encrypted: bool) -> Result<String, WzError> {
        if len <= 0 {
            return Ok(String::new());
        }

        let len = len as usize;
        let raw = self.read_bytes(len)?;
        let key = match encrypted {
            true => Some(self.keystream(len)?),
            false => None,
        };

        let mut out = String::with_capacity(len);
        let mut mask = 0xAA_u8;
        for (i, &byte) in raw.iter().enumerate() {
            let mut byte = byte ^ mask;
            if let Some(key) = key {
                byte ^= key[i];
            }

            // Latin-1 maps bytes to the identical code points.
            out.push(char::from(byte));
            mask = mask.wrapping_add(1);
        }

        Ok(out)
    }

    fn keystream(&self, len: usize) -> Result<&'a [u8], WzError> {
        self.key.prefix(len).ok_or(WzError::KeystreamExhausted(len))
    }

    /// Reads a string from an absolute offset and restores the cursor
    /// afterwards, leaving no positional side effect.
    pub fn read_string_at(&mut self, offset: u64, encrypted: bool) -> Result<String, WzError> {
        let saved = self.position();
        self.seek(offset);

        let value = self.read_wz_string(encrypted);
        self.seek(saved);

        value
    }

    /// Reads either an inline string or a reference into the string
    /// pool rooted at `pool_base`.
    ///
    /// Unknown block tags resolve to an empty string, matching how
    /// every client treats them.
    pub fn read_string_block(&mut self, pool_base: u64, encrypted: bool) -> Result<String, WzError> {
        match self.read_u8()? {
            0x00 | 0x73 => self.read_wz_string(encrypted),
            0x01 | 0x1B => {
                let rel = self.read_i32()?;
                let target = pool_base.saturating_add_signed(i64::from(rel));
                self.read_string_at(target, encrypted)
            }
            tag => {
                log::trace!("unhandled string block tag {tag:#04X}, yielding empty string");
                Ok(String::new())
            }
        }
    }

    /// Decodes one obfuscated 4-byte offset field.
    ///
    /// The transform is position-dependent: the field's own location,
    /// the data-start offset and the version hash are folded together
    /// before the stored bytes get XORed in. The rotate amount comes
    /// from the low 5 bits of the salted value, taken after the
    /// constant subtraction.
    pub fn read_offset(&mut self) -> Result<u32, WzError> {
        let pos = self.position() as u32;

        let mut salt = pos.wrapping_sub(self.file_start) ^ u32::MAX;
        salt = salt.wrapping_mul(self.version_hash);
        salt = salt.wrapping_sub(OFFSET_CONSTANT);
        salt = salt.rotate_left(salt & 0x1F);

        let stored = self.read_u32()?;
        Ok((salt ^ stored).wrapping_add(self.file_start.wrapping_mul(2)))
    }
}
