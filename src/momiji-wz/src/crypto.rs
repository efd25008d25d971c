//! Key material and keystream derivation for WZ decryption.
//!
//! Strings and some pixel payloads in an archive are XORed against a
//! keystream derived from a region-specific IV. The keystream is
//! computed once per archive and shared read-only afterwards.

use aes::{
    cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit},
    Aes256,
};

/// Salt subtracted during offset deobfuscation, shared by every known
/// client build.
pub const OFFSET_CONSTANT: u32 = 0x581C_3F6D;

/// Length of the derived XOR keystream in bytes.
///
/// Strings and masked pixel chunks index into the keystream by byte
/// position, so this also bounds the longest decodable string.
pub const KEYSTREAM_LEN: usize = u16::MAX as usize;

/// The version-independent 32-byte AES key baked into the client.
pub const USER_KEY: [u8; 32] = [
    0x13, 0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, // .
    0x06, 0x00, 0x00, 0x00, 0xB4, 0x00, 0x00, 0x00, // .
    0x1B, 0x00, 0x00, 0x00, 0x0F, 0x00, 0x00, 0x00, // .
    0x33, 0x00, 0x00, 0x00, 0x52, 0x00, 0x00, 0x00, // .
];

/// Region variants an archive may be keyed for.
///
/// The region only selects the 4-byte keystream IV; the AES key itself
/// is the same across all distributions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WzRegion {
    /// Global MapleStory.
    #[default]
    Gms,
    /// SEA/MSEA distributions.
    Sea,
    /// Old and private distributions that ship without encryption.
    ///
    /// Selects the all-zero IV, which short-circuits key derivation
    /// and turns every masking pass into a no-op.
    Classic,
}

impl WzRegion {
    /// The keystream IV associated with this region.
    pub const fn iv(self) -> [u8; 4] {
        match self {
            WzRegion::Gms => [0x4D, 0x23, 0xC7, 0x2B],
            WzRegion::Sea => [0xB9, 0x7D, 0x63, 0xE9],
            WzRegion::Classic => [0; 4],
        }
    }
}

/// The derived XOR keystream for one archive.
///
/// Derivation chains AES-256-ECB over a 16-byte block seeded by tiling
/// the IV four times; every ciphertext block is both keystream output
/// and the next plaintext input. The result is immutable and safe to
/// share across threads.
pub struct WzKey {
    stream: Box<[u8]>,
}

impl WzKey {
    /// Derives the keystream for `region` with the standard client key.
    pub fn derive(region: WzRegion) -> Self {
        Self::derive_with(region.iv(), &USER_KEY)
    }

    /// Derives a keystream from custom key material.
    ///
    /// An all-zero IV yields an all-zero keystream without running the
    /// cipher at all.
    pub fn derive_with(iv: [u8; 4], key: &[u8; 32]) -> Self {
        let mut stream = vec![0; KEYSTREAM_LEN];

        if iv != [0; 4] {
            let cipher = Aes256::new(GenericArray::from_slice(key));

            let mut block = aes::Block::default();
            for chunk in block.chunks_exact_mut(4) {
                chunk.copy_from_slice(&iv);
            }

            // The final 15-byte chunk takes the leading bytes of one
            // last ciphertext block.
            for chunk in stream.chunks_mut(16) {
                cipher.encrypt_block(&mut block);
                chunk.copy_from_slice(&block[..chunk.len()]);
            }
        }

        Self {
            stream: stream.into_boxed_slice(),
        }
    }

    /// Gets the raw keystream bytes.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.stream
    }

    /// Gets a prefix of the keystream, if enough bytes are derived.
    #[inline]
    pub fn prefix(&self, len: usize) -> Option<&[u8]> {
        self.stream.get(..len)
    }
}
