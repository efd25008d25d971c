//! Game version hashing and per-archive decoding configuration.

use crate::crypto::WzRegion;

/// Per-archive decoding configuration.
///
/// Captured once when an archive is opened and treated as immutable
/// from then on; every decrypting call borrows it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WzConfig {
    /// The region whose key material the archive is encrypted with.
    pub region: WzRegion,
    /// The numeric game version the archive was built for.
    pub version: u16,
}

impl WzConfig {
    /// Creates a new configuration from region and game version.
    pub const fn new(region: WzRegion, version: u16) -> Self {
        Self { region, version }
    }

    /// The 32-bit hash salting every obfuscated offset in the archive.
    #[inline]
    pub fn version_hash(&self) -> u32 {
        version_hash(self.version)
    }
}

/// Folds a numeric game version into the offset obfuscation hash.
///
/// The fold runs over the decimal digit characters of the version,
/// most significant first.
pub fn version_hash(version: u16) -> u32 {
    let mut hash = 0_u32;
    for digit in version.to_string().bytes() {
        hash = hash
            .wrapping_mul(32)
            .wrapping_add(u32::from(digit))
            .wrapping_add(1);
    }

    hash
}

/// Computes the encrypted version field stored in an archive header
/// for the given version hash.
pub fn encrypted_version(hash: u32) -> u16 {
    let [a, b, c, d] = hash.to_be_bytes();
    u16::from(0xFF ^ a ^ b ^ c ^ d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_v95() {
        // '9' -> 0x3A, then 0x3A * 32 + '5' + 1.
        assert_eq!(version_hash(95), 0x776);
        assert_eq!(encrypted_version(0x776), 0x8E);
    }

    #[test]
    fn hash_is_digit_order_sensitive() {
        assert_ne!(version_hash(12), version_hash(21));
    }
}
