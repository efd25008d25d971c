use std::io;

use thiserror::Error;

/// Errors that may occur when decoding a WZ archive.
#[derive(Debug, Error)]
pub enum WzError {
    /// An I/O operation on the backing byte source failed.
    ///
    /// This also covers reads past the end of the mapped data, which
    /// is what a truncated or mis-keyed archive degenerates into.
    #[error("failed to read archive data: {0}")]
    Io(#[from] io::Error),

    /// The file does not start with the `PKG1` magic.
    #[error("not a WZ archive: missing PKG1 magic")]
    Magic,

    /// The configured game version does not match the archive header.
    #[error(
        "version check failed: header stores {stored:#06X} but version {version} implies {computed:#06X}"
    )]
    VersionMismatch {
        /// The game version the archive was opened with.
        version: u16,
        /// The encrypted version field stored in the header.
        stored: u16,
        /// The value implied by the configured version.
        computed: u16,
    },

    /// A directory entry carried an unrecognized type tag.
    ///
    /// In practice this means the version hash is wrong and every
    /// offset in the directory block decoded to garbage.
    #[error("unknown directory entry tag {tag:#04X} at offset {offset:#X}")]
    UnknownEntryTag { tag: u8, offset: u64 },

    /// A property list entry carried an unrecognized type tag.
    #[error("unknown property tag {tag:#04X} at offset {offset:#X}")]
    UnknownPropertyTag { tag: u8, offset: u64 },

    /// An extended property block carried an unrecognized inner tag.
    #[error("unknown extended property tag {tag:#04X} at offset {offset:#X}")]
    UnknownExtendedTag { tag: u8, offset: u64 },

    /// An extended property block named a type this library does not know.
    #[error("unknown extended property type `{0}`")]
    UnknownExtendedType(String),

    /// A compressed pixel block failed to inflate.
    #[error("failed to inflate pixel block: {0}")]
    Decompress(#[from] libdeflater::DecompressionError),

    /// A pixel block inflated to a size other than its dimensions imply.
    #[error("pixel block inflated to {actual} bytes, expected {expected}")]
    PixelSizeMismatch { expected: usize, actual: usize },

    /// A pixel block declared a format combination we cannot unpack.
    #[error("unsupported canvas format {format}/{format2}")]
    UnsupportedCanvas { format: i32, format2: u8 },

    /// An encrypted run was longer than the derived keystream.
    #[error("masked run of {0} bytes exceeds the decryption keystream")]
    KeystreamExhausted(usize),
}
