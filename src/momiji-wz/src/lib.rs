//! Library for reading MapleStory WZ archives.
//!
//! WZ files are encrypted tree containers: a directory hierarchy of
//! `.img` units, each holding a typed property tree with bitmaps,
//! sounds, vectors and cross-references. Everything interesting about
//! the format lives in its obfuscation — AES-derived XOR keystreams
//! over strings, version-hashed offset scrambling and bit-packed
//! pixel payloads — all of which this crate undoes lazily, on demand.

#![deny(
    rust_2018_idioms,
    rustdoc::broken_intra_doc_links,
    unsafe_op_in_unsafe_fn
)]

mod archive;
pub use archive::*;

mod canvas;
pub use canvas::*;

pub mod crypto;

mod error;
pub use error::*;

pub mod property;

mod reader;
pub use reader::*;

pub mod tree;

mod version;
pub use version::*;
