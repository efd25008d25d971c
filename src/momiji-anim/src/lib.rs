//! Turning WZ sprite data into animation files.
//!
//! The pipeline has three stages: [`extract`] pulls numbered canvas
//! frames out of a property subtree, [`Compositor`] normalizes their
//! anchors onto a common canvas and merges concurrent tracks along the
//! time axis, and [`encode`] writes the result as GIF, animated PNG,
//! or a plain still.

#![deny(
    rust_2018_idioms,
    rustdoc::broken_intra_doc_links,
    unsafe_op_in_unsafe_fn
)]

mod compose;
pub use compose::*;

pub mod encode;

mod error;
pub use error::*;

pub mod extract;

mod frame;
pub use frame::*;
