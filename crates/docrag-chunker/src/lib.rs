//! Document chunking for docrag.
//!
//! Only fixed-offset chunking is provided; see [`FixedOffsetChunker`].

pub mod fixed;

pub use fixed::{split_fixed, FixedOffsetChunker};
