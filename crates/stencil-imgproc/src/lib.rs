#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// color conversions module.
pub mod color;

/// utilities to draw on images.
pub mod draw;

/// local feature detection and description module.
pub mod features;

/// image filtering module.
pub mod filter;

/// descriptor correspondence search and filtering.
pub mod matching;

/// Pyramid operations
pub mod pyramid;
