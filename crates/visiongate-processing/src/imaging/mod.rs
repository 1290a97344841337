//! Image decoding and rendering

pub mod annotate;
pub mod decoder;

pub use annotate::{annotate_jpeg, AnnotateError};
pub use decoder::{DecodedImage, ImageDecoder, ImageGuard};
