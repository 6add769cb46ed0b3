//! Audio decoding.

pub mod wav;

pub use wav::WavDecoder;
