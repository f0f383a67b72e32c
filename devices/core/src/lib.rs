//! Core traits and types for the sensel host driver.
//!
//! This crate provides:
//! - The `Transport` trait for byte-stream links (serial ports, BLE byte pipes)
//! - The `Decompressor` trait for pressure and label map codecs
//! - Frame and contact content masks
//! - The shared `Error` type, tagged with the protocol `Stage` that raised it

mod decompress;
mod error;
mod mask;
mod transport;

pub use decompress::{Decompressor, NULL_LABEL};
pub use error::{Error, Result, Stage};
pub use mask::{ContactMask, ContentMask};
pub use transport::{read_exact, Transport, DEFAULT_READ_RETRIES};
