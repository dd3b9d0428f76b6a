//! # Tether Serde
//! Byte-oriented codec for the tether wire protocol. Every multi-byte value
//! is written big-endian.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod byte_reader;
mod byte_writer;
mod error;
mod impls;
mod macros;
mod serde;

pub use byte_reader::ByteReader;
pub use byte_writer::ByteWriter;
pub use error::SerdeErr;
pub use impls::{Color, Vector2, Vector3};
pub use serde::Serde;
