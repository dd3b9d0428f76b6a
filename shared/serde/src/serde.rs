use crate::{byte_reader::ByteReader, byte_writer::ByteWriter, error::SerdeErr};

/// A type that can be written to and read back from a byte buffer
pub trait Serde: Sized + Clone + PartialEq {
    /// Append this value to the writer
    fn ser(&self, writer: &mut ByteWriter);

    /// Parse a value from the reader, advancing it
    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr>;

    /// Number of bytes `ser` appends
    fn byte_length(&self) -> usize;
}
