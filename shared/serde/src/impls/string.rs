use crate::{byte_reader::ByteReader, byte_writer::ByteWriter, error::SerdeErr, serde::Serde};

// u32 byte length, then UTF-8 bytes
impl Serde for String {
    fn ser(&self, writer: &mut ByteWriter) {
        writer.write(&(self.len() as u32));
        writer.write_raw(self.as_bytes());
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let length = u32::de(reader)? as usize;
        let bytes = reader.read_bytes(length)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| SerdeErr::InvalidUtf8)
    }

    fn byte_length(&self) -> usize {
        4 + self.len()
    }
}
