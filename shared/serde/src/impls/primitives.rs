use crate::{byte_reader::ByteReader, byte_writer::ByteWriter, error::SerdeErr, serde::Serde};

macro_rules! impl_serde_number {
    ($($ty:ty),*) => {
        $(
            impl Serde for $ty {
                fn ser(&self, writer: &mut ByteWriter) {
                    writer.write_raw(&self.to_be_bytes());
                }

                fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
                    Ok(<$ty>::from_be_bytes(reader.read_array()?))
                }

                fn byte_length(&self) -> usize {
                    std::mem::size_of::<$ty>()
                }
            }
        )*
    };
}

impl_serde_number!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl Serde for bool {
    fn ser(&self, writer: &mut ByteWriter) {
        writer.write_byte(u8::from(*self));
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let [byte] = reader.read_array::<1>()?;
        Ok(byte != 0)
    }

    fn byte_length(&self) -> usize {
        1
    }
}
