use crate::{byte_reader::ByteReader, byte_writer::ByteWriter, error::SerdeErr, serde::Serde};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Vector2<T> {
    pub x: T,
    pub y: T,
}

impl<T> Vector2<T> {
    pub fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Vector3<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

impl<T> Vector3<T> {
    pub fn new(x: T, y: T, z: T) -> Self {
        Self { x, y, z }
    }
}

/// 8-bit RGBA color
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl<T: Serde> Serde for Vector2<T> {
    fn ser(&self, writer: &mut ByteWriter) {
        self.x.ser(writer);
        self.y.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            x: T::de(reader)?,
            y: T::de(reader)?,
        })
    }

    fn byte_length(&self) -> usize {
        self.x.byte_length() + self.y.byte_length()
    }
}

impl<T: Serde> Serde for Vector3<T> {
    fn ser(&self, writer: &mut ByteWriter) {
        self.x.ser(writer);
        self.y.ser(writer);
        self.z.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            x: T::de(reader)?,
            y: T::de(reader)?,
            z: T::de(reader)?,
        })
    }

    fn byte_length(&self) -> usize {
        self.x.byte_length() + self.y.byte_length() + self.z.byte_length()
    }
}

impl Serde for Color {
    fn ser(&self, writer: &mut ByteWriter) {
        writer.write_raw(&[self.r, self.g, self.b, self.a]);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let [r, g, b, a] = reader.read_array::<4>()?;
        Ok(Self { r, g, b, a })
    }

    fn byte_length(&self) -> usize {
        4
    }
}
