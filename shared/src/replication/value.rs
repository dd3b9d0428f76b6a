use tether_serde::{ByteReader, ByteWriter, Color, Serde, SerdeErr, Vector2, Vector3};

use crate::world::{EntityReader, EntityRef, EntityWriter};

/// A value that can travel inside a replicated field or component.
///
/// Plain data is written with its [`Serde`] encoding. Entity references go
/// through the entity converter of whichever side is writing.
pub trait Replicable: Clone + PartialEq + Send + 'static {
    fn write(&self, writer: &mut ByteWriter, entities: &dyn EntityWriter);

    fn read(reader: &mut ByteReader, entities: &mut dyn EntityReader) -> Result<Self, SerdeErr>;
}

macro_rules! impl_replicable_for_serde {
    ($($ty:ty),*) => {
        $(
            impl Replicable for $ty {
                fn write(&self, writer: &mut ByteWriter, _: &dyn EntityWriter) {
                    self.ser(writer);
                }

                fn read(reader: &mut ByteReader, _: &mut dyn EntityReader) -> Result<Self, SerdeErr> {
                    reader.try_read()
                }
            }
        )*
    };
}

impl_replicable_for_serde!(bool, u8, i8, u16, i16, u32, i32, u64, i64, f32, f64, String, Color);

impl<T: Serde + Send + 'static> Replicable for Vector2<T> {
    fn write(&self, writer: &mut ByteWriter, _: &dyn EntityWriter) {
        self.ser(writer);
    }

    fn read(reader: &mut ByteReader, _: &mut dyn EntityReader) -> Result<Self, SerdeErr> {
        reader.try_read()
    }
}

impl<T: Serde + Send + 'static> Replicable for Vector3<T> {
    fn write(&self, writer: &mut ByteWriter, _: &dyn EntityWriter) {
        self.ser(writer);
    }

    fn read(reader: &mut ByteReader, _: &mut dyn EntityReader) -> Result<Self, SerdeErr> {
        reader.try_read()
    }
}

impl Replicable for EntityRef {
    fn write(&self, writer: &mut ByteWriter, entities: &dyn EntityWriter) {
        entities.write_entity(self, writer);
    }

    fn read(reader: &mut ByteReader, entities: &mut dyn EntityReader) -> Result<Self, SerdeErr> {
        entities.read_entity(reader)
    }
}

// u32 count, then each element
impl<T: Replicable> Replicable for Vec<T> {
    fn write(&self, writer: &mut ByteWriter, entities: &dyn EntityWriter) {
        writer.write(&(self.len() as u32));
        for item in self {
            item.write(writer, entities);
        }
    }

    fn read(reader: &mut ByteReader, entities: &mut dyn EntityReader) -> Result<Self, SerdeErr> {
        let count: u32 = reader.try_read()?;
        let mut items = Vec::new();
        for _ in 0..count {
            items.push(T::read(reader, entities)?);
        }
        Ok(items)
    }
}

/// Implements [`Replicable`] for a struct by writing the listed fields in
/// order. Every field of the struct must be listed.
///
/// ```
/// use tether_shared::{impl_replicable, Vector2};
///
/// #[derive(Clone, PartialEq)]
/// struct Position {
///     point: Vector2<f32>,
///     layer: u8,
/// }
///
/// impl_replicable!(Position { point, layer });
/// ```
#[macro_export]
macro_rules! impl_replicable {
    ($ty:ident { $($field:ident),* $(,)? }) => {
        impl $crate::Replicable for $ty {
            fn write(
                &self,
                writer: &mut $crate::ByteWriter,
                entities: &dyn $crate::EntityWriter,
            ) {
                $( $crate::Replicable::write(&self.$field, writer, entities); )*
            }

            fn read(
                reader: &mut $crate::ByteReader,
                entities: &mut dyn $crate::EntityReader,
            ) -> Result<Self, $crate::SerdeErr> {
                Ok(Self {
                    $( $field: $crate::Replicable::read(reader, entities)?, )*
                })
            }
        }
    };
}
