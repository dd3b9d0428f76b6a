use tether_serde::{ByteReader, ByteWriter, Serde, SerdeErr};

/// Stable handle to an entity. `version` is bumped every time `index` is
/// recycled, so a handle outliving its entity tests invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityRef {
    pub index: u32,
    pub version: u32,
}

impl EntityRef {
    pub const INVALID: EntityRef = EntityRef {
        index: u32::MAX,
        version: 0,
    };

    pub const fn new(index: u32, version: u32) -> Self {
        Self { index, version }
    }

    pub fn is_invalid(&self) -> bool {
        self.index == u32::MAX
    }
}

impl Default for EntityRef {
    fn default() -> Self {
        Self::INVALID
    }
}

// Full form, as the server writes it
impl Serde for EntityRef {
    fn ser(&self, writer: &mut ByteWriter) {
        writer.write(&self.index);
        writer.write(&self.version);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            index: reader.try_read()?,
            version: reader.try_read()?,
        })
    }

    fn byte_length(&self) -> usize {
        8
    }
}
