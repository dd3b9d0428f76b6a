use tether_serde::{ByteReader, ByteWriter, SerdeErr};

use crate::constants::{SERVER_QUERY_NAME, VERIFICATION_NUMBER};

/// Datagram exchanged during local network discovery: a query from a
/// scanner, or an answer/announcement from a server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryPacket {
    pub name: String,
    pub version: i32,
}

impl DiscoveryPacket {
    pub fn query(version: i32) -> Self {
        Self {
            name: SERVER_QUERY_NAME.to_string(),
            version,
        }
    }

    pub fn announce(name: &str, version: i32) -> Self {
        Self {
            name: name.to_string(),
            version,
        }
    }

    pub fn is_query(&self) -> bool {
        self.name == SERVER_QUERY_NAME
    }

    pub fn to_writer(&self) -> ByteWriter {
        let mut writer = ByteWriter::new();
        writer.write(&VERIFICATION_NUMBER);
        writer.write(&self.name);
        writer.write(&self.version);
        writer
    }

    /// `None` for datagrams that do not carry the verification constant or
    /// are truncated
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Self::try_from_bytes(bytes).ok().flatten()
    }

    fn try_from_bytes(bytes: &[u8]) -> Result<Option<Self>, SerdeErr> {
        let mut reader = ByteReader::new(bytes);
        let verification: i32 = reader.try_read()?;
        if verification != VERIFICATION_NUMBER {
            return Ok(None);
        }
        Ok(Some(Self {
            name: reader.try_read()?,
            version: reader.try_read()?,
        }))
    }
}

/// Version 0 on either side matches anything
pub fn versions_compatible(ours: i32, theirs: i32) -> bool {
    ours == theirs || ours == 0 || theirs == 0
}
