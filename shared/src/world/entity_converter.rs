use std::collections::HashMap;

use log::debug;
use tether_serde::{ByteReader, ByteWriter, Serde, SerdeErr};

use super::{entity::EntityRef, world::World};

/// Writes entity references into outgoing buffers
pub trait EntityWriter {
    fn write_entity(&self, entity: &EntityRef, writer: &mut ByteWriter);
}

/// Reads entity references out of incoming buffers
pub trait EntityReader {
    fn read_entity(&mut self, reader: &mut ByteReader) -> Result<EntityRef, SerdeErr>;
}

/// Server-side conversion. Outgoing references carry `{index, version}`;
/// client-authored references carry only the index and resolve to whatever
/// entity currently lives there.
pub struct HostEntityConverter<'w> {
    world: &'w World,
}

impl<'w> HostEntityConverter<'w> {
    pub fn new(world: &'w World) -> Self {
        Self { world }
    }
}

impl EntityWriter for HostEntityConverter<'_> {
    fn write_entity(&self, entity: &EntityRef, writer: &mut ByteWriter) {
        entity.ser(writer);
    }
}

impl EntityReader for HostEntityConverter<'_> {
    fn read_entity(&mut self, reader: &mut ByteReader) -> Result<EntityRef, SerdeErr> {
        let index: u32 = reader.try_read()?;
        Ok(self.world.entity_at(index).unwrap_or(EntityRef::INVALID))
    }
}

/// Client-side mapping between server entity references and local entities
#[derive(Debug, Default)]
pub struct RemoteEntityMap {
    to_local: HashMap<u32, (u32, EntityRef)>,
    to_remote: HashMap<EntityRef, EntityRef>,
}

impl RemoteEntityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local entity for `remote`, spawning one on first sight. A version
    /// change at a known index replaces the stale local entity.
    pub fn resolve_or_spawn(&mut self, remote: EntityRef, world: &mut World) -> EntityRef {
        if remote.is_invalid() {
            return EntityRef::INVALID;
        }
        if let Some((version, local)) = self.to_local.get(&remote.index).copied() {
            if version == remote.version && world.is_alive(local) {
                return local;
            }
            debug!(
                "remote entity {} changed version {} -> {}, replacing local entity",
                remote.index, version, remote.version
            );
            self.to_remote.remove(&local);
            world.destroy(local);
        }

        let local = world.spawn();
        self.to_local.insert(remote.index, (remote.version, local));
        self.to_remote.insert(local, remote);
        local
    }

    /// Local entity for `remote`, without spawning
    pub fn local(&self, remote: EntityRef) -> Option<EntityRef> {
        self.to_local
            .get(&remote.index)
            .filter(|(version, _)| *version == remote.version)
            .map(|(_, local)| *local)
    }

    pub fn remote(&self, local: EntityRef) -> Option<EntityRef> {
        self.to_remote.get(&local).copied()
    }

    /// Forget `remote`, returning the local entity it mapped to
    pub fn remove_remote(&mut self, remote: EntityRef) -> Option<EntityRef> {
        let local = self.local(remote)?;
        self.to_local.remove(&remote.index);
        self.to_remote.remove(&local);
        Some(local)
    }

    /// Every local entity currently mirroring a server entity
    pub fn locals(&self) -> impl Iterator<Item = EntityRef> + '_ {
        self.to_remote.keys().copied()
    }

    pub fn clear(&mut self) {
        self.to_local.clear();
        self.to_remote.clear();
    }

    pub fn len(&self) -> usize {
        self.to_local.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_local.is_empty()
    }
}

// Client-authored references are the server index alone
impl EntityWriter for RemoteEntityMap {
    fn write_entity(&self, entity: &EntityRef, writer: &mut ByteWriter) {
        let index = self
            .remote(*entity)
            .map(|remote| remote.index)
            .unwrap_or(EntityRef::INVALID.index);
        writer.write(&index);
    }
}

/// Reads server references on the client, spawning local entities as needed
pub struct RemoteEntityReader<'a> {
    map: &'a mut RemoteEntityMap,
    world: &'a mut World,
}

impl<'a> RemoteEntityReader<'a> {
    pub fn new(map: &'a mut RemoteEntityMap, world: &'a mut World) -> Self {
        Self { map, world }
    }
}

impl EntityReader for RemoteEntityReader<'_> {
    fn read_entity(&mut self, reader: &mut ByteReader) -> Result<EntityRef, SerdeErr> {
        let remote: EntityRef = reader.try_read()?;
        Ok(self.map.resolve_or_spawn(remote, self.world))
    }
}
