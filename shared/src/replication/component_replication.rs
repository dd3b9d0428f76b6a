use std::collections::BTreeMap;

use tether_serde::{ByteReader, ByteWriter, SerdeErr};

use super::channel::Outbox;
use crate::{
    command::Command,
    types::ComponentIndex,
    world::{
        Component, EntityRef, EntityWriter, HostEntityConverter, RemoteEntityMap,
        RemoteEntityReader, World,
    },
};

/// Type-erased replication state for one component type
pub trait ComponentReplicationBase: Send {
    fn component_index(&self) -> ComponentIndex;

    /// Set commands for every live component
    fn send_all(&self, world: &World, outbox: &mut Outbox);

    /// Set commands for new or changed components, delete commands for
    /// removed ones
    fn update(&mut self, world: &World, outbox: &mut Outbox);

    /// Forgets the snapshot slot of a destroyed entity. Returns whether
    /// there was one.
    fn on_entity_destroyed(&mut self, entity: EntityRef) -> bool;

    fn receive_set(
        &mut self,
        remote: EntityRef,
        reader: &mut ByteReader,
        world: &mut World,
        entities: &mut RemoteEntityMap,
    ) -> Result<(), SerdeErr>;

    fn receive_delete(&mut self, remote: EntityRef, world: &mut World, entities: &RemoteEntityMap);

    /// Number of entities whose state was last sent
    fn snapshot_len(&self) -> usize;
}

/// Replicates every `T` in the world. Keeps a copy of the last-sent value
/// per entity index, guarded by the entity version.
pub struct ComponentReplication<T: Component> {
    component_index: ComponentIndex,
    snapshot: BTreeMap<u32, (u32, T)>,
}

impl<T: Component> ComponentReplication<T> {
    pub fn new(component_index: ComponentIndex) -> Self {
        Self {
            component_index,
            snapshot: BTreeMap::new(),
        }
    }

    fn set_packet(&self, entity: EntityRef, value: &T, entities: &dyn EntityWriter) -> ByteWriter {
        let mut writer = ByteWriter::new();
        writer.write(&Command::EcsSetComponent);
        writer.write(&self.component_index);
        entities.write_entity(&entity, &mut writer);
        value.write(&mut writer, entities);
        writer
    }

    fn delete_packet(&self, entity: EntityRef, entities: &dyn EntityWriter) -> ByteWriter {
        let mut writer = ByteWriter::new();
        writer.write(&Command::EcsDelComponent);
        writer.write(&self.component_index);
        entities.write_entity(&entity, &mut writer);
        writer
    }
}

impl<T: Component> ComponentReplicationBase for ComponentReplication<T> {
    fn component_index(&self) -> ComponentIndex {
        self.component_index
    }

    fn send_all(&self, world: &World, outbox: &mut Outbox) {
        let entities = HostEntityConverter::new(world);
        for (entity, value) in world.iter::<T>() {
            outbox.push(self.set_packet(entity, value, &entities));
        }
    }

    fn update(&mut self, world: &World, outbox: &mut Outbox) {
        let entities = HostEntityConverter::new(world);

        for (entity, value) in world.iter::<T>() {
            let unchanged = matches!(
                self.snapshot.get(&entity.index),
                Some((version, previous)) if *version == entity.version && previous == value
            );
            if unchanged {
                continue;
            }
            outbox.push(self.set_packet(entity, value, &entities));
            self.snapshot
                .insert(entity.index, (entity.version, value.clone()));
        }

        let removed: Vec<EntityRef> = self
            .snapshot
            .iter()
            .map(|(index, (version, _))| EntityRef::new(*index, *version))
            .filter(|entity| !world.has::<T>(*entity))
            .collect();
        for entity in removed {
            self.snapshot.remove(&entity.index);
            outbox.push(self.delete_packet(entity, &entities));
        }
    }

    fn on_entity_destroyed(&mut self, entity: EntityRef) -> bool {
        match self.snapshot.get(&entity.index) {
            Some((version, _)) if *version == entity.version => {
                self.snapshot.remove(&entity.index);
                true
            }
            _ => false,
        }
    }

    fn receive_set(
        &mut self,
        remote: EntityRef,
        reader: &mut ByteReader,
        world: &mut World,
        entities: &mut RemoteEntityMap,
    ) -> Result<(), SerdeErr> {
        let local = entities.resolve_or_spawn(remote, world);
        let value = {
            let mut reader_entities = RemoteEntityReader::new(entities, world);
            T::read(reader, &mut reader_entities)?
        };
        world.insert(local, value);
        Ok(())
    }

    fn receive_delete(&mut self, remote: EntityRef, world: &mut World, entities: &RemoteEntityMap) {
        if let Some(local) = entities.local(remote) {
            world.remove::<T>(local);
        }
    }

    fn snapshot_len(&self) -> usize {
        self.snapshot.len()
    }
}
