use std::time::Duration;

use log::debug;
use tether_serde::{ByteReader, ByteWriter};

use super::{
    channel::{Outbox, ReplicationChannel},
    component_replication::ComponentReplicationBase,
    error::ReplicationError,
};
use crate::{
    command::Command,
    types::ComponentIndex,
    world::{EntityRef, RemoteEntityMap, World},
};

/// ECS-based replication: one descriptor per registered component type
pub struct ComponentChannels {
    channels: Vec<Box<dyn ComponentReplicationBase>>,
}

impl ComponentChannels {
    pub fn new(channels: Vec<Box<dyn ComponentReplicationBase>>) -> Self {
        Self { channels }
    }

    pub fn get(&self, index: ComponentIndex) -> Option<&dyn ComponentReplicationBase> {
        self.channels.get(index as usize).map(|channel| channel.as_ref())
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    fn channel_mut(
        &mut self,
        index: ComponentIndex,
    ) -> Result<&mut Box<dyn ComponentReplicationBase>, ReplicationError> {
        self.channels
            .get_mut(index as usize)
            .ok_or(ReplicationError::UnknownComponent { index })
    }
}

impl ReplicationChannel for ComponentChannels {
    fn send_all(&self, world: &World, outbox: &mut Outbox) {
        for channel in &self.channels {
            channel.send_all(world, outbox);
        }
    }

    fn update(&mut self, world: &World, _delta: Duration, outbox: &mut Outbox) {
        for channel in &mut self.channels {
            channel.update(world, outbox);
        }
    }

    fn receive(
        &mut self,
        command: Command,
        reader: &mut ByteReader,
        world: &mut World,
        entities: &mut RemoteEntityMap,
    ) -> Result<bool, ReplicationError> {
        match command {
            Command::EcsSetComponent => {
                let index: ComponentIndex = reader.try_read()?;
                let remote: EntityRef = reader.try_read()?;
                self.channel_mut(index)?
                    .receive_set(remote, reader, world, entities)?;
            }
            Command::EcsDelComponent => {
                let index: ComponentIndex = reader.try_read()?;
                let remote: EntityRef = reader.try_read()?;
                self.channel_mut(index)?
                    .receive_delete(remote, world, entities);
            }
            Command::EcsDestroyEntity => {
                let remote: EntityRef = reader.try_read()?;
                match entities.remove_remote(remote) {
                    Some(local) => {
                        world.destroy(local);
                    }
                    None => debug!("destroy for unmapped remote entity {:?}", remote),
                }
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn on_entity_destroyed(&mut self, entity: EntityRef, outbox: &mut Outbox) {
        let mut replicated = false;
        for channel in &mut self.channels {
            replicated |= channel.on_entity_destroyed(entity);
        }
        if replicated {
            let mut writer = ByteWriter::new();
            writer.write(&Command::EcsDestroyEntity);
            writer.write(&entity);
            outbox.push(writer);
        }
    }
}
