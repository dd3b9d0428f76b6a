use std::{collections::BTreeMap, collections::HashMap, time::Duration};

use log::{debug, warn};
use tether_serde::{ByteReader, ByteWriter};

use super::{
    channel::{Outbox, ReplicationChannel},
    error::ReplicationError,
    object::{ClientCommand, Replicate},
};
use crate::{
    command::Command,
    types::{ClientId, FieldIndex, ObjectId},
    world::{
        EntityReader, EntityRef, EntityWriter, HostEntityConverter, RemoteEntityMap,
        RemoteEntityReader, World,
    },
};

/// Constructs an empty object of a registered class
pub type ClassFactory = fn() -> Box<dyn Replicate>;

struct ObjectRecord {
    object: Box<dyn Replicate>,
    replicated: bool,
    destroyed: bool,
}

/// Id-based replication. On the server it owns registered objects and
/// emits CREATE / UPDATE_VALUE / DELETE; on the client it rebuilds them from
/// those commands.
pub struct ObjectChannel {
    classes: HashMap<&'static str, ClassFactory>,
    objects: BTreeMap<ObjectId, ObjectRecord>,
    next_id: ObjectId,
}

impl ObjectChannel {
    pub fn new(classes: HashMap<&'static str, ClassFactory>) -> Self {
        Self {
            classes,
            objects: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Takes ownership of `object` and assigns the next id. It is created on
    /// clients during the next update.
    pub fn register(&mut self, object: Box<dyn Replicate>) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(
            id,
            ObjectRecord {
                object,
                replicated: false,
                destroyed: false,
            },
        );
        id
    }

    /// Marks the object for deletion on every client. Returns false for
    /// unknown ids.
    pub fn destroy(&mut self, id: ObjectId) -> bool {
        match self.objects.get_mut(&id) {
            Some(record) if !record.destroyed => {
                record.destroyed = true;
                true
            }
            _ => false,
        }
    }

    pub fn get<T: Replicate>(&self, id: ObjectId) -> Option<&T> {
        self.objects
            .get(&id)
            .filter(|record| !record.destroyed)
            .and_then(|record| record.object.as_any().downcast_ref::<T>())
    }

    pub fn get_mut<T: Replicate>(&mut self, id: ObjectId) -> Option<&mut T> {
        self.objects
            .get_mut(&id)
            .filter(|record| !record.destroyed)
            .and_then(|record| record.object.as_any_mut().downcast_mut::<T>())
    }

    pub fn get_dyn(&self, id: ObjectId) -> Option<&dyn Replicate> {
        self.objects
            .get(&id)
            .filter(|record| !record.destroyed)
            .map(|record| record.object.as_ref())
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.get_dyn(id).is_some()
    }

    /// Ids of objects not marked destroyed
    pub fn ids(&self) -> Vec<ObjectId> {
        self.objects
            .iter()
            .filter(|(_, record)| !record.destroyed)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Routes a client command payload to its target object
    pub fn dispatch_client_command(
        &mut self,
        id: ObjectId,
        client_id: ClientId,
        payload: &[u8],
        world: &World,
    ) -> bool {
        let Some(record) = self.objects.get_mut(&id).filter(|record| !record.destroyed) else {
            debug!("dropping command from client {} for unknown object {}", client_id, id);
            return false;
        };
        let mut command = ClientCommand::new(client_id, payload, world);
        record.object.on_client_command(&mut command);
        true
    }

    /// Drops objects deleted by the server, returning their ids
    pub fn cleanup(&mut self) -> Vec<ObjectId> {
        let removed: Vec<ObjectId> = self
            .objects
            .iter()
            .filter(|(_, record)| record.destroyed)
            .map(|(id, _)| *id)
            .collect();
        for id in &removed {
            self.objects.remove(id);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    fn create_packet(
        id: ObjectId,
        object: &dyn Replicate,
        entities: &dyn EntityWriter,
    ) -> ByteWriter {
        let mut writer = ByteWriter::new();
        writer.write(&Command::Create);
        writer.write(&id);
        writer.write(&object.class_name().to_string());
        for index in 0..object.field_count() {
            if let Some(field) = object.field(index) {
                writer.write(&index);
                field.write_full(&mut writer, entities);
            }
        }
        writer
    }

    fn update_packet(
        id: ObjectId,
        object: &mut dyn Replicate,
        delta: Duration,
        entities: &dyn EntityWriter,
    ) -> Option<ByteWriter> {
        let mut writer = ByteWriter::new();
        writer.write(&Command::UpdateValue);
        writer.write(&id);

        let mut count = 0;
        for index in 0..object.field_count() {
            let Some(field) = object.field_mut(index) else {
                continue;
            };
            if !field.timing().is_due(delta) {
                continue;
            }
            if field.changed() {
                writer.write(&index);
                field.write(&mut writer, entities);
                field.timing().restart();
                count += 1;
            }
        }

        (count > 0).then_some(writer)
    }

    fn read_fields(
        object: &mut dyn Replicate,
        reader: &mut ByteReader,
        entities: &mut dyn EntityReader,
    ) -> Result<(), ReplicationError> {
        while reader.available() > 0 {
            let index: FieldIndex = reader.try_read()?;
            let Some(field) = object.field_mut(index) else {
                warn!(
                    "{} has no field {}, skipping the rest of the packet",
                    object.class_name(),
                    index
                );
                reader.take_remaining();
                break;
            };
            field.read(reader, entities)?;
        }
        Ok(())
    }

    fn receive_create(
        &mut self,
        reader: &mut ByteReader,
        world: &mut World,
        entities: &mut RemoteEntityMap,
    ) -> Result<(), ReplicationError> {
        let id: ObjectId = reader.try_read()?;
        let class_name: String = reader.try_read()?;

        if self.contains(id) {
            debug!("ignoring CREATE for existing object {}", id);
            return Ok(());
        }
        let Some(factory) = self.classes.get(class_name.as_str()) else {
            warn!("CREATE for unregistered class {} (object {})", class_name, id);
            return Ok(());
        };

        let mut object = factory();
        let mut reader_entities = RemoteEntityReader::new(entities, world);
        Self::read_fields(object.as_mut(), reader, &mut reader_entities)?;
        self.objects.insert(
            id,
            ObjectRecord {
                object,
                replicated: true,
                destroyed: false,
            },
        );
        Ok(())
    }

    fn receive_update(
        &mut self,
        reader: &mut ByteReader,
        world: &mut World,
        entities: &mut RemoteEntityMap,
    ) -> Result<(), ReplicationError> {
        let id: ObjectId = reader.try_read()?;
        let Some(record) = self.objects.get_mut(&id).filter(|record| !record.destroyed) else {
            debug!("UPDATE_VALUE for unknown object {}", id);
            return Ok(());
        };
        let mut reader_entities = RemoteEntityReader::new(entities, world);
        Self::read_fields(record.object.as_mut(), reader, &mut reader_entities)
    }
}

impl ReplicationChannel for ObjectChannel {
    fn send_all(&self, world: &World, outbox: &mut Outbox) {
        let entities = HostEntityConverter::new(world);
        for (id, record) in &self.objects {
            if record.replicated && !record.destroyed {
                outbox.push(Self::create_packet(*id, record.object.as_ref(), &entities));
            }
        }
    }

    fn update(&mut self, world: &World, delta: Duration, outbox: &mut Outbox) {
        let entities = HostEntityConverter::new(world);
        let mut deleted = Vec::new();

        for (id, record) in self.objects.iter_mut() {
            if record.destroyed {
                // never created on any client
                if record.replicated {
                    let mut writer = ByteWriter::new();
                    writer.write(&Command::Delete);
                    writer.write(id);
                    outbox.push(writer);
                }
                deleted.push(*id);
                continue;
            }

            if !record.replicated {
                outbox.push(Self::create_packet(*id, record.object.as_ref(), &entities));
                // prime snapshots so the CREATE values are not resent
                for index in 0..record.object.field_count() {
                    if let Some(field) = record.object.field_mut(index) {
                        field.changed();
                    }
                }
                record.replicated = true;
                continue;
            }

            if let Some(packet) =
                Self::update_packet(*id, record.object.as_mut(), delta, &entities)
            {
                outbox.push(packet);
            }
        }

        for id in deleted {
            self.objects.remove(&id);
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
            Command::Create => self.receive_create(reader, world, entities)?,
            Command::UpdateValue => self.receive_update(reader, world, entities)?,
            Command::Delete => {
                let id: ObjectId = reader.try_read()?;
                if let Some(record) = self.objects.get_mut(&id) {
                    record.destroyed = true;
                }
            }
            Command::ServerCommand => {
                let id: ObjectId = reader.try_read()?;
                match self.objects.get_mut(&id).filter(|record| !record.destroyed) {
                    Some(record) => record.object.on_server_command(reader),
                    None => debug!("SERVER_COMMAND for unknown object {}", id),
                }
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn on_entity_destroyed(&mut self, _entity: EntityRef, _outbox: &mut Outbox) {}
}
