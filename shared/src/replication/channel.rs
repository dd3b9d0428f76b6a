use std::time::Duration;

use tether_serde::{ByteReader, ByteWriter};

use super::error::ReplicationError;
use crate::{
    command::Command,
    world::{EntityRef, RemoteEntityMap, World},
};

/// Packets produced by a replication pass, in send order
pub type Outbox = Vec<ByteWriter>;

/// One way of mirroring server state onto clients.
///
/// The server calls `send_all` for a client that just joined, `update` once
/// per tick for everybody, and `on_entity_destroyed` for every destruction
/// notification. The client feeds received commands into `receive`.
pub trait ReplicationChannel: Send {
    /// Full snapshot of everything already replicated
    fn send_all(&self, world: &World, outbox: &mut Outbox);

    /// Changes since the previous call
    fn update(&mut self, world: &World, delta: Duration, outbox: &mut Outbox);

    /// Applies `command` if this channel owns it. Returns whether it did.
    fn receive(
        &mut self,
        command: Command,
        reader: &mut ByteReader,
        world: &mut World,
        entities: &mut RemoteEntityMap,
    ) -> Result<bool, ReplicationError>;

    fn on_entity_destroyed(&mut self, entity: EntityRef, outbox: &mut Outbox);
}
