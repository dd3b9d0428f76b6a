//! # Tether Shared
//! Common functionality shared between tether-server, tether-client &
//! tether-proxy crates: the stream and datagram transports, the command set,
//! entity identity and the replication channels.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

#[macro_use]
extern crate cfg_if;

cfg_if! {
    if #[cfg(target_arch = "wasm32")]
    {
        compile_error!("'tether_shared' needs native stream and datagram sockets, wasm32 targets are not supported");
    }
}

pub use tether_serde::{
    serde_enum, ByteReader, ByteWriter, Color, Serde, SerdeErr, Vector2, Vector3,
};

mod backends;
mod command;
mod connection_config;
mod constants;
mod directory_url;
mod discovery;
mod protocol;
mod replication;
mod transport;
mod types;
mod world;

pub use backends::Timer;
pub use command::Command;
pub use connection_config::ConnectionConfig;
pub use constants::{
    DEFAULT_DISCONNECT_TIMEOUT, DEFAULT_KEEP_ALIVE_INTERVAL, DEFAULT_MULTICAST_GROUP,
    DEFAULT_SERVER_PORT, FRAME_HEADER_SIZE, MAX_FRAME_SIZE, MULTICAST_PREFIX, SERVER_QUERY_NAME,
    VERIFICATION_NUMBER,
};
pub use directory_url::{parse_directory_url, DirectoryUrlError};
pub use discovery::{versions_compatible, DiscoveryPacket};
pub use protocol::{Protocol, ProtocolError, ProtocolPlugin};
pub use replication::{
    ClassFactory, ClientCommand, ComponentChannels, ComponentReplication,
    ComponentReplicationBase, Field, FieldTiming, ObjectChannel, Outbox, Replicable, Replicate,
    ReplicatedField, ReplicationChannel, ReplicationError, SequenceField,
};
pub use transport::{
    local_listener, multicast_group, DatagramSocket, FramedStream, LocalConnector, LocalListener,
    LocalTransport, StreamListener, StreamState, StreamTransport, TcpAcceptor, TcpTransport,
    TransportError,
};
pub use types::{ClientId, ComponentIndex, FieldIndex, ObjectId, SERVER_CLIENT_ID};
pub use world::{
    Component, EntityPool, EntityReader, EntityRef, EntityWriter, HostEntityConverter,
    RemoteEntityMap, RemoteEntityReader, World,
};
