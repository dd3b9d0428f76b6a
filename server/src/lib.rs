//! # Tether Server
//! An authoritative server that replicates registered objects and
//! Entities/Components to every authenticated client over reliable streams,
//! directly or through proxies, and routes voice between them.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

#[macro_use]
extern crate cfg_if;

cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        compile_error!("'tether_server' listens on native sockets, wasm32 targets are not supported");
    }
}

pub mod shared {
    pub use tether_shared::{
        ByteReader, ByteWriter, ClientId, Command, ConnectionConfig, EntityRef, ObjectId,
        Protocol, Serde, SerdeErr, World,
    };
}

mod connection;
mod directory;
mod discovery;
mod error;
mod events;
mod server;
mod voice;

pub use directory::{DirectoryError, DirectoryState};
pub use error::TetherServerError;
pub use events::{ConnectEvent, DisconnectEvent, ErrorEvent, Event, Events};
pub use server::{Server, ServerConfig};
pub use voice::{BroadcastVoice, VoiceTargetPolicy};
