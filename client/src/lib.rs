//! # Tether Client
//! A client that connects to a tether server (directly or through a proxy),
//! mirrors its replicated objects and Entities/Components into a local
//! [`World`](tether_shared::World), and scans for servers on the local
//! network and on directory services.

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
        compile_error!("'tether_client' dials native sockets, wasm32 targets are not supported");
    }
}

pub mod shared {
    pub use tether_shared::{
        ByteReader, ByteWriter, ClientId, Command, ConnectionConfig, EntityRef, ObjectId,
        Protocol, Serde, SerdeErr, World,
    };
}

mod client;
mod client_config;
mod error;
mod status;
mod voice;

pub mod scanner;

pub use client::Client;
pub use client_config::ClientConfig;
pub use error::TetherClientError;
pub use status::{ClientStatus, DisconnectReason};
pub use voice::{VoicePacket, VoiceStreams};
