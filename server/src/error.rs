use thiserror::Error;

use tether_shared::{ClientId, Command, SerdeErr, TransportError};

use crate::directory::DirectoryError;

/// Errors reported by the Server through [`ErrorEvent`](crate::ErrorEvent)
/// or returned from its setup methods
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TetherServerError {
    /// Binding, accepting or dialing failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A frame could not be decoded; the connection was closed
    #[error("Malformed frame from client {client_id}: {error}")]
    Malformed { client_id: ClientId, error: SerdeErr },

    /// A command arrived that the connection's state does not accept
    #[error("Client {client_id} sent {command:?} which is not valid in state {state}")]
    UnexpectedCommand {
        client_id: ClientId,
        command: Command,
        state: &'static str,
    },

    /// Client version differs from the server's
    #[error("Client reported version {client_version}, server runs version {server_version}")]
    VersionMismatch {
        client_version: i32,
        server_version: i32,
    },

    /// Directory registration could not start
    #[error("Directory registration error: {0}")]
    Directory(#[from] DirectoryError),

    /// Directory registration was requested before `listen`
    #[error("Server is not listening")]
    NotListening,
}
