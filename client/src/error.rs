use thiserror::Error;

use tether_shared::{Command, ReplicationError, SerdeErr, TransportError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TetherClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Malformed frame from server: {0}")]
    Malformed(#[from] SerdeErr),

    #[error("Replication error: {0}")]
    Replication(#[from] ReplicationError),

    #[error("Server sent {command:?}, which a client does not accept")]
    UnexpectedCommand { command: Command },

    #[error("Client is not connected")]
    NotConnected,
}
