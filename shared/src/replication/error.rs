use thiserror::Error;
use tether_serde::SerdeErr;

use crate::{command::Command, types::ComponentIndex};

/// Errors raised while applying replication commands
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplicationError {
    /// Payload could not be decoded
    #[error("Malformed replication payload: {0}")]
    Serde(#[from] SerdeErr),

    /// Component index was never registered in the Protocol
    #[error("Component index {index} is not registered in the Protocol")]
    UnknownComponent { index: ComponentIndex },

    /// This side of the connection never expects the command
    #[error("Command {command:?} is not accepted by this replication channel")]
    UnexpectedCommand { command: Command },
}
