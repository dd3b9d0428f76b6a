use std::{io, net::SocketAddr};

use thiserror::Error;

/// Errors that can occur on stream or datagram transports
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The stream was closed by either side
    #[error("Stream is closed")]
    Closed,

    /// An operating system call failed
    #[error("I/O error during {operation}: {message}")]
    Io {
        operation: &'static str,
        kind: io::ErrorKind,
        message: String,
    },

    /// A frame header announced more bytes than the protocol allows
    #[error("Frame of {size} bytes exceeds the {max} byte limit")]
    FrameTooLarge { size: u32, max: u32 },

    /// Outgoing connection could not be established
    #[error("Failed to connect to {address}: {message}")]
    ConnectFailed { address: SocketAddr, message: String },
}

impl TransportError {
    pub fn io(operation: &'static str, error: io::Error) -> Self {
        Self::Io {
            operation,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}
