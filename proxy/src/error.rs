use thiserror::Error;

use tether_shared::{SerdeErr, TransportError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Malformed frame from server: {0}")]
    Malformed(#[from] SerdeErr),

    /// The server rejected the proxy's own password
    #[error("Server rejected the proxy's credentials")]
    UpstreamRejected,

    /// The server closed the connection or went silent
    #[error("Lost the connection to the server")]
    UpstreamLost,
}
