use thiserror::Error;

use tether_shared::{DirectoryUrlError, TransportError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScannerError {
    #[error("Could not open the discovery socket: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Url(#[from] DirectoryUrlError),

    #[error("Could not build the directory HTTP client: {message}")]
    Client { message: String },

    #[error("Could not start the directory thread: {message}")]
    Thread { message: String },
}
