use std::net::SocketAddr;

use super::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Connecting,
    Connected,
    Closed,
}

/// Reliable, ordered byte stream. Implementations never block: a return of
/// `Ok(0)` means the call would have blocked, and any error means the stream
/// is closed.
pub trait StreamTransport: Send {
    fn state(&mut self) -> StreamState;

    /// Write as many bytes as the transport accepts right now
    fn send_raw(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Read whatever is available into `buffer`
    fn receive_raw(&mut self, buffer: &mut [u8]) -> Result<usize, TransportError>;

    fn close(&mut self);

    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// Source of newly accepted stream connections
pub trait StreamListener: Send {
    /// Returns `Ok(None)` when nothing is waiting
    fn accept(&mut self) -> Result<Option<Box<dyn StreamTransport>>, TransportError>;

    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}
