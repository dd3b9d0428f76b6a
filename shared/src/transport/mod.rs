mod datagram;
mod error;
mod framed_stream;
mod local;
mod stream;
mod tcp;

pub use datagram::{multicast_group, DatagramSocket};
pub use error::TransportError;
pub use framed_stream::FramedStream;
pub use local::{local_listener, LocalConnector, LocalListener, LocalTransport};
pub use stream::{StreamListener, StreamState, StreamTransport};
pub use tcp::{TcpAcceptor, TcpTransport};
