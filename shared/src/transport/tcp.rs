use std::{
    io::{self, Read, Write},
    net::{Shutdown, SocketAddr, TcpListener, TcpStream},
    time::{Duration, Instant},
};

use log::{debug, info};
use socket2::{Domain, Protocol, Socket, Type};

use super::{
    error::TransportError,
    stream::{StreamListener, StreamState, StreamTransport},
};

cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android"))] {
        const EINPROGRESS: i32 = 115;
    } else if #[cfg(unix)] {
        const EINPROGRESS: i32 = 36;
    } else {
        // WSAEWOULDBLOCK surfaces as ErrorKind::WouldBlock
        const EINPROGRESS: i32 = i32::MIN;
    }
}

fn connect_in_progress(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::WouldBlock || error.raw_os_error() == Some(EINPROGRESS)
}

/// Non-blocking TCP stream
pub struct TcpTransport {
    stream: TcpStream,
    state: StreamState,
    peer: Option<SocketAddr>,
    /// Give up on a pending connect after this instant
    connect_deadline: Option<Instant>,
}

impl TcpTransport {
    /// Start connecting to `address` without blocking. The transport reports
    /// `Connecting` until the handshake completes, and `Closed` if it fails
    /// or takes longer than `timeout`.
    pub fn connect(address: SocketAddr, timeout: Duration) -> Result<Self, TransportError> {
        let connect_failed = |error: io::Error| TransportError::ConnectFailed {
            address,
            message: error.to_string(),
        };

        let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))
            .map_err(connect_failed)?;
        socket.set_nonblocking(true).map_err(connect_failed)?;
        let state = match socket.connect(&address.into()) {
            Ok(()) => StreamState::Connected,
            Err(error) if connect_in_progress(&error) => StreamState::Connecting,
            Err(error) => return Err(connect_failed(error)),
        };
        let stream: TcpStream = socket.into();
        if let Err(error) = stream.set_nodelay(true) {
            debug!("unable to disable Nagle: {}", error);
        }

        let connected = state == StreamState::Connected;
        Ok(Self {
            stream,
            state,
            peer: connected.then_some(address),
            connect_deadline: (!connected).then(|| Instant::now() + timeout),
        })
    }

    pub fn from_stream(stream: TcpStream) -> Result<Self, TransportError> {
        stream
            .set_nonblocking(true)
            .map_err(|e| TransportError::io("set_nonblocking", e))?;
        if let Err(error) = stream.set_nodelay(true) {
            debug!("unable to disable Nagle: {}", error);
        }
        let peer = stream.peer_addr().ok();
        Ok(Self {
            stream,
            state: StreamState::Connected,
            peer,
            connect_deadline: None,
        })
    }

    /// Moves a pending connect to `Connected` or `Closed` once the socket
    /// knows the outcome
    fn poll_connect(&mut self) {
        if self.state != StreamState::Connecting {
            return;
        }
        match self.stream.take_error() {
            Ok(None) => {}
            Ok(Some(error)) | Err(error) => {
                info!("connect failed: {}", error);
                self.state = StreamState::Closed;
                return;
            }
        }
        match self.stream.peer_addr() {
            Ok(peer) => {
                self.peer = Some(peer);
                self.state = StreamState::Connected;
                self.connect_deadline = None;
            }
            Err(_) => {
                if self.connect_deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    info!("connect timed out");
                    let _ = self.stream.shutdown(Shutdown::Both);
                    self.state = StreamState::Closed;
                }
            }
        }
    }

    fn fail(&mut self, operation: &'static str, error: io::Error) -> TransportError {
        self.state = StreamState::Closed;
        TransportError::io(operation, error)
    }
}

impl StreamTransport for TcpTransport {
    fn state(&mut self) -> StreamState {
        self.poll_connect();
        self.state
    }

    fn send_raw(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        match self.state() {
            StreamState::Closed => return Err(TransportError::Closed),
            StreamState::Connecting => return Ok(0),
            StreamState::Connected => {}
        }
        if data.is_empty() {
            return Ok(0);
        }
        match self.stream.write(data) {
            Ok(0) => {
                self.state = StreamState::Closed;
                Err(TransportError::Closed)
            }
            Ok(written) => Ok(written),
            Err(error)
                if error.kind() == io::ErrorKind::WouldBlock
                    || error.kind() == io::ErrorKind::Interrupted =>
            {
                Ok(0)
            }
            Err(error) => Err(self.fail("send", error)),
        }
    }

    fn receive_raw(&mut self, buffer: &mut [u8]) -> Result<usize, TransportError> {
        match self.state() {
            StreamState::Closed => return Err(TransportError::Closed),
            StreamState::Connecting => return Ok(0),
            StreamState::Connected => {}
        }
        match self.stream.read(buffer) {
            // orderly shutdown by the peer
            Ok(0) if !buffer.is_empty() => {
                self.state = StreamState::Closed;
                Err(TransportError::Closed)
            }
            Ok(read) => Ok(read),
            Err(error)
                if error.kind() == io::ErrorKind::WouldBlock
                    || error.kind() == io::ErrorKind::Interrupted =>
            {
                Ok(0)
            }
            Err(error) => Err(self.fail("receive", error)),
        }
    }

    fn close(&mut self) {
        if self.state != StreamState::Closed {
            let _ = self.stream.shutdown(Shutdown::Both);
            self.state = StreamState::Closed;
        }
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}

/// Non-blocking TCP listener
pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    pub fn bind(address: SocketAddr) -> Result<Self, TransportError> {
        let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| TransportError::io("socket", e))?;
        socket
            .set_reuse_address(true)
            .map_err(|e| TransportError::io("set_reuse_address", e))?;
        socket
            .bind(&address.into())
            .map_err(|e| TransportError::io("bind", e))?;
        socket
            .listen(128)
            .map_err(|e| TransportError::io("listen", e))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| TransportError::io("set_nonblocking", e))?;

        Ok(Self {
            listener: socket.into(),
        })
    }
}

impl StreamListener for TcpAcceptor {
    fn accept(&mut self) -> Result<Option<Box<dyn StreamTransport>>, TransportError> {
        match self.listener.accept() {
            Ok((stream, address)) => {
                debug!("accepted stream connection from {}", address);
                Ok(Some(Box::new(TcpTransport::from_stream(stream)?)))
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(TransportError::io("accept", error)),
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }
}
