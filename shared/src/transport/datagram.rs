use std::{
    io,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket},
};

use socket2::{Domain, Protocol, Socket, Type};
use tether_serde::ByteWriter;

use super::error::TransportError;
use crate::constants::MULTICAST_PREFIX;

const RECEIVE_BUFFER_SIZE: usize = 2048;

/// Address of discovery multicast group `group_nr`
pub fn multicast_group(group_nr: u8) -> Ipv4Addr {
    let [a, b, c] = MULTICAST_PREFIX;
    Ipv4Addr::new(a, b, c, group_nr)
}

/// Non-blocking UDP socket used for discovery traffic
pub struct DatagramSocket {
    socket: UdpSocket,
    buffer: Box<[u8]>,
}

impl DatagramSocket {
    /// Bind to `port` on every interface. With `shared` set, several
    /// processes on one host may bind the same port.
    pub fn bind(port: u16, shared: bool) -> Result<Self, TransportError> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| TransportError::io("socket", e))?;

        if shared {
            socket
                .set_reuse_address(true)
                .map_err(|e| TransportError::io("set_reuse_address", e))?;
            #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
            socket
                .set_reuse_port(true)
                .map_err(|e| TransportError::io("set_reuse_port", e))?;
        }
        socket
            .set_broadcast(true)
            .map_err(|e| TransportError::io("set_broadcast", e))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| TransportError::io("set_nonblocking", e))?;

        let address = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        socket
            .bind(&SocketAddr::V4(address).into())
            .map_err(|e| TransportError::io("bind", e))?;

        Ok(Self {
            socket: socket.into(),
            buffer: vec![0; RECEIVE_BUFFER_SIZE].into_boxed_slice(),
        })
    }

    /// Bind the first port at or above `start_port` that nobody else holds
    pub fn bind_first_free(start_port: u16, attempts: u16) -> Result<Self, TransportError> {
        let mut last_error = TransportError::Closed;
        for offset in 0..attempts.max(1) {
            let Some(port) = start_port.checked_add(offset) else {
                break;
            };
            match Self::bind(port, false) {
                Ok(socket) => return Ok(socket),
                Err(error) => last_error = error,
            }
        }
        Err(last_error)
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.socket
            .local_addr()
            .map_err(|e| TransportError::io("local_addr", e))
    }

    pub fn join_multicast(&self, group_nr: u8) -> Result<(), TransportError> {
        self.socket
            .join_multicast_v4(&multicast_group(group_nr), &Ipv4Addr::UNSPECIFIED)
            .map_err(|e| TransportError::io("join_multicast", e))?;
        self.socket
            .set_multicast_loop_v4(true)
            .map_err(|e| TransportError::io("set_multicast_loop", e))
    }

    /// Send one datagram. A full socket buffer drops the datagram.
    pub fn send_to(&self, packet: &ByteWriter, address: SocketAddr) -> Result<(), TransportError> {
        match self.socket.send_to(packet.as_slice(), address) {
            Ok(_) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(error) => Err(TransportError::io("send_to", error)),
        }
    }

    pub fn send_broadcast(&self, packet: &ByteWriter, port: u16) -> Result<(), TransportError> {
        self.send_to(
            packet,
            SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::BROADCAST, port)),
        )
    }

    pub fn send_multicast(
        &self,
        packet: &ByteWriter,
        group_nr: u8,
        port: u16,
    ) -> Result<(), TransportError> {
        self.send_to(
            packet,
            SocketAddr::V4(SocketAddrV4::new(multicast_group(group_nr), port)),
        )
    }

    /// Returns the next waiting datagram and its sender
    pub fn receive_from(&mut self) -> Result<Option<(Vec<u8>, SocketAddr)>, TransportError> {
        match self.socket.recv_from(&mut self.buffer) {
            Ok((length, sender)) => Ok(Some((self.buffer[..length].to_vec(), sender))),
            Err(error)
                if error.kind() == io::ErrorKind::WouldBlock
                    || error.kind() == io::ErrorKind::Interrupted =>
            {
                Ok(None)
            }
            Err(error) => Err(TransportError::io("recv_from", error)),
        }
    }
}
