use std::net::SocketAddr;

use log::{debug, info, warn};

use tether_shared::{
    versions_compatible, DatagramSocket, DiscoveryPacket, Timer, TransportError,
};

use crate::ServerConfig;

/// Answers local-network scanner queries and periodically announces the
/// server to `listen_port + 1`
pub(crate) struct DiscoveryResponder {
    socket: DatagramSocket,
    name: String,
    version: i32,
    announce_port: u16,
    announce_timer: Timer,
}

impl DiscoveryResponder {
    pub fn bind(config: &ServerConfig) -> Result<Self, TransportError> {
        let socket = DatagramSocket::bind(config.listen_port, true)?;
        if let Err(error) = socket.join_multicast(config.multicast_group) {
            warn!("discovery multicast unavailable: {}", error);
        }
        info!("answering discovery queries on UDP port {}", config.listen_port);

        Ok(Self {
            socket,
            name: config.name.clone(),
            version: config.version,
            announce_port: config.listen_port.wrapping_add(1),
            announce_timer: Timer::new_ringing(config.announce_interval),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.socket.local_addr()
    }

    pub fn update(&mut self) {
        loop {
            match self.socket.receive_from() {
                Ok(Some((bytes, address))) => self.answer(&bytes, address),
                Ok(None) => break,
                Err(error) => {
                    warn!("discovery receive failed: {}", error);
                    break;
                }
            }
        }

        if self.announce_timer.ringing() {
            self.announce_timer.reset();
            let packet = DiscoveryPacket::announce(&self.name, self.version).to_writer();
            if let Err(error) = self.socket.send_broadcast(&packet, self.announce_port) {
                debug!("discovery announcement failed: {}", error);
            }
        }
    }

    fn answer(&mut self, bytes: &[u8], address: SocketAddr) {
        let Some(query) = DiscoveryPacket::from_bytes(bytes) else {
            return;
        };
        if !query.is_query() {
            return;
        }
        if !versions_compatible(self.version, query.version) {
            debug!(
                "ignoring discovery query from {} with version {}",
                address, query.version
            );
            return;
        }
        let reply = DiscoveryPacket::announce(&self.name, self.version).to_writer();
        if let Err(error) = self.socket.send_to(&reply, address) {
            debug!("discovery reply to {} failed: {}", address, error);
        }
    }
}
