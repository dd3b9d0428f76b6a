use std::time::Instant;

use log::{debug, info, warn};

use tether_shared::{versions_compatible, DatagramSocket, DiscoveryPacket, Timer};

use super::{
    directory_poller::DirectoryPoller,
    server_list::{ServerInfo, ServerList, ServerSource},
    ScannerConfig, ScannerError,
};

const PORT_ATTEMPTS: u16 = 64;

struct LocalScan {
    socket: DatagramSocket,
    query_timer: Timer,
}

/// Finds servers on the local network and on directory services. Both may
/// run at once; results are merged into one list during `update`.
pub struct ServerScanner {
    config: ScannerConfig,
    list: ServerList,
    local: Option<LocalScan>,
    directory: Option<DirectoryPoller>,
}

impl ServerScanner {
    pub fn new(config: ScannerConfig) -> Self {
        let list = ServerList::new(config.server_timeout);
        Self {
            config,
            list,
            local: None,
            directory: None,
        }
    }

    pub fn on_new_server<F: FnMut(&ServerInfo) + Send + 'static>(&mut self, callback: F) {
        self.list.on_new_server(Box::new(callback));
    }

    pub fn on_removed_server<F: FnMut(&ServerInfo) + Send + 'static>(&mut self, callback: F) {
        self.list.on_removed_server(Box::new(callback));
    }

    /// Start querying the local network
    pub fn scan_local_network(&mut self) -> Result<(), ScannerError> {
        if self.local.is_some() {
            return Ok(());
        }
        let first_port = self.config.server_port.wrapping_add(1);
        let socket = DatagramSocket::bind_first_free(first_port, PORT_ATTEMPTS)?;
        if let Err(error) = socket.join_multicast(self.config.multicast_group) {
            debug!("scanner not listening to multicast: {}", error);
        }
        info!("scanning local network from {:?}", socket.local_addr().ok());
        self.local = Some(LocalScan {
            socket,
            query_timer: Timer::new_ringing(self.config.broadcast_interval),
        });
        Ok(())
    }

    /// Stop local queries and forget the servers they found
    pub fn stop_local_network(&mut self) {
        if self.local.take().is_some() {
            self.list.remove_source(ServerSource::LocalNetwork);
        }
    }

    /// Start polling the directory listing at `url`
    pub fn scan_directory(&mut self, url: &str) -> Result<(), ScannerError> {
        self.directory = None;
        let poller = DirectoryPoller::start(
            url,
            self.config.version,
            self.config.directory_interval,
            self.config.directory_request_timeout,
        )?;
        info!("polling directory {}", url);
        self.directory = Some(poller);
        Ok(())
    }

    /// Stop polling and forget the servers the directory listed
    pub fn stop_directory(&mut self) {
        if self.directory.take().is_some() {
            self.list.remove_source(ServerSource::Directory);
        }
    }

    pub fn is_scanning_local_network(&self) -> bool {
        self.local.is_some()
    }

    pub fn is_scanning_directory(&self) -> bool {
        self.directory.is_some()
    }

    /// Sends due queries, merges answers and directory results, and evicts
    /// stale entries
    pub fn update(&mut self) {
        let now = Instant::now();
        if let Some(local) = self.local.as_mut() {
            if local.query_timer.ringing() {
                local.query_timer.reset();
                send_queries(local, &self.config);
            }
            receive_answers(local, &self.config, &mut self.list, now);
        }

        if let Some(directory) = self.directory.as_ref() {
            for entry in directory.take_pending() {
                self.list.upsert(
                    ServerSource::Directory,
                    entry.address,
                    &entry.name,
                    entry.version,
                    now,
                );
            }
        }

        self.list.expire(now);
    }

    pub fn servers(&self) -> &[ServerInfo] {
        self.list.servers()
    }
}

fn send_queries(local: &mut LocalScan, config: &ScannerConfig) {
    let query = DiscoveryPacket::query(config.version).to_writer();
    if let Err(error) = local
        .socket
        .send_multicast(&query, config.multicast_group, config.server_port)
    {
        debug!("multicast query failed: {}", error);
    }
    if let Err(error) = local.socket.send_broadcast(&query, config.server_port) {
        debug!("broadcast query failed: {}", error);
    }
    for target in &config.query_targets {
        if let Err(error) = local.socket.send_to(&query, *target) {
            debug!("query to {} failed: {}", target, error);
        }
    }
}

fn receive_answers(
    local: &mut LocalScan,
    config: &ScannerConfig,
    list: &mut ServerList,
    now: Instant,
) {
    loop {
        let (bytes, sender) = match local.socket.receive_from() {
            Ok(Some(datagram)) => datagram,
            Ok(None) => break,
            Err(error) => {
                warn!("discovery receive failed: {}", error);
                break;
            }
        };
        let Some(packet) = DiscoveryPacket::from_bytes(&bytes) else {
            continue;
        };
        if packet.is_query() || !versions_compatible(config.version, packet.version) {
            continue;
        }
        list.upsert(
            ServerSource::LocalNetwork,
            sender,
            &packet.name,
            packet.version,
            now,
        );
    }
}
