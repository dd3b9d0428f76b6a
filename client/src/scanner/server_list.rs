use std::{
    fmt, mem,
    net::SocketAddr,
    time::{Duration, Instant},
};

use log::info;

/// Where a server was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerSource {
    LocalNetwork,
    Directory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerInfo {
    pub source: ServerSource,
    pub address: SocketAddr,
    pub name: String,
    pub version: i32,
    pub last_seen: Instant,
}

pub type ServerCallback = Box<dyn FnMut(&ServerInfo) + Send>;

/// Servers seen recently, one entry per source and address
pub struct ServerList {
    servers: Vec<ServerInfo>,
    server_timeout: Duration,
    on_new: Option<ServerCallback>,
    on_removed: Option<ServerCallback>,
}

impl ServerList {
    pub fn new(server_timeout: Duration) -> Self {
        Self {
            servers: Vec::new(),
            server_timeout,
            on_new: None,
            on_removed: None,
        }
    }

    pub fn on_new_server(&mut self, callback: ServerCallback) {
        self.on_new = Some(callback);
    }

    pub fn on_removed_server(&mut self, callback: ServerCallback) {
        self.on_removed = Some(callback);
    }

    /// Inserts or refreshes an entry. Returns whether it was new.
    pub fn upsert(
        &mut self,
        source: ServerSource,
        address: SocketAddr,
        name: &str,
        version: i32,
        now: Instant,
    ) -> bool {
        if let Some(server) = self
            .servers
            .iter_mut()
            .find(|server| server.source == source && server.address == address)
        {
            server.name = name.to_string();
            server.version = version;
            server.last_seen = now;
            return false;
        }

        let server = ServerInfo {
            source,
            address,
            name: name.to_string(),
            version,
            last_seen: now,
        };
        info!("found server '{}' at {} ({:?})", server.name, address, source);
        if let Some(callback) = self.on_new.as_mut() {
            callback(&server);
        }
        self.servers.push(server);
        true
    }

    /// Evicts entries not refreshed within the server timeout
    pub fn expire(&mut self, now: Instant) -> Vec<ServerInfo> {
        let timeout = self.server_timeout;
        self.remove_where(|server| now.saturating_duration_since(server.last_seen) > timeout)
    }

    /// Evicts every entry found through `source`
    pub fn remove_source(&mut self, source: ServerSource) -> Vec<ServerInfo> {
        self.remove_where(|server| server.source == source)
    }

    pub fn servers(&self) -> &[ServerInfo] {
        &self.servers
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    fn remove_where<F: Fn(&ServerInfo) -> bool>(&mut self, predicate: F) -> Vec<ServerInfo> {
        let (removed, kept): (Vec<ServerInfo>, Vec<ServerInfo>) =
            mem::take(&mut self.servers).into_iter().partition(|server| predicate(server));
        self.servers = kept;

        for server in &removed {
            info!("lost server '{}' at {}", server.name, server.address);
            if let Some(callback) = self.on_removed.as_mut() {
                callback(server);
            }
        }
        removed
    }
}

impl fmt::Debug for ServerList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerList")
            .field("servers", &self.servers)
            .field("server_timeout", &self.server_timeout)
            .finish()
    }
}
