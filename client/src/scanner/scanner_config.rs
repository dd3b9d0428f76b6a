use std::{default::Default, net::SocketAddr, time::Duration};

use tether_shared::{DEFAULT_MULTICAST_GROUP, DEFAULT_SERVER_PORT};

/// Contains Config properties which will be used by a ServerScanner
#[derive(Clone, Debug)]
pub struct ScannerConfig {
    /// Only servers compatible with this version are listed
    pub version: i32,
    /// Port servers answer discovery queries on. The scanner binds the first
    /// free port above it.
    pub server_port: u16,
    /// Last octet of the discovery multicast group
    pub multicast_group: u8,
    /// How often local queries are sent
    pub broadcast_interval: Duration,
    /// Entries not refreshed for this long are dropped
    pub server_timeout: Duration,
    /// How often the directory listing is fetched
    pub directory_interval: Duration,
    /// Upper bound on a single directory HTTP request
    pub directory_request_timeout: Duration,
    /// Unicast addresses queried in addition to multicast and broadcast
    pub query_targets: Vec<SocketAddr>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            version: 0,
            server_port: DEFAULT_SERVER_PORT,
            multicast_group: DEFAULT_MULTICAST_GROUP,
            broadcast_interval: Duration::from_secs(5),
            server_timeout: Duration::from_secs(30),
            directory_interval: Duration::from_secs(10),
            directory_request_timeout: Duration::from_secs(10),
            query_targets: Vec::new(),
        }
    }
}
