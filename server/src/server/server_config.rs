use std::{default::Default, time::Duration};

use tether_shared::{ConnectionConfig, DEFAULT_MULTICAST_GROUP, DEFAULT_SERVER_PORT};

/// Contains Config properties which will be used by the Server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Name advertised to scanners and to the directory
    pub name: String,
    /// Protocol version clients must match. 0 accepts every client version.
    pub version: i32,
    /// Password clients must present, if any
    pub password: Option<String>,
    /// TCP port for client connections; discovery uses the same UDP port
    pub listen_port: u16,
    /// Used to configure the connections with Clients
    pub connection: ConnectionConfig,
    /// Whether to answer local discovery queries and announce the server
    pub discovery: bool,
    /// Last octet of the discovery multicast group
    pub multicast_group: u8,
    /// How often the server announces itself on the local network
    pub announce_interval: Duration,
    /// How often the directory registration is refreshed
    pub directory_refresh_interval: Duration,
    /// Upper bound on a single directory HTTP request
    pub directory_request_timeout: Duration,
    /// Upper bound on dialing a proxy
    pub connect_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "tether".to_string(),
            version: 0,
            password: None,
            listen_port: DEFAULT_SERVER_PORT,
            connection: ConnectionConfig::default(),
            discovery: true,
            multicast_group: DEFAULT_MULTICAST_GROUP,
            announce_interval: Duration::from_secs(5),
            directory_refresh_interval: Duration::from_secs(60),
            directory_request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
        }
    }
}
