use std::{default::Default, net::SocketAddr, time::Duration};

use tether_shared::{ConnectionConfig, DEFAULT_SERVER_PORT};

/// Contains Config properties which will be used by a Proxy
#[derive(Clone, Debug)]
pub struct ProxyConfig {
    /// Server to dial at start-up. Without it the proxy waits for a server
    /// to dial in.
    pub upstream: Option<SocketAddr>,
    /// Password the proxy itself presents to the server
    pub password: Option<String>,
    /// TCP port downstream clients (and dialing servers) connect to
    pub listen_port: u16,
    /// Used for both upstream and downstream connections
    pub connection: ConnectionConfig,
    /// Upper bound on dialing the server
    pub connect_timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            upstream: None,
            password: None,
            listen_port: DEFAULT_SERVER_PORT,
            connection: ConnectionConfig::default(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}
