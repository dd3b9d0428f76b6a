use std::{default::Default, time::Duration};

use tether_shared::ConnectionConfig;

/// Contains Config properties which will be used by a Client
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Protocol version sent to the server. 0 matches every server version.
    pub version: i32,
    /// Password offered when the server asks for one. Without it the Client
    /// waits in `WaitingForPassword` for `send_password`.
    pub password: Option<String>,
    /// Used to configure the connection with the Server
    pub connection: ConnectionConfig,
    /// Upper bound on dialing the server
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: 0,
            password: None,
            connection: ConnectionConfig::default(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}
