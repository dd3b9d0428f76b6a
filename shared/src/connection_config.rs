use std::{default::Default, time::Duration};

use crate::constants::{DEFAULT_DISCONNECT_TIMEOUT, DEFAULT_KEEP_ALIVE_INTERVAL};

/// Contains Config properties which will be used by a Server, Client or
/// Proxy connection
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// The duration to wait for communication from a remote host before
    /// initiating a disconnect
    pub disconnection_timeout_duration: Duration,
    /// The duration to wait before sending a keep-alive message to the
    /// remote host, if no other data has been sent
    pub keep_alive_interval: Duration,
}

impl ConnectionConfig {
    /// Creates a new ConnectionConfig, used to initialize a connection
    pub fn new(disconnection_timeout_duration: Duration, keep_alive_interval: Duration) -> Self {
        ConnectionConfig {
            disconnection_timeout_duration,
            keep_alive_interval,
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            disconnection_timeout_duration: DEFAULT_DISCONNECT_TIMEOUT,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
        }
    }
}
