/// Where the Client is in its connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatus {
    /// Stream is being established
    Connecting,
    /// Waiting for the server to challenge or accept us
    Authenticating,
    /// Server wants a password; call `Client::send_password`
    WaitingForPassword,
    Connected,
    Disconnected,
}

/// Why the Client is, or is about to be, disconnected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    None,
    FailedToConnect,
    VersionMismatch,
    BadCredentials,
    TimedOut,
    ClosedByServer,
    Unknown,
}
