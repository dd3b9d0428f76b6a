use std::time::Duration;

/// Marks every discovery datagram as belonging to this protocol
pub const VERIFICATION_NUMBER: i32 = 0x2fab_3f0f;

pub const DEFAULT_SERVER_PORT: u16 = 35666;

/// Largest frame accepted on a stream connection
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Length of the big-endian frame prefix
pub const FRAME_HEADER_SIZE: usize = 4;

pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_DISCONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Name carried by discovery queries, as opposed to server announcements
pub const SERVER_QUERY_NAME: &str = "ServerQuery";

/// First three octets of the discovery multicast group; the group number is
/// the last one
pub const MULTICAST_PREFIX: [u8; 3] = [239, 192, 0];
pub const DEFAULT_MULTICAST_GROUP: u8 = 1;
