use std::time::{Duration, Instant};

use log::warn;

use tether_shared::{ByteWriter, ClientId, Command, FramedStream};

/// The proxy's own connection to the server
pub(crate) struct Upstream {
    pub stream: FramedStream,
    /// Learned from the server's REQUEST_AUTH
    pub server_version: Option<i32>,
    pub requires_password: bool,
    /// The proxy's own id, 0 until authenticated
    pub client_id: ClientId,
    pub auth_sent: bool,
    last_receive: Instant,
    failed: bool,
}

impl Upstream {
    pub fn new(stream: FramedStream) -> Self {
        Self {
            stream,
            server_version: None,
            requires_password: false,
            client_id: 0,
            auth_sent: false,
            last_receive: Instant::now(),
            failed: false,
        }
    }

    /// Version and password requirement to challenge downstream clients
    /// with, once known
    pub fn challenge(&self) -> Option<(i32, bool)> {
        self.server_version
            .map(|version| (version, self.requires_password))
    }

    pub fn send(&mut self, packet: &ByteWriter) {
        self.send_frame(packet.as_slice());
    }

    pub fn send_frame(&mut self, frame: &[u8]) {
        if self.failed {
            return;
        }
        if let Err(error) = self.stream.send_frame(frame) {
            warn!("send to server failed: {}", error);
            self.failed = true;
        }
    }

    pub fn send_command(&mut self, command: Command) {
        let mut packet = ByteWriter::new();
        packet.write(&command);
        self.send(&packet);
    }

    pub fn mark_received(&mut self) {
        self.last_receive = Instant::now();
    }

    pub fn is_silent_for(&self, timeout: Duration) -> bool {
        self.last_receive.elapsed() > timeout
    }

    pub fn flush(&mut self) {
        if self.failed {
            return;
        }
        if let Err(error) = self.stream.update() {
            warn!("flush to server failed: {}", error);
            self.failed = true;
        }
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }
}
