use std::time::{Duration, Instant};

use log::debug;

use tether_shared::{ByteWriter, ClientId, FramedStream, ObjectId, StreamState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DownstreamState {
    /// Waiting for CLIENT_SEND_AUTH
    Auth,
    /// Credentials forwarded, waiting for the server's verdict
    AwaitingId,
    Main,
    /// Next frame is the payload of a command for `object_id`. The header is
    /// held back so both frames reach the server back to back.
    Command { object_id: ObjectId },
}

/// One client connected to the proxy
pub(crate) struct Downstream {
    pub stream: FramedStream,
    pub temp_id: i32,
    /// Id the server assigned; set once committed
    pub real_id: Option<ClientId>,
    pub state: DownstreamState,
    /// Whether REQUEST_AUTH was sent since the last rejection
    pub challenged: bool,
    last_receive: Instant,
    closing: bool,
}

impl Downstream {
    pub fn new(stream: FramedStream, temp_id: i32) -> Self {
        Self {
            stream,
            temp_id,
            real_id: None,
            state: DownstreamState::Auth,
            challenged: false,
            last_receive: Instant::now(),
            closing: false,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.real_id.is_some()
    }

    pub fn send(&mut self, packet: &ByteWriter) {
        self.send_frame(packet.as_slice());
    }

    pub fn send_frame(&mut self, frame: &[u8]) {
        if self.closing {
            return;
        }
        if let Err(error) = self.stream.send_frame(frame) {
            debug!("send to proxy client {} failed: {}", self.temp_id, error);
            self.closing = true;
        }
    }

    pub fn mark_received(&mut self) {
        self.last_receive = Instant::now();
    }

    pub fn is_silent_for(&self, timeout: Duration) -> bool {
        self.last_receive.elapsed() > timeout
    }

    pub fn close(&mut self) {
        self.closing = true;
    }

    pub fn should_close(&mut self) -> bool {
        self.closing || self.stream.state() == StreamState::Closed
    }

    pub fn flush(&mut self) {
        if self.closing {
            return;
        }
        if let Err(error) = self.stream.update() {
            debug!("flush to proxy client {} failed: {}", self.temp_id, error);
            self.closing = true;
        }
    }
}
