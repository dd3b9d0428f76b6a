use std::time::{Duration, Instant};

use log::warn;

use tether_shared::{ByteWriter, ClientId, Command, FramedStream, ObjectId, StreamState};

use super::data_rate::DataRate;

/// What the next frame on a connection is expected to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReceiveState {
    /// Waiting for CLIENT_SEND_AUTH
    Auth,
    /// Any command
    Main,
    /// Payload of a client command. `client_id` is `None` when the command
    /// named a client the connection does not own; the payload is dropped.
    Command {
        object_id: ObjectId,
        client_id: Option<ClientId>,
    },
}

impl ReceiveState {
    pub fn name(&self) -> &'static str {
        match self {
            ReceiveState::Auth => "Auth",
            ReceiveState::Main => "Main",
            ReceiveState::Command { .. } => "Command",
        }
    }
}

/// One accepted stream: a direct client, or a proxy carrying several
pub(crate) struct ClientConnection {
    pub stream: FramedStream,
    /// 0 until authenticated
    pub client_id: ClientId,
    pub receive_state: ReceiveState,
    /// Set once the peer acts as a proxy; its own id is then not a player
    pub is_proxy: bool,
    /// Clients relayed through this connection when it is a proxy
    pub proxied_client_ids: Vec<ClientId>,
    round_trip_start: Option<Instant>,
    ping: Option<Duration>,
    last_receive: Instant,
    pub send_rate: DataRate,
    closing: bool,
}

impl ClientConnection {
    pub fn new(stream: FramedStream) -> Self {
        Self {
            stream,
            client_id: 0,
            receive_state: ReceiveState::Auth,
            is_proxy: false,
            proxied_client_ids: Vec::new(),
            round_trip_start: None,
            ping: None,
            last_receive: Instant::now(),
            send_rate: DataRate::new(),
            closing: false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.receive_state != ReceiveState::Auth
    }

    pub fn owns_client(&self, client_id: ClientId) -> bool {
        self.client_id == client_id || self.proxied_client_ids.contains(&client_id)
    }

    /// Every client id carried by this connection
    pub fn client_ids(&self) -> impl Iterator<Item = ClientId> + '_ {
        (self.client_id > 0)
            .then_some(self.client_id)
            .into_iter()
            .chain(self.proxied_client_ids.iter().copied())
    }

    /// Players served by this connection: the peer itself, or the clients
    /// behind it when it is a proxy
    pub fn served_client_ids(&self) -> Vec<ClientId> {
        if self.is_proxy {
            self.proxied_client_ids.clone()
        } else if self.client_id > 0 {
            vec![self.client_id]
        } else {
            Vec::new()
        }
    }

    pub fn send(&mut self, packet: &ByteWriter) {
        if self.closing {
            return;
        }
        if let Err(error) = self.stream.send(packet) {
            warn!("send to client {} failed: {}", self.client_id, error);
            self.closing = true;
        }
    }

    /// Sends a bare command with no payload
    pub fn send_command(&mut self, command: Command) {
        let mut writer = ByteWriter::new();
        writer.write(&command);
        self.send(&writer);
    }

    pub fn mark_received(&mut self) {
        self.last_receive = Instant::now();
    }

    pub fn is_silent_for(&self, timeout: Duration) -> bool {
        self.last_receive.elapsed() > timeout
    }

    pub fn start_round_trip(&mut self) {
        self.round_trip_start = Some(Instant::now());
    }

    pub fn finish_round_trip(&mut self) {
        if let Some(start) = self.round_trip_start.take() {
            self.ping = Some(start.elapsed());
        }
    }

    pub fn ping(&self) -> Option<Duration> {
        self.ping
    }

    pub fn close(&mut self) {
        self.closing = true;
    }

    pub fn should_close(&mut self) -> bool {
        self.closing || self.stream.state() == StreamState::Closed
    }

    /// Flushes queued bytes, recording how many left
    pub fn flush(&mut self) {
        if self.closing {
            return;
        }
        if let Err(error) = self.stream.update() {
            warn!("flush to client {} failed: {}", self.client_id, error);
            self.closing = true;
        }
        let sent = self.stream.take_bytes_sent();
        self.send_rate.record(sent);
    }
}
