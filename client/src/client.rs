use std::{
    net::SocketAddr,
    time::{Duration, Instant},
};

use log::{debug, info, warn};

use tether_shared::{
    versions_compatible, ByteReader, ByteWriter, ClientId, Command, ComponentChannels,
    EntityRef, EntityWriter, FramedStream, ObjectChannel, ObjectId, Protocol, RemoteEntityMap,
    Replicate, ReplicationChannel, StreamState, StreamTransport, TcpTransport, TransportError,
    World,
};

use crate::{
    ClientConfig, ClientStatus, DisconnectReason, TetherClientError, VoicePacket, VoiceStreams,
};

/// Mirrors a server's replicated objects and components. Driven by calling
/// `update` once per frame.
pub struct Client {
    config: ClientConfig,
    objects: ObjectChannel,
    components: ComponentChannels,
    entities: RemoteEntityMap,
    stream: Option<FramedStream>,
    status: ClientStatus,
    disconnect_reason: DisconnectReason,
    client_id: ClientId,
    server_version: Option<i32>,
    game_speed: f32,
    password_sent: bool,
    stale_entities: bool,
    last_receive: Instant,
    voice: VoiceStreams,
}

impl Client {
    /// Create a new Client
    pub fn new(client_config: ClientConfig, mut protocol: Protocol) -> Self {
        protocol.lock();
        Self {
            config: client_config,
            objects: protocol.object_channel(),
            components: protocol.component_channels(),
            entities: RemoteEntityMap::new(),
            stream: None,
            status: ClientStatus::Disconnected,
            disconnect_reason: DisconnectReason::None,
            client_id: 0,
            server_version: None,
            game_speed: 1.0,
            password_sent: false,
            stale_entities: false,
            last_receive: Instant::now(),
            voice: VoiceStreams::new(),
        }
    }

    // Connection

    /// Dial a server or proxy over TCP
    pub fn connect(&mut self, address: SocketAddr) -> Result<(), TetherClientError> {
        self.status = ClientStatus::Connecting;
        match TcpTransport::connect(address, self.config.connect_timeout) {
            Ok(transport) => {
                info!("connecting to {}", address);
                self.connect_with(Box::new(transport));
                Ok(())
            }
            Err(error) => {
                warn!("could not connect to {}: {}", address, error);
                self.status = ClientStatus::Disconnected;
                self.disconnect_reason = DisconnectReason::FailedToConnect;
                Err(error.into())
            }
        }
    }

    /// Use an already established stream, e.g. an in-memory one
    pub fn connect_with(&mut self, transport: Box<dyn StreamTransport>) {
        self.stream = Some(FramedStream::new(transport));
        self.status = ClientStatus::Connecting;
        self.disconnect_reason = DisconnectReason::None;
        self.client_id = 0;
        self.server_version = None;
        self.password_sent = false;
        self.last_receive = Instant::now();
        self.objects.clear();
        self.stale_entities = !self.entities.is_empty();
    }

    pub fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
            info!("disconnected from server");
        }
        self.status = ClientStatus::Disconnected;
    }

    pub fn status(&self) -> ClientStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == ClientStatus::Connected
    }

    pub fn disconnect_reason(&self) -> DisconnectReason {
        self.disconnect_reason
    }

    /// Id assigned by the server, 0 until connected
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Version the server announced in its last challenge
    pub fn server_version(&self) -> Option<i32> {
        self.server_version
    }

    pub fn game_speed(&self) -> f32 {
        self.game_speed
    }

    // Objects

    pub fn object<T: Replicate>(&self, object_id: ObjectId) -> Option<&T> {
        self.objects.get::<T>(object_id)
    }

    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.objects.ids()
    }

    /// Server entity reference for a local entity, as written into command
    /// payloads
    pub fn write_entity(&self, entity: &EntityRef, writer: &mut ByteWriter) {
        self.entities.write_entity(entity, writer);
    }

    pub fn local_entity(&self, remote: EntityRef) -> Option<EntityRef> {
        self.entities.local(remote)
    }

    // Outgoing

    /// Sends `payload` to the server-side object's command handler
    pub fn send_command(
        &mut self,
        object_id: ObjectId,
        payload: &ByteWriter,
    ) -> Result<(), TetherClientError> {
        self.require_connected()?;
        let mut header = ByteWriter::new();
        header.write(&Command::ClientCommand);
        header.write(&object_id);
        self.send(&header)?;
        self.send(payload)
    }

    /// Answers a password challenge
    pub fn send_password(&mut self, password: &str) -> Result<(), TetherClientError> {
        if self.stream.is_none() {
            return Err(TetherClientError::NotConnected);
        }
        self.send_auth(password)?;
        self.password_sent = true;
        self.status = ClientStatus::Authenticating;
        self.disconnect_reason = DisconnectReason::BadCredentials;
        Ok(())
    }

    /// Starts a voice stream. `target` is interpreted by the server's voice
    /// policy.
    pub fn start_voice(&mut self, target: i32) -> Result<(), TetherClientError> {
        self.require_connected()?;
        let mut packet = ByteWriter::new();
        packet.write(&Command::AudioCommStart);
        packet.write(&target);
        self.send(&packet)
    }

    /// Sends one encoded chunk of the current voice stream
    pub fn send_voice(&mut self, bytes: &[u8]) -> Result<(), TetherClientError> {
        self.require_connected()?;
        let mut packet = ByteWriter::with_capacity(2 + bytes.len());
        packet.write(&Command::AudioCommData);
        packet.write_raw(bytes);
        self.send(&packet)
    }

    pub fn stop_voice(&mut self) -> Result<(), TetherClientError> {
        self.require_connected()?;
        self.send_command_only(Command::AudioCommStop)
    }

    /// Queue of voice received from other clients, for the playback thread
    pub fn voice_streams(&self) -> VoiceStreams {
        self.voice.clone()
    }

    // Update

    /// Receives and applies everything the server sent, keeps the
    /// connection alive, and flushes outgoing data
    pub fn update(&mut self, world: &mut World) {
        self.objects.cleanup();
        if self.stale_entities {
            let stale: Vec<EntityRef> = self.entities.locals().collect();
            for entity in stale {
                world.destroy(entity);
            }
            self.entities.clear();
            self.stale_entities = false;
        }

        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        if self.status == ClientStatus::Connecting {
            match stream.state() {
                StreamState::Connecting => return,
                StreamState::Connected => self.status = ClientStatus::Authenticating,
                StreamState::Closed => {
                    self.lose_connection(DisconnectReason::FailedToConnect);
                    return;
                }
            }
        }

        loop {
            let frame = match self.receive() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(error) => {
                    debug!("server stream ended: {}", error);
                    self.lose_connection(DisconnectReason::ClosedByServer);
                    return;
                }
            };
            self.last_receive = Instant::now();

            if let Err(error) = self.handle_frame(&frame, world) {
                warn!("closing connection: {}", error);
                self.lose_connection(DisconnectReason::Unknown);
                return;
            }
            if self.stream.is_none() {
                return;
            }
        }

        if self.last_receive.elapsed() > self.disconnect_timeout() {
            info!("server went silent");
            self.disconnect_reason = DisconnectReason::TimedOut;
            self.lose_connection(DisconnectReason::TimedOut);
            return;
        }

        if let Some(stream) = self.stream.as_mut() {
            if let Err(error) = stream.update() {
                debug!("flush failed: {}", error);
                self.lose_connection(DisconnectReason::ClosedByServer);
            }
        }
    }

    // Private methods

    fn handle_frame(&mut self, frame: &[u8], world: &mut World) -> Result<(), TetherClientError> {
        let mut reader = ByteReader::new(frame);
        let command: Command = reader.try_read()?;
        let handshake = matches!(
            command,
            Command::Alive | Command::RequestAuth | Command::SetClientId
        );
        if self.status != ClientStatus::Connected && !handshake {
            debug!("ignoring {:?} before the handshake completed", command);
            return Ok(());
        }
        match command {
            Command::Alive => self.send_command_only(Command::AliveResp)?,
            Command::RequestAuth => {
                let version: i32 = reader.try_read()?;
                let requires_password: bool = reader.try_read()?;
                self.on_request_auth(version, requires_password)?;
            }
            Command::SetClientId => {
                self.client_id = reader.try_read()?;
                self.status = ClientStatus::Connected;
                self.disconnect_reason = DisconnectReason::None;
                info!("connected as client {}", self.client_id);
            }
            Command::SetGameSpeed => self.game_speed = reader.try_read()?,
            Command::Create
            | Command::UpdateValue
            | Command::Delete
            | Command::ServerCommand => {
                self.objects
                    .receive(command, &mut reader, world, &mut self.entities)?;
            }
            Command::EcsSetComponent | Command::EcsDelComponent | Command::EcsDestroyEntity => {
                self.components
                    .receive(command, &mut reader, world, &mut self.entities)?;
            }
            Command::AudioCommStart => {
                let speaker: ClientId = reader.try_read()?;
                self.voice.push(VoicePacket::Start { speaker });
            }
            Command::AudioCommData => {
                let speaker: ClientId = reader.try_read()?;
                let bytes = reader.take_remaining().to_vec();
                self.voice.push(VoicePacket::Data { speaker, bytes });
            }
            Command::AudioCommStop => {
                let speaker: ClientId = reader.try_read()?;
                self.voice.push(VoicePacket::Stop { speaker });
            }
            command => return Err(TetherClientError::UnexpectedCommand { command }),
        }
        Ok(())
    }

    fn on_request_auth(
        &mut self,
        server_version: i32,
        requires_password: bool,
    ) -> Result<(), TetherClientError> {
        self.server_version = Some(server_version);

        if !versions_compatible(self.config.version, server_version) {
            warn!(
                "server runs version {}, this client version {}",
                server_version, self.config.version
            );
            self.disconnect_reason = DisconnectReason::VersionMismatch;
            self.status = ClientStatus::Authenticating;
            return self.send_auth("");
        }

        if !requires_password {
            self.status = ClientStatus::Authenticating;
            return self.send_auth("");
        }

        // a repeated challenge means the last password was rejected
        match self.config.password.clone() {
            Some(password) if !self.password_sent => {
                self.password_sent = true;
                self.status = ClientStatus::Authenticating;
                self.disconnect_reason = DisconnectReason::BadCredentials;
                self.send_auth(&password)
            }
            _ => {
                info!("server requires a password");
                self.status = ClientStatus::WaitingForPassword;
                Ok(())
            }
        }
    }

    fn send_auth(&mut self, password: &str) -> Result<(), TetherClientError> {
        let mut packet = ByteWriter::new();
        packet.write(&Command::ClientSendAuth);
        packet.write(&self.config.version);
        packet.write(&password.to_string());
        self.send(&packet)
    }

    fn send_command_only(&mut self, command: Command) -> Result<(), TetherClientError> {
        let mut packet = ByteWriter::new();
        packet.write(&command);
        self.send(&packet)
    }

    fn send(&mut self, packet: &ByteWriter) -> Result<(), TetherClientError> {
        let stream = self.stream.as_mut().ok_or(TetherClientError::NotConnected)?;
        stream.send(packet)?;
        Ok(())
    }

    fn receive(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        match self.stream.as_mut() {
            Some(stream) => stream.receive(),
            None => Ok(None),
        }
    }

    fn require_connected(&self) -> Result<(), TetherClientError> {
        if self.status == ClientStatus::Connected && self.stream.is_some() {
            Ok(())
        } else {
            Err(TetherClientError::NotConnected)
        }
    }

    fn disconnect_timeout(&self) -> Duration {
        self.config.connection.disconnection_timeout_duration
    }

    /// Closes the stream. `reason` is kept only if nothing more specific was
    /// recorded earlier.
    fn lose_connection(&mut self, reason: DisconnectReason) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
        self.status = ClientStatus::Disconnected;
        if self.disconnect_reason == DisconnectReason::None {
            self.disconnect_reason = reason;
        }
        info!("connection lost: {:?}", self.disconnect_reason);
    }
}
