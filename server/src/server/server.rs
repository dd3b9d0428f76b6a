use std::{
    mem,
    net::{Ipv4Addr, SocketAddr},
    time::{Duration, Instant},
};

use log::{debug, info, warn};

use tether_shared::{
    versions_compatible, ByteReader, ByteWriter, ClientId, Command, ComponentChannels,
    FramedStream, ObjectChannel, ObjectId, Outbox, Protocol, Replicate, ReplicationChannel, Serde,
    StreamListener, StreamTransport, TcpAcceptor, TcpTransport, Timer, TransportError, World,
    SERVER_CLIENT_ID,
};

use crate::{
    connection::{ClientConnection, ReceiveState},
    directory::{DirectoryRegistration, DirectoryState},
    discovery::DiscoveryResponder,
    voice::{VoiceRouter, VoiceTargetPolicy},
    Events, ServerConfig, TetherServerError,
};

/// Voice traffic is routed once every connection has been drained, since
/// it fans out to connections other than the sender's
enum VoiceAction {
    Start { speaker: ClientId, target: i32 },
    Data { speaker: ClientId, bytes: Vec<u8> },
    Stop { speaker: ClientId },
    Leave { client_id: ClientId },
}

/// An authoritative server. Owns the replicated objects, watches a [`World`]
/// for replicated components, and keeps every authenticated client (direct or
/// behind a proxy) in sync with both.
pub struct Server {
    config: ServerConfig,
    objects: ObjectChannel,
    components: ComponentChannels,
    listener: Option<Box<dyn StreamListener>>,
    connections: Vec<ClientConnection>,
    next_client_id: ClientId,
    game_speed: f32,
    sent_game_speed: f32,
    keep_alive_timer: Timer,
    discovery: Option<DiscoveryResponder>,
    directory: Option<DirectoryRegistration>,
    voice: VoiceRouter,
    incoming_events: Events,
    update_time: Duration,
}

impl Server {
    /// Create a new Server
    pub fn new(server_config: ServerConfig, mut protocol: Protocol) -> Self {
        protocol.lock();
        let keep_alive_interval = server_config.connection.keep_alive_interval;

        Self {
            config: server_config,
            objects: protocol.object_channel(),
            components: protocol.component_channels(),
            listener: None,
            connections: Vec::new(),
            next_client_id: 1,
            game_speed: 1.0,
            sent_game_speed: 1.0,
            keep_alive_timer: Timer::new(keep_alive_interval),
            discovery: None,
            directory: None,
            voice: VoiceRouter::new(),
            incoming_events: Events::new(),
            update_time: Duration::ZERO,
        }
    }

    // Listening

    /// Accept TCP clients on every interface at the configured port, and
    /// answer discovery queries on the same UDP port
    pub fn listen(&mut self) -> Result<(), TetherServerError> {
        let address = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.config.listen_port));
        let acceptor = TcpAcceptor::bind(address)?;
        info!("server '{}' listening on {}", self.config.name, address);
        self.listener = Some(Box::new(acceptor));

        if self.config.discovery {
            match DiscoveryResponder::bind(&self.config) {
                Ok(discovery) => self.discovery = Some(discovery),
                Err(error) => warn!("local discovery disabled: {}", error),
            }
        }
        Ok(())
    }

    /// Accept clients from any listener, e.g. an in-memory one
    pub fn listen_with(&mut self, listener: Box<dyn StreamListener>) {
        self.listener = Some(listener);
    }

    /// Returns whether or not the Server has a listener to accept Clients on
    pub fn is_listening(&self) -> bool {
        self.listener.is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|listener| listener.local_addr())
    }

    pub fn discovery_addr(&self) -> Option<SocketAddr> {
        self.discovery
            .as_ref()
            .and_then(|discovery| discovery.local_addr().ok())
    }

    /// Dial a proxy, which then relays its own clients to this server
    pub fn connect_to_proxy(&mut self, address: SocketAddr) -> Result<(), TetherServerError> {
        let transport = TcpTransport::connect(address, self.config.connect_timeout)?;
        info!("connecting to proxy at {}", address);
        self.connect_to_proxy_with(Box::new(transport));
        Ok(())
    }

    pub fn connect_to_proxy_with(&mut self, transport: Box<dyn StreamTransport>) {
        let mut connection = ClientConnection::new(FramedStream::new(transport));
        connection.is_proxy = true;
        connection.send_command(Command::ServerConnectToProxy);
        send_request_auth(&self.config, &mut connection);
        self.connections.push(connection);
    }

    // Objects

    /// Registers an object for replication. Clients receive it on the next
    /// update.
    pub fn register_object<T: Replicate>(&mut self, object: T) -> ObjectId {
        self.objects.register(Box::new(object))
    }

    pub fn object<T: Replicate>(&self, object_id: ObjectId) -> Option<&T> {
        self.objects.get::<T>(object_id)
    }

    pub fn object_mut<T: Replicate>(&mut self, object_id: ObjectId) -> Option<&mut T> {
        self.objects.get_mut::<T>(object_id)
    }

    /// Deletes the object on every client during the next update
    pub fn destroy_object(&mut self, object_id: ObjectId) -> bool {
        self.objects.destroy(object_id)
    }

    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.objects.ids()
    }

    /// Sends SERVER_COMMAND to the object on every client. `payload` is
    /// appended as-is after the object id.
    pub fn broadcast_server_command(&mut self, object_id: ObjectId, payload: &ByteWriter) {
        let mut packet = ByteWriter::with_capacity(payload.len() + 6);
        packet.write(&Command::ServerCommand);
        packet.write(&object_id);
        packet.write_raw(payload.as_slice());
        self.broadcast(&packet);
    }

    /// Runs a client command on the server's own copy of the object, as
    /// client 0
    pub fn send_local_command(
        &mut self,
        object_id: ObjectId,
        payload: &ByteWriter,
        world: &World,
    ) -> bool {
        self.objects
            .dispatch_client_command(object_id, SERVER_CLIENT_ID, payload.as_slice(), world)
    }

    // Settings

    pub fn set_game_speed(&mut self, game_speed: f32) {
        self.game_speed = game_speed;
    }

    pub fn game_speed(&self) -> f32 {
        self.game_speed
    }

    /// Applies to authentication attempts from now on
    pub fn set_password(&mut self, password: Option<String>) {
        self.config.password = password;
    }

    pub fn set_voice_policy<P: VoiceTargetPolicy + 'static>(&mut self, policy: P) {
        self.voice.set_policy(Box::new(policy));
    }

    // Directory

    /// Keep this server listed on the directory at `url`, refreshing
    /// periodically on a background thread
    pub fn register_on_directory(&mut self, url: &str) -> Result<(), TetherServerError> {
        if !self.is_listening() {
            return Err(TetherServerError::NotListening);
        }
        self.directory = None;
        let registration = DirectoryRegistration::start(
            url,
            self.config.listen_port,
            &self.config.name,
            self.config.version,
            self.config.directory_refresh_interval,
            self.config.directory_request_timeout,
        )?;
        self.directory = Some(registration);
        Ok(())
    }

    pub fn stop_directory_registration(&mut self) {
        self.directory = None;
    }

    pub fn directory_state(&self) -> DirectoryState {
        self.directory
            .as_ref()
            .map_or(DirectoryState::Disabled, |directory| directory.state())
    }

    // Clients

    /// Every authenticated client, including those behind proxies. Proxies
    /// themselves are not listed.
    pub fn client_ids(&self) -> Vec<ClientId> {
        self.connections
            .iter()
            .filter(|connection| connection.is_authenticated())
            .flat_map(|connection| connection.served_client_ids())
            .collect()
    }

    /// Latest round-trip time to a client. Clients behind a proxy report the
    /// proxy's.
    pub fn ping(&self, client_id: ClientId) -> Option<Duration> {
        self.connections
            .iter()
            .find(|connection| connection.owns_client(client_id))
            .and_then(|connection| connection.ping())
    }

    /// Bytes per second sent to all connections
    pub fn send_data_rate(&self) -> f32 {
        self.connections
            .iter()
            .map(|connection| connection.send_rate.bytes_per_second())
            .sum()
    }

    pub fn send_data_rate_per_client(&self) -> Vec<(ClientId, f32)> {
        self.connections
            .iter()
            .filter(|connection| connection.client_id != 0)
            .map(|connection| (connection.client_id, connection.send_rate.bytes_per_second()))
            .collect()
    }

    /// Wall time spent in the last `update`
    pub fn update_time(&self) -> Duration {
        self.update_time
    }

    // Update

    /// Must be called once per simulation tick. Replicates changes, services
    /// every connection, and returns what happened.
    pub fn update(&mut self, world: &mut World, delta: Duration) -> Events {
        let started = Instant::now();
        let mut outbox = Outbox::new();

        for entity in world.take_destroyed() {
            self.components.on_entity_destroyed(entity, &mut outbox);
        }

        if self.game_speed != self.sent_game_speed {
            self.sent_game_speed = self.game_speed;
            outbox.push(self.game_speed_packet());
        }

        self.objects.update(world, delta, &mut outbox);
        self.components.update(world, delta, &mut outbox);
        for packet in &outbox {
            self.broadcast(packet);
        }

        if let Some(discovery) = self.discovery.as_mut() {
            discovery.update();
        }

        self.accept_connections();
        self.receive_all(world);
        self.keep_alive();
        self.remove_closed_connections();
        self.flush_all();

        self.update_time = started.elapsed();
        mem::replace(&mut self.incoming_events, Events::new())
    }

    // Private methods

    fn accept_connections(&mut self) {
        let Some(listener) = self.listener.as_mut() else {
            return;
        };
        loop {
            match listener.accept() {
                Ok(Some(transport)) => {
                    let mut connection = ClientConnection::new(FramedStream::new(transport));
                    debug!("accepted connection from {:?}", connection.stream.peer_addr());
                    send_request_auth(&self.config, &mut connection);
                    self.connections.push(connection);
                }
                Ok(None) => break,
                Err(error) => {
                    warn!("accept failed: {}", error);
                    self.incoming_events.push_error(error.into());
                    break;
                }
            }
        }
    }

    fn receive_all(&mut self, world: &mut World) {
        let mut connections = mem::take(&mut self.connections);
        let mut voice = Vec::new();
        for connection in &mut connections {
            self.receive_frames(connection, world, &mut voice);
        }
        self.connections = connections;

        for action in voice {
            self.route_voice(action);
        }
    }

    fn receive_frames(
        &mut self,
        connection: &mut ClientConnection,
        world: &mut World,
        voice: &mut Vec<VoiceAction>,
    ) {
        while !connection.should_close() {
            let frame = match connection.stream.receive() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(TransportError::Closed) => {
                    connection.close();
                    break;
                }
                Err(error) => {
                    warn!("receive from client {} failed: {}", connection.client_id, error);
                    self.incoming_events.push_error(error.into());
                    connection.close();
                    break;
                }
            };
            connection.mark_received();

            if let Err(error) = self.handle_frame(connection, &frame, world, voice) {
                warn!("closing connection of client {}: {}", connection.client_id, error);
                self.incoming_events.push_error(error);
                connection.close();
            }
        }
    }

    fn handle_frame(
        &mut self,
        connection: &mut ClientConnection,
        frame: &[u8],
        world: &World,
        voice: &mut Vec<VoiceAction>,
    ) -> Result<(), TetherServerError> {
        let state = connection.receive_state;
        if let ReceiveState::Command {
            object_id,
            client_id,
        } = state
        {
            connection.receive_state = ReceiveState::Main;
            if let Some(client_id) = client_id {
                self.objects
                    .dispatch_client_command(object_id, client_id, frame, world);
            }
            return Ok(());
        }

        let mut reader = ByteReader::new(frame);
        let command: Command = read(&mut reader, connection.client_id)?;
        match state {
            ReceiveState::Auth => self.handle_auth(connection, command, &mut reader, world),
            _ => self.handle_main(connection, command, &mut reader, world, voice),
        }
    }

    fn handle_auth(
        &mut self,
        connection: &mut ClientConnection,
        command: Command,
        reader: &mut ByteReader,
        world: &World,
    ) -> Result<(), TetherServerError> {
        match command {
            Command::ClientSendAuth => {
                let client_version: i32 = read(reader, connection.client_id)?;
                let password: String = read(reader, connection.client_id)?;

                if !versions_compatible(self.config.version, client_version) {
                    return Err(TetherServerError::VersionMismatch {
                        client_version,
                        server_version: self.config.version,
                    });
                }
                if !self.password_accepted(&password) {
                    info!("authentication failed, asking again");
                    send_request_auth(&self.config, connection);
                    return Ok(());
                }

                let client_id = self.allocate_client_id();
                connection.client_id = client_id;
                connection.receive_state = ReceiveState::Main;

                let mut packet = ByteWriter::new();
                packet.write(&Command::SetClientId);
                packet.write(&client_id);
                connection.send(&packet);
                for packet in self.snapshot(world) {
                    connection.send(&packet);
                }

                info!("client {} connected", client_id);
                self.incoming_events.push_connection(client_id);
                Ok(())
            }
            Command::AliveResp => {
                connection.finish_round_trip();
                Ok(())
            }
            command => Err(TetherServerError::UnexpectedCommand {
                client_id: connection.client_id,
                command,
                state: connection.receive_state.name(),
            }),
        }
    }

    fn handle_main(
        &mut self,
        connection: &mut ClientConnection,
        command: Command,
        reader: &mut ByteReader,
        world: &World,
        voice: &mut Vec<VoiceAction>,
    ) -> Result<(), TetherServerError> {
        let client_id = connection.client_id;
        match command {
            Command::ClientCommand => {
                let object_id: ObjectId = read(reader, client_id)?;
                connection.receive_state = ReceiveState::Command {
                    object_id,
                    client_id: Some(client_id),
                };
            }
            Command::ProxyClientCommand => {
                let object_id: ObjectId = read(reader, client_id)?;
                let real_id: ClientId = read(reader, client_id)?;
                let owner = connection.proxied_client_ids.contains(&real_id).then_some(real_id);
                if owner.is_none() {
                    warn!("proxy {} sent a command for foreign client {}", client_id, real_id);
                }
                connection.receive_state = ReceiveState::Command {
                    object_id,
                    client_id: owner,
                };
            }
            Command::AliveResp => connection.finish_round_trip(),
            Command::AudioCommStart | Command::AudioCommData | Command::AudioCommStop => {
                voice.push(read_voice(command, client_id, reader, client_id)?);
            }
            Command::ProxyClientAudio => {
                let real_id: ClientId = read(reader, client_id)?;
                let embedded: Command = read(reader, client_id)?;
                if !embedded.is_audio() {
                    return Err(TetherServerError::UnexpectedCommand {
                        client_id,
                        command: embedded,
                        state: connection.receive_state.name(),
                    });
                }
                if connection.proxied_client_ids.contains(&real_id) {
                    voice.push(read_voice(embedded, real_id, reader, client_id)?);
                } else {
                    warn!("proxy {} sent audio for foreign client {}", client_id, real_id);
                }
            }
            Command::NewProxyClient => {
                let temp_id: i32 = read(reader, client_id)?;
                let password: String = read(reader, client_id)?;
                connection.is_proxy = true;
                self.add_proxy_client(connection, temp_id, &password, world);
            }
            Command::DelProxyClient => {
                let real_id: ClientId = read(reader, client_id)?;
                if let Some(position) = connection
                    .proxied_client_ids
                    .iter()
                    .position(|id| *id == real_id)
                {
                    connection.proxied_client_ids.remove(position);
                    info!("client {} left through proxy {}", real_id, client_id);
                    self.incoming_events.push_disconnection(real_id);
                    voice.push(VoiceAction::Leave { client_id: real_id });
                }
            }
            command => {
                return Err(TetherServerError::UnexpectedCommand {
                    client_id,
                    command,
                    state: connection.receive_state.name(),
                })
            }
        }
        Ok(())
    }

    fn add_proxy_client(
        &mut self,
        connection: &mut ClientConnection,
        temp_id: i32,
        password: &str,
        world: &World,
    ) {
        if !self.password_accepted(password) {
            info!("proxy {} client {} failed authentication", connection.client_id, temp_id);
            let mut packet = ByteWriter::new();
            packet.write(&Command::ProxyClientRejected);
            packet.write(&temp_id);
            connection.send(&packet);
            return;
        }

        let real_id = self.allocate_client_id();
        connection.proxied_client_ids.push(real_id);

        let mut packet = ByteWriter::new();
        packet.write(&Command::SetProxyClientId);
        packet.write(&temp_id);
        packet.write(&real_id);
        connection.send(&packet);
        for packet in self.snapshot(world) {
            connection.send(&proxy_packet(&[real_id], &packet));
        }

        info!("client {} connected through proxy {}", real_id, connection.client_id);
        self.incoming_events.push_connection(real_id);
    }

    fn route_voice(&mut self, action: VoiceAction) {
        let (listeners, packet) = match action {
            VoiceAction::Start { speaker, target } => {
                let clients = self.client_ids();
                let listeners = self.voice.start(speaker, target, &clients);
                (listeners, audio_packet(Command::AudioCommStart, speaker, &[]))
            }
            VoiceAction::Data { speaker, bytes } => match self.voice.targets(speaker) {
                Some(listeners) => (
                    listeners,
                    audio_packet(Command::AudioCommData, speaker, &bytes),
                ),
                None => return,
            },
            VoiceAction::Stop { speaker } => match self.voice.stop(speaker) {
                Some(listeners) => (listeners, audio_packet(Command::AudioCommStop, speaker, &[])),
                None => return,
            },
            VoiceAction::Leave { client_id } => match self.voice.remove_client(client_id) {
                Some(listeners) => (
                    listeners,
                    audio_packet(Command::AudioCommStop, client_id, &[]),
                ),
                None => return,
            },
        };
        for listener in listeners {
            self.send_to_client(listener, &packet);
        }
    }

    fn keep_alive(&mut self) {
        if self.keep_alive_timer.ringing() {
            self.keep_alive_timer.reset();
            for connection in &mut self.connections {
                if connection.is_authenticated() {
                    connection.send_command(Command::Alive);
                    connection.start_round_trip();
                }
            }
        }

        let timeout = self.config.connection.disconnection_timeout_duration;
        for connection in &mut self.connections {
            if connection.is_silent_for(timeout) {
                info!("client {} timed out", connection.client_id);
                connection.close();
            }
        }
    }

    fn remove_closed_connections(&mut self) {
        let mut index = 0;
        while index < self.connections.len() {
            if !self.connections[index].should_close() {
                index += 1;
                continue;
            }
            let mut connection = self.connections.remove(index);
            connection.stream.close();

            let departed: Vec<ClientId> = connection.client_ids().collect();
            for client_id in departed {
                info!("client {} disconnected", client_id);
                self.incoming_events.push_disconnection(client_id);
                self.route_voice(VoiceAction::Leave { client_id });
            }
        }
    }

    fn flush_all(&mut self) {
        fastrand::shuffle(&mut self.connections);
        for connection in &mut self.connections {
            connection.flush();
        }
    }

    /// Sends to every authenticated connection. Proxies fan the packet out
    /// to their own clients.
    fn broadcast(&mut self, packet: &ByteWriter) {
        for connection in &mut self.connections {
            if connection.is_authenticated() {
                connection.send(packet);
            }
        }
    }

    fn send_to_client(&mut self, client_id: ClientId, packet: &ByteWriter) {
        if let Some(connection) = self
            .connections
            .iter_mut()
            .find(|connection| connection.client_id == client_id)
        {
            connection.send(packet);
        } else if let Some(connection) = self
            .connections
            .iter_mut()
            .find(|connection| connection.proxied_client_ids.contains(&client_id))
        {
            connection.send(&proxy_packet(&[client_id], packet));
        } else {
            debug!("dropping packet for departed client {}", client_id);
        }
    }

    /// Game speed, every object and every replicated component: what a newly
    /// authenticated client needs after its SET_CLIENT_ID
    fn snapshot(&self, world: &World) -> Outbox {
        let mut outbox = vec![self.game_speed_packet()];
        self.objects.send_all(world, &mut outbox);
        self.components.send_all(world, &mut outbox);
        outbox
    }

    fn game_speed_packet(&self) -> ByteWriter {
        let mut packet = ByteWriter::new();
        packet.write(&Command::SetGameSpeed);
        packet.write(&self.sent_game_speed);
        packet
    }

    fn password_accepted(&self, password: &str) -> bool {
        match &self.config.password {
            Some(expected) => expected == password,
            None => true,
        }
    }

    fn allocate_client_id(&mut self) -> ClientId {
        let client_id = self.next_client_id;
        self.next_client_id += 1;
        client_id
    }
}

fn send_request_auth(config: &ServerConfig, connection: &mut ClientConnection) {
    let mut packet = ByteWriter::new();
    packet.write(&Command::RequestAuth);
    packet.write(&config.version);
    packet.write(&config.password.is_some());
    connection.send(&packet);
}

fn read<T: Serde>(reader: &mut ByteReader, client_id: ClientId) -> Result<T, TetherServerError> {
    reader
        .try_read()
        .map_err(|error| TetherServerError::Malformed { client_id, error })
}

fn read_voice(
    command: Command,
    speaker: ClientId,
    reader: &mut ByteReader,
    client_id: ClientId,
) -> Result<VoiceAction, TetherServerError> {
    Ok(match command {
        Command::AudioCommStart => VoiceAction::Start {
            speaker,
            target: read(reader, client_id)?,
        },
        Command::AudioCommData => VoiceAction::Data {
            speaker,
            bytes: reader.take_remaining().to_vec(),
        },
        _ => VoiceAction::Stop { speaker },
    })
}

fn audio_packet(command: Command, speaker: ClientId, bytes: &[u8]) -> ByteWriter {
    let mut packet = ByteWriter::with_capacity(6 + bytes.len());
    packet.write(&command);
    packet.write(&speaker);
    packet.write_raw(bytes);
    packet
}

/// PROXY_TO_CLIENTS: the listed clients behind a proxy receive `packet`
fn proxy_packet(client_ids: &[ClientId], packet: &ByteWriter) -> ByteWriter {
    let mut writer = ByteWriter::with_capacity(6 + client_ids.len() * 4 + packet.len());
    writer.write(&Command::ProxyToClients);
    writer.write(&(client_ids.len() as u32));
    for client_id in client_ids {
        writer.write(client_id);
    }
    writer.write_raw(packet.as_slice());
    writer
}
