use std::time::Duration;

use tether_client::{Client, ClientConfig};
use tether_proxy::{Proxy, ProxyConfig};
use tether_server::{Events, Server, ServerConfig};
use tether_shared::{
    local_listener, ByteReader, ByteWriter, Command, ConnectionConfig, FramedStream,
    LocalConnector, LocalTransport, StreamState, World,
};

use crate::protocol;

/// Simulation step passed to `Server::update`
pub const TICK: Duration = Duration::from_millis(16);

/// Keep-alives far enough apart that they never show up mid-test
pub fn quiet_connection() -> ConnectionConfig {
    ConnectionConfig::new(Duration::from_secs(30), Duration::from_secs(600))
}

pub fn server_config(version: i32, password: Option<&str>) -> ServerConfig {
    ServerConfig {
        version,
        password: password.map(str::to_string),
        discovery: false,
        connection: quiet_connection(),
        ..ServerConfig::default()
    }
}

pub fn client_config(version: i32, password: Option<&str>) -> ClientConfig {
    ClientConfig {
        version,
        password: password.map(str::to_string),
        connection: quiet_connection(),
        ..ClientConfig::default()
    }
}

pub fn proxy_config(password: Option<&str>) -> ProxyConfig {
    ProxyConfig {
        password: password.map(str::to_string),
        connection: quiet_connection(),
        ..ProxyConfig::default()
    }
}

/// A Server accepting in-memory connections, with its own World
pub struct TestServer {
    pub server: Server,
    pub world: World,
    connector: LocalConnector,
}

impl TestServer {
    pub fn new(config: ServerConfig) -> Self {
        let (listener, connector) = local_listener();
        let mut server = Server::new(config, protocol());
        server.listen_with(Box::new(listener));
        Self {
            server,
            world: World::new(),
            connector,
        }
    }

    /// Dials the server; the connection is accepted on the next update
    pub fn connect(&self) -> LocalTransport {
        self.connector.connect()
    }

    pub fn update(&mut self) -> Events {
        self.server.update(&mut self.world, TICK)
    }
}

/// Runs `ticks` rounds of one server update followed by one update of every
/// client
pub fn settle(server: &mut TestServer, clients: &mut [&mut TestClient], ticks: usize) {
    for _ in 0..ticks {
        server.update();
        for client in clients.iter_mut() {
            client.update();
        }
    }
}

/// A Client with its own World
pub struct TestClient {
    pub client: Client,
    pub world: World,
}

impl TestClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            client: Client::new(config, protocol()),
            world: World::new(),
        }
    }

    pub fn connected_to(config: ClientConfig, transport: LocalTransport) -> Self {
        let mut client = Self::new(config);
        client.client.connect_with(Box::new(transport));
        client
    }

    pub fn update(&mut self) {
        self.client.update(&mut self.world);
    }
}

/// A Proxy accepting in-memory connections
pub struct TestProxy {
    pub proxy: Proxy,
    connector: LocalConnector,
}

impl TestProxy {
    pub fn new(config: ProxyConfig) -> Self {
        let (listener, connector) = local_listener();
        let mut proxy = Proxy::new(config);
        proxy.listen_with(Box::new(listener));
        Self { proxy, connector }
    }

    pub fn connect(&self) -> LocalTransport {
        self.connector.connect()
    }
}

/// Raw end of a connection, for asserting the exact frames a peer sends
pub struct RawPeer {
    stream: FramedStream,
}

impl RawPeer {
    pub fn new(transport: LocalTransport) -> Self {
        Self {
            stream: FramedStream::new(Box::new(transport)),
        }
    }

    pub fn send(&mut self, packet: &ByteWriter) {
        self.stream.send(packet).expect("local stream accepts frames");
    }

    pub fn send_command(&mut self, command: Command) {
        let mut packet = ByteWriter::new();
        packet.write(&command);
        self.send(&packet);
    }

    pub fn send_auth(&mut self, version: i32, password: &str) {
        let mut packet = ByteWriter::new();
        packet.write(&Command::ClientSendAuth);
        packet.write(&version);
        packet.write(&password.to_string());
        self.send(&packet);
    }

    /// Every complete frame received so far
    pub fn frames(&mut self) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        while let Ok(Some(frame)) = self.stream.receive() {
            frames.push(frame);
        }
        frames
    }

    pub fn is_closed(&mut self) -> bool {
        self.stream.state() == StreamState::Closed
    }
}

pub fn command_of(frame: &[u8]) -> Command {
    ByteReader::new(frame)
        .try_read()
        .expect("frame starts with a command")
}

pub fn commands(frames: &[Vec<u8>]) -> Vec<Command> {
    frames.iter().map(|frame| command_of(frame)).collect()
}
