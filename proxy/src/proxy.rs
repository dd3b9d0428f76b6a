use std::{
    mem,
    net::{Ipv4Addr, SocketAddr},
};

use log::{debug, info, warn};

use tether_shared::{
    versions_compatible, ByteReader, ByteWriter, ClientId, Command, FramedStream, ObjectId,
    SerdeErr, StreamListener, StreamTransport, TcpAcceptor, TcpTransport, TransportError,
};

use crate::{
    downstream::{Downstream, DownstreamState},
    upstream::Upstream,
    ProxyConfig, ProxyError,
};

/// What to do with a downstream connection after one of its frames
enum Handled {
    Continue,
    /// The peer is a server dialing in; it becomes the upstream
    Promote,
    Close,
}

/// Relays many clients over one upstream connection. Clients see an ordinary
/// server; the server sees one proxy connection carrying several client ids.
pub struct Proxy {
    config: ProxyConfig,
    listener: Option<Box<dyn StreamListener>>,
    upstream: Option<Upstream>,
    downstream: Vec<Downstream>,
    next_temp_id: i32,
}

impl Proxy {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config,
            listener: None,
            upstream: None,
            downstream: Vec::new(),
            next_temp_id: 1,
        }
    }

    /// Listen for clients on the configured port, and dial the configured
    /// server if there is one
    pub fn start(&mut self) -> Result<(), ProxyError> {
        let address = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.config.listen_port));
        self.listener = Some(Box::new(TcpAcceptor::bind(address)?));
        info!("proxy listening on {}", address);

        if let Some(upstream) = self.config.upstream {
            let transport = TcpTransport::connect(upstream, self.config.connect_timeout)?;
            info!("connecting to server at {}", upstream);
            self.connect_upstream_with(Box::new(transport));
        }
        Ok(())
    }

    pub fn listen_with(&mut self, listener: Box<dyn StreamListener>) {
        self.listener = Some(listener);
    }

    pub fn connect_upstream_with(&mut self, transport: Box<dyn StreamTransport>) {
        self.upstream = Some(Upstream::new(FramedStream::new(transport)));
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|listener| listener.local_addr())
    }

    /// Whether the server has accepted the proxy
    pub fn is_upstream_connected(&self) -> bool {
        self.upstream
            .as_ref()
            .is_some_and(|upstream| upstream.client_id > 0)
    }

    pub fn server_version(&self) -> Option<i32> {
        self.upstream
            .as_ref()
            .and_then(|upstream| upstream.server_version)
    }

    /// Server-assigned ids of every committed client
    pub fn client_ids(&self) -> Vec<ClientId> {
        self.downstream
            .iter()
            .filter_map(|downstream| downstream.real_id)
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.downstream.len()
    }

    /// Must be called regularly. Returns `UpstreamLost` once the server is
    /// gone, after closing every client.
    pub fn update(&mut self) -> Result<(), ProxyError> {
        self.accept_connections();

        if let Err(error) = self.receive_upstream() {
            self.shutdown();
            return Err(error);
        }

        self.challenge_downstream();
        self.receive_downstream();
        self.remove_closed_downstream();

        if let Some(upstream) = self.upstream.as_mut() {
            upstream.flush();
        }
        for downstream in &mut self.downstream {
            downstream.flush();
        }

        if self
            .upstream
            .as_ref()
            .is_some_and(|upstream| upstream.has_failed())
        {
            self.shutdown();
            return Err(ProxyError::UpstreamLost);
        }
        Ok(())
    }

    // Private methods

    fn accept_connections(&mut self) {
        let Some(listener) = self.listener.as_mut() else {
            return;
        };
        loop {
            match listener.accept() {
                Ok(Some(transport)) => {
                    let temp_id = self.next_temp_id;
                    self.next_temp_id += 1;
                    let downstream = Downstream::new(FramedStream::new(transport), temp_id);
                    debug!(
                        "proxy client {} connected from {:?}",
                        temp_id,
                        downstream.stream.peer_addr()
                    );
                    self.downstream.push(downstream);
                }
                Ok(None) => break,
                Err(error) => {
                    warn!("accept failed: {}", error);
                    break;
                }
            }
        }
    }

    fn receive_upstream(&mut self) -> Result<(), ProxyError> {
        let Some(mut upstream) = self.upstream.take() else {
            return Ok(());
        };
        let result = self.drain_upstream(&mut upstream);
        self.upstream = Some(upstream);
        result
    }

    fn drain_upstream(&mut self, upstream: &mut Upstream) -> Result<(), ProxyError> {
        loop {
            let frame = match upstream.stream.receive() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(TransportError::Closed) => {
                    info!("server closed the connection");
                    return Err(ProxyError::UpstreamLost);
                }
                Err(error) => {
                    warn!("server stream failed: {}", error);
                    return Err(ProxyError::UpstreamLost);
                }
            };
            upstream.mark_received();
            self.handle_upstream(upstream, &frame)?;
        }

        if upstream.is_silent_for(self.config.connection.disconnection_timeout_duration) {
            info!("server went silent");
            return Err(ProxyError::UpstreamLost);
        }
        Ok(())
    }

    fn handle_upstream(&mut self, upstream: &mut Upstream, frame: &[u8]) -> Result<(), ProxyError> {
        let mut reader = ByteReader::new(frame);
        let command: Command = reader.try_read()?;
        match command {
            Command::RequestAuth => {
                let version: i32 = reader.try_read()?;
                let requires_password: bool = reader.try_read()?;
                if upstream.auth_sent {
                    return Err(ProxyError::UpstreamRejected);
                }
                upstream.server_version = Some(version);
                upstream.requires_password = requires_password;

                let mut packet = ByteWriter::new();
                packet.write(&Command::ClientSendAuth);
                packet.write(&version);
                packet.write(&self.config.password.clone().unwrap_or_default());
                upstream.send(&packet);
                upstream.auth_sent = true;
                info!("server runs version {}", version);
            }
            Command::SetClientId => {
                upstream.client_id = reader.try_read()?;
                info!("accepted by server as client {}", upstream.client_id);
            }
            Command::Alive => {
                upstream.send_command(Command::AliveResp);
                self.fan_out(frame);
            }
            Command::ProxyToClients => {
                let count: u32 = reader.try_read()?;
                let mut client_ids = Vec::new();
                for _ in 0..count {
                    client_ids.push(reader.try_read::<ClientId>()?);
                }
                let embedded = reader.take_remaining();
                for downstream in &mut self.downstream {
                    if downstream
                        .real_id
                        .is_some_and(|real_id| client_ids.contains(&real_id))
                    {
                        downstream.send_frame(embedded);
                    }
                }
            }
            Command::SetProxyClientId => {
                let temp_id: i32 = reader.try_read()?;
                let real_id: ClientId = reader.try_read()?;
                self.commit(upstream, temp_id, real_id);
            }
            Command::ProxyClientRejected => {
                let temp_id: i32 = reader.try_read()?;
                if let Some(downstream) = self.awaiting(temp_id) {
                    info!("server rejected proxy client {}", temp_id);
                    downstream.state = DownstreamState::Auth;
                    downstream.challenged = false;
                }
            }
            command if command.is_broadcast() || command.is_audio() => self.fan_out(frame),
            command => warn!("ignoring {:?} from server", command),
        }
        Ok(())
    }

    fn commit(&mut self, upstream: &mut Upstream, temp_id: i32, real_id: ClientId) {
        match self.awaiting(temp_id) {
            Some(downstream) => {
                downstream.real_id = Some(real_id);
                downstream.state = DownstreamState::Main;
                let mut packet = ByteWriter::new();
                packet.write(&Command::SetClientId);
                packet.write(&real_id);
                downstream.send(&packet);
                info!("proxy client {} is client {}", temp_id, real_id);
            }
            None => {
                // left before the server answered
                let mut packet = ByteWriter::new();
                packet.write(&Command::DelProxyClient);
                packet.write(&real_id);
                upstream.send(&packet);
            }
        }
    }

    fn awaiting(&mut self, temp_id: i32) -> Option<&mut Downstream> {
        self.downstream.iter_mut().find(|downstream| {
            downstream.temp_id == temp_id && downstream.state == DownstreamState::AwaitingId
        })
    }

    fn fan_out(&mut self, frame: &[u8]) {
        for downstream in &mut self.downstream {
            if downstream.is_committed() {
                downstream.send_frame(frame);
            }
        }
    }

    fn challenge_downstream(&mut self) {
        let Some((version, requires_password)) =
            self.upstream.as_ref().and_then(|upstream| upstream.challenge())
        else {
            return;
        };
        for downstream in &mut self.downstream {
            if downstream.state == DownstreamState::Auth && !downstream.challenged {
                let mut packet = ByteWriter::new();
                packet.write(&Command::RequestAuth);
                packet.write(&version);
                packet.write(&requires_password);
                downstream.send(&packet);
                downstream.challenged = true;
            }
        }
    }

    fn receive_downstream(&mut self) {
        let mut promoted = None;
        for (index, downstream) in self.downstream.iter_mut().enumerate() {
            while !downstream.should_close() {
                let frame = match downstream.stream.receive() {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break,
                    Err(error) => {
                        debug!("proxy client {} stream ended: {}", downstream.temp_id, error);
                        downstream.close();
                        break;
                    }
                };
                downstream.mark_received();

                match handle_downstream(downstream, self.upstream.as_mut(), &frame) {
                    Ok(Handled::Continue) => {}
                    Ok(Handled::Promote) => {
                        promoted = Some(index);
                        break;
                    }
                    Ok(Handled::Close) => {
                        downstream.close();
                    }
                    Err(error) => {
                        warn!(
                            "malformed frame from proxy client {}: {}",
                            downstream.temp_id, error
                        );
                        downstream.close();
                    }
                }
            }
            if promoted.is_some() {
                break;
            }
        }

        if let Some(index) = promoted {
            let downstream = self.downstream.remove(index);
            info!("server dialed in from {:?}", downstream.stream.peer_addr());
            self.upstream = Some(Upstream::new(downstream.stream));
        }
    }

    fn remove_closed_downstream(&mut self) {
        let timeout = self.config.connection.disconnection_timeout_duration;
        let mut index = 0;
        while index < self.downstream.len() {
            let downstream = &mut self.downstream[index];
            if downstream.is_silent_for(timeout) {
                info!("proxy client {} timed out", downstream.temp_id);
                downstream.close();
            }
            if !downstream.should_close() {
                index += 1;
                continue;
            }

            let mut downstream = self.downstream.remove(index);
            downstream.stream.close();
            if let (Some(real_id), Some(upstream)) = (downstream.real_id, self.upstream.as_mut()) {
                info!("client {} left the proxy", real_id);
                let mut packet = ByteWriter::new();
                packet.write(&Command::DelProxyClient);
                packet.write(&real_id);
                upstream.send(&packet);
            }
        }
    }

    fn shutdown(&mut self) {
        for mut downstream in mem::take(&mut self.downstream) {
            downstream.stream.close();
        }
        if let Some(mut upstream) = self.upstream.take() {
            upstream.stream.close();
        }
        info!("proxy closed every client connection");
    }
}

fn handle_downstream(
    downstream: &mut Downstream,
    upstream: Option<&mut Upstream>,
    frame: &[u8],
) -> Result<Handled, SerdeErr> {
    if let DownstreamState::Command { object_id } = downstream.state {
        downstream.state = DownstreamState::Main;
        let (Some(upstream), Some(real_id)) = (upstream, downstream.real_id) else {
            return Ok(Handled::Close);
        };
        let mut header = ByteWriter::new();
        header.write(&Command::ProxyClientCommand);
        header.write(&object_id);
        header.write(&real_id);
        upstream.send(&header);
        upstream.send_frame(frame);
        return Ok(Handled::Continue);
    }

    let mut reader = ByteReader::new(frame);
    let command: Command = reader.try_read()?;
    match (downstream.state, command) {
        (_, Command::AliveResp) => Ok(Handled::Continue),
        (DownstreamState::Auth, Command::ServerConnectToProxy)
            if upstream.is_none() && !downstream.challenged =>
        {
            Ok(Handled::Promote)
        }
        (DownstreamState::Auth, Command::ClientSendAuth) => {
            let version: i32 = reader.try_read()?;
            let password: String = reader.try_read()?;
            let Some(upstream) = upstream else {
                return Ok(Handled::Close);
            };
            let Some(server_version) = upstream.server_version else {
                return Ok(Handled::Close);
            };
            if !versions_compatible(server_version, version) {
                info!(
                    "proxy client {} runs version {}, server {}",
                    downstream.temp_id, version, server_version
                );
                return Ok(Handled::Close);
            }

            let mut packet = ByteWriter::new();
            packet.write(&Command::NewProxyClient);
            packet.write(&downstream.temp_id);
            packet.write(&password);
            upstream.send(&packet);
            downstream.state = DownstreamState::AwaitingId;
            Ok(Handled::Continue)
        }
        (DownstreamState::Main, Command::ClientCommand) => {
            let object_id: ObjectId = reader.try_read()?;
            if upstream.is_none() || downstream.real_id.is_none() {
                return Ok(Handled::Close);
            }
            downstream.state = DownstreamState::Command { object_id };
            Ok(Handled::Continue)
        }
        (DownstreamState::Main, command) if command.is_audio() => {
            let (Some(upstream), Some(real_id)) = (upstream, downstream.real_id) else {
                return Ok(Handled::Close);
            };
            let mut packet = ByteWriter::with_capacity(6 + frame.len());
            packet.write(&Command::ProxyClientAudio);
            packet.write(&real_id);
            packet.write_raw(frame);
            upstream.send(&packet);
            Ok(Handled::Continue)
        }
        (state, command) => {
            warn!(
                "proxy client {} sent {:?} in state {:?}",
                downstream.temp_id, command, state
            );
            Ok(Handled::Close)
        }
    }
}
