/// Clients relayed through a Proxy, with the server either dialing out from
/// the proxy or dialing in to it.
///
/// 1. The proxy authenticates upstream and learns the server version
/// 2. Each downstream client is challenged with that version
/// 3. NEW_PROXY_CLIENT / SET_PROXY_CLIENT_ID map the proxy's temporary id to a
///    server-assigned id
/// 4. Commands and voice travel upstream tagged with that id; state and voice
///    travel downstream through PROXY_TO_CLIENTS or plain fan-out

use std::collections::HashSet;

use tether_client::{ClientStatus, DisconnectReason, VoicePacket};
use tether_proxy::ProxyError;
use tether_server::{ConnectEvent, DisconnectEvent, VoiceTargetPolicy};
use tether_shared::{ByteReader, ByteWriter, ClientId, Command};
use tether_test::{
    client_config, command_of, proxy_config, server_config, RawPeer, Ship, TestClient, TestProxy,
    TestServer,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn step(server: &mut TestServer, proxy: &mut TestProxy, clients: &mut [&mut TestClient]) {
    server.update();
    proxy.proxy.update().expect("upstream is alive");
    for client in clients.iter_mut() {
        client.update();
    }
}

fn run(
    server: &mut TestServer,
    proxy: &mut TestProxy,
    clients: &mut [&mut TestClient],
    ticks: usize,
) {
    for _ in 0..ticks {
        step(server, proxy, clients);
    }
}

/// Server with one ship, and a proxy that dialed it
fn dial_out(password: Option<&str>) -> (TestServer, TestProxy, i32) {
    let mut server = TestServer::new(server_config(6, password));
    let ship_id = server.server.register_object(Ship::new("Kestrel", 100));
    let mut proxy = TestProxy::new(proxy_config(password));
    proxy.proxy.connect_upstream_with(Box::new(server.connect()));
    run(&mut server, &mut proxy, &mut [], 3);
    assert!(proxy.proxy.is_upstream_connected());
    assert_eq!(proxy.proxy.server_version(), Some(6));
    (server, proxy, ship_id)
}

fn join(proxy: &TestProxy, password: Option<&str>) -> TestClient {
    TestClient::connected_to(client_config(6, password), proxy.connect())
}

/// Speakers are heard only by the client id they name
struct Whisper;

impl VoiceTargetPolicy for Whisper {
    fn voice_targets(
        &mut self,
        speaker: ClientId,
        target_identifier: i32,
        clients: &[ClientId],
    ) -> HashSet<ClientId> {
        clients
            .iter()
            .copied()
            .filter(|client_id| *client_id == target_identifier && *client_id != speaker)
            .collect()
    }
}

#[test]
fn dialed_out_proxy_relays_state_and_ids() {
    init_logging();
    let (mut server, mut proxy, ship_id) = dial_out(None);
    let mut first = join(&proxy, None);
    let mut second = join(&proxy, None);
    run(&mut server, &mut proxy, &mut [&mut first, &mut second], 4);

    assert!(first.client.is_connected());
    assert!(second.client.is_connected());
    let first_id = first.client.client_id();
    let second_id = second.client.client_id();
    assert_ne!(first_id, second_id);

    let mut expected = vec![first_id, second_id];
    expected.sort();
    let mut relayed = proxy.proxy.client_ids();
    relayed.sort();
    assert_eq!(relayed, expected);
    let mut served = server.server.client_ids();
    served.sort();
    assert_eq!(served, expected);

    for client in [&first, &second] {
        assert_eq!(client.client.server_version(), Some(6));
        let ship = client.client.object::<Ship>(ship_id).expect("snapshot relayed");
        assert_eq!(*ship.hull.get(), 100);
    }

    server
        .server
        .object_mut::<Ship>(ship_id)
        .expect("registered")
        .hull
        .set(64);
    server.server.set_game_speed(0.5);
    run(&mut server, &mut proxy, &mut [&mut first, &mut second], 2);
    for client in [&first, &second] {
        let ship = client.client.object::<Ship>(ship_id).expect("created");
        assert_eq!(*ship.hull.get(), 64);
        assert_eq!(client.client.game_speed(), 0.5);
    }
}

#[test]
fn commands_carry_the_real_client_id() {
    init_logging();
    let (mut server, mut proxy, ship_id) = dial_out(None);
    let mut first = join(&proxy, None);
    let mut second = join(&proxy, None);
    run(&mut server, &mut proxy, &mut [&mut first, &mut second], 4);

    let mut payload = ByteWriter::new();
    payload.write(&4_i32);
    first.client.send_command(ship_id, &payload).expect("connected");
    let mut payload = ByteWriter::new();
    payload.write(&6_i32);
    second.client.send_command(ship_id, &payload).expect("connected");
    run(&mut server, &mut proxy, &mut [&mut first, &mut second], 3);

    let ship = server.server.object::<Ship>(ship_id).expect("registered");
    let mut repairs = ship.repairs.clone();
    repairs.sort();
    let mut expected = vec![(first.client.client_id(), 4), (second.client.client_id(), 6)];
    expected.sort();
    assert_eq!(repairs, expected);
    assert_eq!(
        first.client.object::<Ship>(ship_id).map(|ship| *ship.hull.get()),
        Some(110)
    );
}

#[test]
fn split_command_is_not_interleaved_with_other_traffic() {
    init_logging();
    let (mut server, mut proxy, ship_id) = dial_out(None);
    let mut raw = RawPeer::new(proxy.connect());
    let mut other = join(&proxy, None);
    run(&mut server, &mut proxy, &mut [&mut other], 2);
    raw.send_auth(6, "");
    run(&mut server, &mut proxy, &mut [&mut other], 4);
    assert!(other.client.is_connected());

    let raw_id = raw
        .frames()
        .iter()
        .find(|frame| command_of(frame) == Command::SetClientId)
        .map(|frame| {
            let mut reader = ByteReader::new(frame);
            let _ = reader.try_read::<Command>();
            reader.try_read::<i32>()
        })
        .expect("raw client was committed")
        .expect("SET_CLIENT_ID carries an id");

    // header and payload arrive a tick apart, with voice from another
    // client in between
    let mut header = ByteWriter::new();
    header.write(&Command::ClientCommand);
    header.write(&ship_id);
    raw.send(&header);
    step(&mut server, &mut proxy, &mut [&mut other]);
    other.client.start_voice(0).expect("connected");
    step(&mut server, &mut proxy, &mut [&mut other]);
    let mut payload = ByteWriter::new();
    payload.write(&4_i32);
    raw.send(&payload);
    run(&mut server, &mut proxy, &mut [&mut other], 3);

    let ship = server.server.object::<Ship>(ship_id).expect("registered");
    assert_eq!(ship.repairs, vec![(raw_id, 4)]);
    assert_eq!(*ship.hull.get(), 104);
    assert!(proxy.proxy.is_upstream_connected());
    let mut served = server.server.client_ids();
    served.sort();
    let mut expected = vec![raw_id, other.client.client_id()];
    expected.sort();
    assert_eq!(served, expected);
}

#[test]
fn server_dialing_in_becomes_the_upstream() {
    init_logging();
    let mut server = TestServer::new(server_config(6, None));
    let ship_id = server.server.register_object(Ship::new("Kestrel", 100));
    let mut proxy = TestProxy::new(proxy_config(None));

    let mut client = join(&proxy, None);
    run(&mut server, &mut proxy, &mut [&mut client], 2);
    assert_eq!(client.client.status(), ClientStatus::Authenticating);
    assert_eq!(client.client.server_version(), None);

    server.server.connect_to_proxy_with(Box::new(proxy.connect()));
    run(&mut server, &mut proxy, &mut [&mut client], 6);

    assert!(proxy.proxy.is_upstream_connected());
    assert_eq!(proxy.proxy.connection_count(), 1);
    assert!(client.client.is_connected());
    assert_eq!(server.server.client_ids(), vec![client.client.client_id()]);
    assert!(client.client.object::<Ship>(ship_id).is_some());
}

#[test]
fn rejected_password_is_asked_again() {
    init_logging();
    let (mut server, mut proxy, _) = dial_out(Some("hunter2"));
    let mut client = join(&proxy, None);
    run(&mut server, &mut proxy, &mut [&mut client], 2);
    assert_eq!(client.client.status(), ClientStatus::WaitingForPassword);

    client.client.send_password("swordfish").expect("stream is open");
    run(&mut server, &mut proxy, &mut [&mut client], 4);
    assert_eq!(client.client.status(), ClientStatus::WaitingForPassword);
    assert_eq!(client.client.disconnect_reason(), DisconnectReason::BadCredentials);
    assert!(server.server.client_ids().is_empty());

    client.client.send_password("hunter2").expect("stream is open");
    run(&mut server, &mut proxy, &mut [&mut client], 4);
    assert!(client.client.is_connected());
    assert_eq!(server.server.client_ids(), vec![client.client.client_id()]);
}

#[test]
fn incompatible_client_is_dropped_by_the_proxy() {
    init_logging();
    let (mut server, mut proxy, _) = dial_out(None);
    let mut client = TestClient::connected_to(client_config(9, None), proxy.connect());
    run(&mut server, &mut proxy, &mut [&mut client], 4);

    assert_eq!(client.client.status(), ClientStatus::Disconnected);
    assert_eq!(client.client.disconnect_reason(), DisconnectReason::VersionMismatch);
    assert_eq!(proxy.proxy.connection_count(), 0);
    assert!(server.server.client_ids().is_empty());
}

#[test]
fn targeted_voice_reaches_only_the_named_listener() {
    init_logging();
    let (mut server, mut proxy, _) = dial_out(None);
    server.server.set_voice_policy(Whisper);
    let mut speaker = join(&proxy, None);
    let mut listener = join(&proxy, None);
    let mut bystander = join(&proxy, None);
    run(
        &mut server,
        &mut proxy,
        &mut [&mut speaker, &mut listener, &mut bystander],
        4,
    );
    let speaker_id = speaker.client.client_id();

    speaker
        .client
        .start_voice(listener.client.client_id())
        .expect("connected");
    speaker.client.send_voice(&[1, 2, 3]).expect("connected");
    speaker.client.stop_voice().expect("connected");
    run(
        &mut server,
        &mut proxy,
        &mut [&mut speaker, &mut listener, &mut bystander],
        3,
    );

    assert_eq!(
        listener.client.voice_streams().drain(),
        vec![
            VoicePacket::Start {
                speaker: speaker_id
            },
            VoicePacket::Data {
                speaker: speaker_id,
                bytes: vec![1, 2, 3],
            },
            VoicePacket::Stop {
                speaker: speaker_id
            },
        ]
    );
    assert!(bystander.client.voice_streams().is_empty());
    assert!(speaker.client.voice_streams().is_empty());
}

#[test]
fn departing_client_is_removed_upstream() {
    init_logging();
    let (mut server, mut proxy, _) = dial_out(None);
    let mut staying = join(&proxy, None);
    let mut leaving = join(&proxy, None);

    let mut connected = Vec::new();
    for _ in 0..4 {
        let mut events = server.update();
        connected.extend(events.read::<ConnectEvent>());
        proxy.proxy.update().expect("upstream is alive");
        staying.update();
        leaving.update();
    }
    let staying_id = staying.client.client_id();
    let leaving_id = leaving.client.client_id();
    assert!(connected.contains(&staying_id));
    assert!(connected.contains(&leaving_id));

    leaving.client.disconnect();
    let mut departed = Vec::new();
    for _ in 0..3 {
        proxy.proxy.update().expect("upstream is alive");
        let mut events = server.update();
        departed.extend(events.read::<DisconnectEvent>());
        staying.update();
    }
    assert_eq!(departed, vec![leaving_id]);
    assert_eq!(server.server.client_ids(), vec![staying_id]);
    assert_eq!(proxy.proxy.client_ids(), vec![staying_id]);
}

#[test]
fn losing_the_server_closes_every_client() {
    init_logging();
    let (mut server, mut proxy, _) = dial_out(None);
    let mut first = join(&proxy, None);
    let mut second = join(&proxy, None);
    run(&mut server, &mut proxy, &mut [&mut first, &mut second], 4);
    assert!(first.client.is_connected());

    drop(server);
    assert_eq!(proxy.proxy.update(), Err(ProxyError::UpstreamLost));
    assert_eq!(proxy.proxy.connection_count(), 0);
    assert!(!proxy.proxy.is_upstream_connected());

    first.update();
    second.update();
    for client in [&first, &second] {
        assert_eq!(client.client.status(), ClientStatus::Disconnected);
        assert_eq!(client.client.disconnect_reason(), DisconnectReason::ClosedByServer);
    }
}
