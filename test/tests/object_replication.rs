/// Id-based object replication between a Server and its Clients: CREATE for
/// new objects and late joiners, UPDATE_VALUE carrying only changed fields,
/// DELETE, and commands in both directions.

use tether_server::DisconnectEvent;
use tether_shared::{ByteReader, ByteWriter, Command, FieldIndex, ObjectId, Vector2};
use tether_test::{
    client_config, commands, server_config, settle, Position, RawPeer, Ship, TestClient,
    TestServer,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn connected_client(server: &mut TestServer) -> TestClient {
    let mut client = TestClient::connected_to(client_config(0, None), server.connect());
    settle(server, &mut [&mut client], 3);
    assert!(client.client.is_connected());
    client
}

fn authenticated_peer(server: &mut TestServer) -> RawPeer {
    let mut peer = RawPeer::new(server.connect());
    server.update();
    peer.send_auth(0, "");
    server.update();
    peer.frames();
    peer
}

#[test]
fn objects_are_created_updated_and_deleted() {
    init_logging();
    let mut server = TestServer::new(server_config(0, None));
    let ship_id = server.server.register_object(Ship::new("Kestrel", 100));
    let mut client = connected_client(&mut server);

    let ship = client.client.object::<Ship>(ship_id).expect("ship was created");
    assert_eq!(ship.name.get(), "Kestrel");
    assert_eq!(*ship.hull.get(), 100);

    {
        let ship = server.server.object_mut::<Ship>(ship_id).expect("registered");
        ship.hull.set(80);
        ship.position.set(Vector2::new(3.0, -4.5));
    }
    settle(&mut server, &mut [&mut client], 2);
    let ship = client.client.object::<Ship>(ship_id).expect("still there");
    assert_eq!(*ship.hull.get(), 80);
    assert_eq!(*ship.position.get(), Vector2::new(3.0, -4.5));

    assert!(server.server.destroy_object(ship_id));
    assert!(!server.server.destroy_object(ship_id));
    settle(&mut server, &mut [&mut client], 2);
    assert!(client.client.object::<Ship>(ship_id).is_none());
    assert!(client.client.object_ids().is_empty());
    assert!(server.server.object_ids().is_empty());
}

#[test]
fn objects_registered_later_reach_connected_clients() {
    init_logging();
    let mut server = TestServer::new(server_config(0, None));
    let mut client = connected_client(&mut server);
    assert!(client.client.object_ids().is_empty());

    let first = server.server.register_object(Ship::new("Osprey", 10));
    let second = server.server.register_object(Ship::new("Heron", 20));
    settle(&mut server, &mut [&mut client], 2);
    assert_eq!(client.client.object_ids(), vec![first, second]);
    assert_eq!(
        client.client.object::<Ship>(second).map(|ship| *ship.hull.get()),
        Some(20)
    );
}

#[test]
fn object_destroyed_before_its_first_update_is_never_sent() {
    init_logging();
    let mut server = TestServer::new(server_config(0, None));
    let mut peer = authenticated_peer(&mut server);

    let ship_id = server.server.register_object(Ship::new("Wren", 5));
    assert!(server.server.destroy_object(ship_id));
    server.update();

    assert!(peer.frames().is_empty());
    assert!(server.server.object_ids().is_empty());
}

#[test]
fn only_changed_fields_are_sent() {
    init_logging();
    let mut server = TestServer::new(server_config(0, None));
    let ship_id = server.server.register_object(Ship::new("Kestrel", 100));
    let mut peer = authenticated_peer(&mut server);

    server.update();
    assert!(peer.frames().is_empty());

    server
        .server
        .object_mut::<Ship>(ship_id)
        .expect("registered")
        .hull
        .set(100);
    server.update();
    assert!(peer.frames().is_empty());

    server
        .server
        .object_mut::<Ship>(ship_id)
        .expect("registered")
        .hull
        .set(75);
    server.update();
    let frames = peer.frames();
    assert_eq!(commands(&frames), vec![Command::UpdateValue]);

    let mut reader = ByteReader::new(&frames[0]);
    reader.try_read::<Command>().expect("command");
    assert_eq!(reader.try_read::<ObjectId>(), Ok(ship_id));
    assert_eq!(reader.try_read::<FieldIndex>(), Ok(2));
    assert_eq!(reader.try_read::<i32>(), Ok(75));
    assert_eq!(reader.available(), 0);
}

#[test]
fn client_command_reaches_the_server_object() {
    init_logging();
    let mut server = TestServer::new(server_config(0, None));
    let ship_id = server.server.register_object(Ship::new("Kestrel", 100));
    let mut client = connected_client(&mut server);
    let client_id = client.client.client_id();

    let mut payload = ByteWriter::new();
    payload.write(&5_i32);
    client.client.send_command(ship_id, &payload).expect("connected");
    settle(&mut server, &mut [&mut client], 2);

    let ship = server.server.object::<Ship>(ship_id).expect("registered");
    assert_eq!(ship.repairs, vec![(client_id, 5)]);
    assert_eq!(*ship.hull.get(), 105);
    assert_eq!(
        client.client.object::<Ship>(ship_id).map(|ship| *ship.hull.get()),
        Some(105)
    );
}

#[test]
fn command_for_unknown_object_is_dropped() {
    init_logging();
    let mut server = TestServer::new(server_config(0, None));
    let ship_id = server.server.register_object(Ship::new("Kestrel", 100));
    let mut client = connected_client(&mut server);

    let mut payload = ByteWriter::new();
    payload.write(&5_i32);
    client.client.send_command(ship_id + 40, &payload).expect("connected");
    settle(&mut server, &mut [&mut client], 2);

    assert!(client.client.is_connected());
    let ship = server.server.object::<Ship>(ship_id).expect("registered");
    assert!(ship.repairs.is_empty());
}

#[test]
fn client_command_resolves_entity_references() {
    init_logging();
    let mut server = TestServer::new(server_config(0, None));
    let _padding = server.world.spawn();
    let buoy = server.world.spawn();
    server.world.insert(buoy, Position::new(1.0, 1.0));
    let ship_id = server.server.register_object(Ship::new("Kestrel", 100));
    let mut client = connected_client(&mut server);

    let local = client.client.local_entity(buoy).expect("buoy was replicated");
    let mut payload = ByteWriter::new();
    payload.write(&0_i32);
    client.client.write_entity(&local, &mut payload);
    client.client.send_command(ship_id, &payload).expect("connected");
    settle(&mut server, &mut [&mut client], 2);

    let ship = server.server.object::<Ship>(ship_id).expect("registered");
    assert_eq!(ship.marked, vec![buoy]);
}

#[test]
fn server_command_runs_on_every_client() {
    init_logging();
    let mut server = TestServer::new(server_config(0, None));
    let ship_id = server.server.register_object(Ship::new("Kestrel", 100));
    let mut first = connected_client(&mut server);
    let mut second = connected_client(&mut server);

    let mut payload = ByteWriter::new();
    payload.write(&7_i32);
    server.server.broadcast_server_command(ship_id, &payload);
    settle(&mut server, &mut [&mut first, &mut second], 2);

    for client in [&first, &second] {
        let ship = client.client.object::<Ship>(ship_id).expect("created");
        assert_eq!(ship.orders, vec![7]);
    }
    assert!(server
        .server
        .object::<Ship>(ship_id)
        .expect("registered")
        .orders
        .is_empty());
}

#[test]
fn local_command_runs_as_the_server() {
    init_logging();
    let mut server = TestServer::new(server_config(0, None));
    let ship_id = server.server.register_object(Ship::new("Kestrel", 100));

    let mut payload = ByteWriter::new();
    payload.write(&3_i32);
    assert!(server
        .server
        .send_local_command(ship_id, &payload, &server.world));
    assert!(!server
        .server
        .send_local_command(ship_id + 1, &payload, &server.world));

    let ship = server.server.object::<Ship>(ship_id).expect("registered");
    assert_eq!(ship.repairs, vec![(0, 3)]);
}

#[test]
fn late_joiner_receives_the_whole_log() {
    init_logging();
    let mut server = TestServer::new(server_config(0, None));
    let mut ship = Ship::new("Kestrel", 100);
    ship.log.extend(["launched".to_string(), "docked".to_string()]);
    let ship_id = server.server.register_object(ship);
    let mut early = connected_client(&mut server);

    server
        .server
        .object_mut::<Ship>(ship_id)
        .expect("registered")
        .log
        .push("refuelled".to_string());
    settle(&mut server, &mut [&mut early], 2);

    let expected = vec![
        "launched".to_string(),
        "docked".to_string(),
        "refuelled".to_string(),
    ];
    assert_eq!(
        early.client.object::<Ship>(ship_id).expect("created").log.items(),
        expected.as_slice()
    );

    let late = connected_client(&mut server);
    assert_eq!(
        late.client.object::<Ship>(ship_id).expect("created").log.items(),
        expected.as_slice()
    );
}

#[test]
fn entity_fields_arrive_as_local_entities() {
    init_logging();
    let mut server = TestServer::new(server_config(0, None));
    let _padding = server.world.spawn();
    let beacon = server.world.spawn();
    let mut ship = Ship::new("Kestrel", 100);
    ship.target.set(beacon);
    let ship_id = server.server.register_object(ship);
    let client = connected_client(&mut server);

    let target = *client.client.object::<Ship>(ship_id).expect("created").target.get();
    assert!(client.world.is_alive(target));
    assert_eq!(client.client.local_entity(beacon), Some(target));
}

#[test]
fn game_speed_reaches_current_and_late_clients() {
    init_logging();
    let mut server = TestServer::new(server_config(0, None));
    let mut early = connected_client(&mut server);
    assert_eq!(early.client.game_speed(), 1.0);

    server.server.set_game_speed(2.5);
    settle(&mut server, &mut [&mut early], 2);
    assert_eq!(early.client.game_speed(), 2.5);

    let late = connected_client(&mut server);
    assert_eq!(late.client.game_speed(), 2.5);
}

#[test]
fn reconnecting_client_rebuilds_its_state() {
    init_logging();
    let mut server = TestServer::new(server_config(0, None));
    let buoy = server.world.spawn();
    server.world.insert(buoy, Position::new(2.0, 3.0));
    let ship_id = server.server.register_object(Ship::new("Kestrel", 100));
    let mut client = connected_client(&mut server);
    assert_eq!(client.world.count::<Position>(), 1);

    client.client.disconnect();
    let mut events = server.update();
    assert_eq!(events.read::<DisconnectEvent>().collect::<Vec<_>>(), vec![1]);
    assert!(server.server.client_ids().is_empty());

    client.client.connect_with(Box::new(server.connect()));
    settle(&mut server, &mut [&mut client], 3);
    assert!(client.client.is_connected());
    assert_eq!(client.client.client_id(), 2);
    assert!(client.client.object::<Ship>(ship_id).is_some());
    assert_eq!(client.world.count::<Position>(), 1);
    assert_eq!(client.world.entity_count(), 1);
}
