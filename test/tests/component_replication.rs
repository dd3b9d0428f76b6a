/// Entity/Component replication: ECS_SET_COMPONENT for new or changed
/// components, ECS_DEL_COMPONENT for removed ones, ECS_DESTROY_ENTITY once an
/// entity with replicated state is destroyed.

use tether_shared::{ByteReader, Command, ComponentIndex, EntityRef};
use tether_test::{
    client_config, commands, server_config, settle, Health, Position, RawPeer, TestClient,
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

#[test]
fn components_follow_the_server_world() {
    init_logging();
    let mut server = TestServer::new(server_config(0, None));
    let hero = server.world.spawn();
    server.world.insert(hero, Position::new(1.0, 2.0));
    server.world.insert(hero, Health { points: 10 });
    let mut client = connected_client(&mut server);

    let local = client.client.local_entity(hero).expect("hero was replicated");
    assert_eq!(client.world.get::<Position>(local), Some(&Position::new(1.0, 2.0)));
    assert_eq!(client.world.get::<Health>(local), Some(&Health { points: 10 }));

    server.world.get_mut::<Position>(hero).expect("inserted").x = 5.0;
    settle(&mut server, &mut [&mut client], 2);
    assert_eq!(client.world.get::<Position>(local), Some(&Position::new(5.0, 2.0)));

    server.world.remove::<Health>(hero);
    settle(&mut server, &mut [&mut client], 2);
    assert!(!client.world.has::<Health>(local));
    assert!(client.world.has::<Position>(local));

    server.world.destroy(hero);
    settle(&mut server, &mut [&mut client], 2);
    assert!(!client.world.is_alive(local));
    assert_eq!(client.client.local_entity(hero), None);
}

#[test]
fn entities_spawned_later_are_replicated() {
    init_logging();
    let mut server = TestServer::new(server_config(0, None));
    let mut client = connected_client(&mut server);
    assert_eq!(client.world.entity_count(), 0);

    for index in 0..3 {
        let entity = server.world.spawn();
        server.world.insert(entity, Health { points: index });
    }
    settle(&mut server, &mut [&mut client], 2);
    assert_eq!(client.world.count::<Health>(), 3);
    let mut points: Vec<i32> = client
        .world
        .iter::<Health>()
        .map(|(_, health)| health.points)
        .collect();
    points.sort();
    assert_eq!(points, vec![0, 1, 2]);
}

#[test]
fn snapshot_carries_every_component() {
    init_logging();
    let mut server = TestServer::new(server_config(0, None));
    let hero = server.world.spawn();
    server.world.insert(hero, Position::new(0.5, 0.5));
    server.world.insert(hero, Health { points: 3 });

    let mut peer = RawPeer::new(server.connect());
    server.update();
    peer.send_auth(0, "");
    server.update();
    let frames = peer.frames();
    assert_eq!(
        commands(&frames),
        vec![
            Command::RequestAuth,
            Command::SetClientId,
            Command::SetGameSpeed,
            Command::EcsSetComponent,
            Command::EcsSetComponent,
        ]
    );

    let mut reader = ByteReader::new(&frames[3]);
    reader.try_read::<Command>().expect("command");
    assert_eq!(reader.try_read::<ComponentIndex>(), Ok(0));
    assert_eq!(reader.try_read::<EntityRef>(), Ok(hero));
    assert_eq!(reader.try_read::<f32>(), Ok(0.5));
    assert_eq!(reader.try_read::<f32>(), Ok(0.5));

    server.update();
    assert!(peer.frames().is_empty());
}

#[test]
fn destroying_unreplicated_entities_is_silent() {
    init_logging();
    let mut server = TestServer::new(server_config(0, None));
    let bare = server.world.spawn();
    let tagged = server.world.spawn();
    server.world.insert(tagged, Health { points: 1 });

    let mut peer = RawPeer::new(server.connect());
    server.update();
    peer.send_auth(0, "");
    server.update();
    peer.frames();

    server.world.destroy(bare);
    server.update();
    assert!(peer.frames().is_empty());

    server.world.destroy(tagged);
    server.update();
    let frames = peer.frames();
    assert_eq!(commands(&frames), vec![Command::EcsDestroyEntity]);
    let mut reader = ByteReader::new(&frames[0]);
    reader.try_read::<Command>().expect("command");
    assert_eq!(reader.try_read::<EntityRef>(), Ok(tagged));
}

#[test]
fn recycled_entity_replaces_the_stale_local_one() {
    init_logging();
    let mut server = TestServer::new(server_config(0, None));
    let first = server.world.spawn();
    server.world.insert(first, Health { points: 1 });
    let mut client = connected_client(&mut server);
    let first_local = client.client.local_entity(first).expect("replicated");

    server.world.destroy(first);
    let second = server.world.spawn();
    server.world.insert(second, Health { points: 2 });
    assert_eq!(second.index, first.index);
    settle(&mut server, &mut [&mut client], 2);

    assert!(!client.world.is_alive(first_local));
    let second_local = client.client.local_entity(second).expect("replicated");
    assert_eq!(client.world.get::<Health>(second_local), Some(&Health { points: 2 }));
    assert_eq!(client.world.count::<Health>(), 1);
}
