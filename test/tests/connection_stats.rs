/// Per-connection statistics the server keeps: round-trip time from
/// keep-alives and the outgoing data rate.

use std::{
    thread,
    time::{Duration, Instant},
};

use tether_shared::ConnectionConfig;
use tether_test::{client_config, server_config, settle, Ship, TestClient, TestServer, TICK};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn keep_alive_measures_ping() {
    init_logging();
    let mut config = server_config(0, None);
    config.connection = ConnectionConfig::new(Duration::from_secs(30), Duration::from_millis(20));
    let mut server = TestServer::new(config);
    let mut client = TestClient::connected_to(client_config(0, None), server.connect());
    settle(&mut server, &mut [&mut client], 3);
    let client_id = client.client.client_id();
    assert_eq!(client_id, 1);
    assert_eq!(server.server.ping(client_id), None);

    let deadline = Instant::now() + Duration::from_secs(5);
    while server.server.ping(client_id).is_none() && Instant::now() < deadline {
        settle(&mut server, &mut [&mut client], 1);
        thread::sleep(TICK);
    }

    let ping = server.server.ping(client_id).expect("keep-alive answered");
    assert!(ping < Duration::from_secs(5));
    assert_eq!(server.server.ping(42), None);
    assert!(client.client.is_connected());
}

#[test]
fn send_rate_counts_replicated_bytes() {
    init_logging();
    let mut server = TestServer::new(server_config(0, None));
    let ship_id = server.server.register_object(Ship::new("Tern", 0));
    let mut client = TestClient::connected_to(client_config(0, None), server.connect());
    settle(&mut server, &mut [&mut client], 3);
    assert_eq!(server.server.send_data_rate(), 0.0);

    let started = Instant::now();
    let mut hull = 0;
    while started.elapsed() < Duration::from_millis(1300) {
        hull += 1;
        if let Some(ship) = server.server.object_mut::<Ship>(ship_id) {
            ship.hull.set(hull);
        }
        settle(&mut server, &mut [&mut client], 1);
        thread::sleep(TICK);
    }

    assert!(server.server.send_data_rate() > 0.0);
    let per_client = server.server.send_data_rate_per_client();
    assert_eq!(per_client.len(), 1);
    assert_eq!(per_client[0].0, client.client.client_id());
    assert!(per_client[0].1 > 0.0);
    assert!(server.server.update_time() < Duration::from_secs(1));

    let ship = client.client.object::<Ship>(ship_id).expect("replicated");
    assert_eq!(*ship.hull.get(), hull);
}
