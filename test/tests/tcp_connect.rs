/// Clients dialing a real TCP port. Connecting never blocks the caller; the
/// outcome shows up in the client status on later updates.

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener},
    thread,
    time::{Duration, Instant},
};

use tether_client::{ClientStatus, DisconnectReason};
use tether_server::{Server, ServerConfig};
use tether_shared::World;
use tether_test::{client_config, protocol, server_config, TestClient, TICK};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn localhost(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, port))
}

#[test]
fn client_connects_to_a_listening_server() {
    init_logging();
    let port = 47_390;
    let mut server = Server::new(
        ServerConfig {
            listen_port: port,
            ..server_config(0, None)
        },
        protocol(),
    );
    server.listen().expect("port is free");
    let mut world = World::new();

    let mut client = TestClient::new(client_config(0, None));
    client.client.connect(localhost(port)).expect("dial started");
    assert_ne!(client.client.status(), ClientStatus::Disconnected);

    let deadline = Instant::now() + Duration::from_secs(5);
    while !client.client.is_connected() && Instant::now() < deadline {
        server.update(&mut world, TICK);
        client.update();
        thread::sleep(Duration::from_millis(5));
    }
    assert!(client.client.is_connected());
    assert_eq!(client.client.client_id(), 1);
    assert_eq!(server.client_ids(), vec![1]);
}

#[test]
fn dialing_a_closed_port_fails_to_connect() {
    init_logging();
    let address = {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind");
        listener.local_addr().expect("address")
    };

    let mut client = TestClient::new(client_config(0, None));
    if client.client.connect(address).is_ok() {
        let deadline = Instant::now() + Duration::from_secs(5);
        while client.client.status() != ClientStatus::Disconnected && Instant::now() < deadline {
            client.update();
            thread::sleep(Duration::from_millis(5));
        }
    }
    assert_eq!(client.client.status(), ClientStatus::Disconnected);
    assert_eq!(client.client.disconnect_reason(), DisconnectReason::FailedToConnect);
}
