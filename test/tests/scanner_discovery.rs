/// Server discovery over real sockets: local-network queries answered by a
/// listening Server, and an HTTP directory serving listings and accepting
/// registrations.

use std::{
    io::{Read, Write},
    net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream},
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use tether_client::scanner::{ScannerConfig, ScannerError, ServerScanner, ServerSource};
use tether_server::{DirectoryState, Server, ServerConfig, TetherServerError};
use tether_shared::{DirectoryUrlError, World};
use tether_test::{protocol, quiet_connection, TICK};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Bodies of every request the directory received
type Requests = Arc<Mutex<Vec<String>>>;

/// Minimal HTTP/1.1 endpoint answering every request with `body`
fn directory(body: &'static str) -> (SocketAddr, Requests) {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind directory");
    let address = listener.local_addr().expect("directory address");
    let requests: Requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = requests.clone();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else {
                continue;
            };
            if let Some(request) = answer(stream, body) {
                recorded.lock().expect("requests lock").push(request);
            }
        }
    });
    (address, requests)
}

fn answer(mut stream: TcpStream, body: &str) -> Option<String> {
    let mut request = Vec::new();
    let mut buffer = [0_u8; 1024];
    let header_end = loop {
        let read = stream.read(&mut buffer).ok()?;
        if read == 0 {
            return None;
        }
        request.extend_from_slice(&buffer[..read]);
        if let Some(position) = request.windows(4).position(|window| window == b"\r\n\r\n") {
            break position + 4;
        }
    };

    let head = String::from_utf8_lossy(&request[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while request.len() < header_end + content_length {
        let read = stream.read(&mut buffer).ok()?;
        if read == 0 {
            break;
        }
        request.extend_from_slice(&buffer[..read]);
    }

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).ok()?;
    Some(String::from_utf8_lossy(&request).to_string())
}

fn wait_until<F: FnMut() -> bool>(mut condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

fn listening_server(port: u16, version: i32) -> Server {
    let mut server = Server::new(
        ServerConfig {
            name: "Lighthouse".to_string(),
            version,
            listen_port: port,
            connection: quiet_connection(),
            announce_interval: Duration::from_secs(600),
            ..ServerConfig::default()
        },
        protocol(),
    );
    server.listen().expect("ports are free");
    server
}

fn scanner_for(port: u16, version: i32) -> ServerScanner {
    ServerScanner::new(ScannerConfig {
        version,
        server_port: port,
        broadcast_interval: Duration::from_millis(50),
        query_targets: vec![SocketAddr::from((Ipv4Addr::LOCALHOST, port))],
        ..ScannerConfig::default()
    })
}

#[test]
fn scanner_finds_a_local_server() {
    init_logging();
    let port = 47_310;
    let mut server = listening_server(port, 2);
    let mut world = World::new();
    let mut scanner = scanner_for(port, 2);

    let found = Arc::new(Mutex::new(Vec::new()));
    let seen = found.clone();
    scanner.on_new_server(move |info| {
        seen.lock().expect("found lock").push(info.name.clone());
    });
    scanner.scan_local_network().expect("scanner port");
    assert!(scanner.is_scanning_local_network());

    let discovered = wait_until(|| {
        server.update(&mut world, TICK);
        scanner.update();
        scanner.servers().iter().any(|info| {
            info.name == "Lighthouse" && info.address.port() == port && info.version == 2
        })
    });
    assert!(discovered);
    assert!(found
        .lock()
        .expect("found lock")
        .contains(&"Lighthouse".to_string()));
    assert!(scanner
        .servers()
        .iter()
        .all(|info| info.source == ServerSource::LocalNetwork));

    scanner.stop_local_network();
    assert!(!scanner.is_scanning_local_network());
    assert!(scanner.servers().is_empty());
}

#[test]
fn incompatible_servers_are_not_listed() {
    init_logging();
    let port = 47_330;
    let mut server = listening_server(port, 2);
    let mut world = World::new();
    let mut scanner = scanner_for(port, 3);
    scanner.scan_local_network().expect("scanner port");

    for _ in 0..30 {
        server.update(&mut world, TICK);
        scanner.update();
        thread::sleep(Duration::from_millis(10));
    }
    assert!(scanner.servers().is_empty());
}

#[test]
fn directory_listing_is_merged_and_filtered() {
    init_logging();
    let (address, _) = directory(
        "127.0.0.1:4000:2:Alpha\n10.0.0.5:4001:7:Beta\n127.0.0.1:4002:0:Gamma: the sequel\nnot a server\n",
    );
    let mut scanner = ServerScanner::new(ScannerConfig {
        version: 2,
        directory_interval: Duration::from_millis(100),
        ..ScannerConfig::default()
    });
    let removed = Arc::new(Mutex::new(0));
    let counter = removed.clone();
    scanner.on_removed_server(move |_| {
        *counter.lock().expect("counter lock") += 1;
    });

    scanner
        .scan_directory(&format!("http://{}/servers", address))
        .expect("valid url");
    assert!(scanner.is_scanning_directory());
    assert!(wait_until(|| {
        scanner.update();
        scanner.servers().len() == 2
    }));

    let mut names: Vec<String> = scanner
        .servers()
        .iter()
        .map(|info| info.name.clone())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Alpha".to_string(), "Gamma: the sequel".to_string()]);
    assert!(scanner
        .servers()
        .iter()
        .all(|info| info.source == ServerSource::Directory));
    let alpha = scanner
        .servers()
        .iter()
        .find(|info| info.name == "Alpha")
        .expect("listed");
    assert_eq!(alpha.address, SocketAddr::from((Ipv4Addr::LOCALHOST, 4000)));

    scanner.stop_directory();
    assert!(scanner.servers().is_empty());
    assert_eq!(*removed.lock().expect("counter lock"), 2);
}

#[test]
fn directory_rejects_unsupported_urls() {
    init_logging();
    let mut scanner = ServerScanner::new(ScannerConfig::default());
    assert!(matches!(
        scanner.scan_directory("ftp://example.com/servers"),
        Err(ScannerError::Url(DirectoryUrlError::UnsupportedScheme { .. }))
    ));
    assert!(matches!(
        scanner.scan_directory("not a url"),
        Err(ScannerError::Url(DirectoryUrlError::Invalid { .. }))
    ));
    assert!(!scanner.is_scanning_directory());
}

#[test]
fn server_registers_on_the_directory() {
    init_logging();
    let port = 47_350;
    let (address, requests) = directory("OK\n");
    let mut server = listening_server(port, 4);
    assert_eq!(server.directory_state(), DirectoryState::Disabled);

    server
        .register_on_directory(&format!("http://{}/register", address))
        .expect("valid url");
    assert!(wait_until(|| server.directory_state() == DirectoryState::Success));

    let requests = requests.lock().expect("requests lock");
    let request = requests.first().expect("one registration");
    assert!(request.starts_with("POST /register"));
    assert!(request.contains(&format!("port={}", port)));
    assert!(request.contains("name=Lighthouse"));
    assert!(request.contains("version=4"));
    drop(requests);

    server.stop_directory_registration();
    assert_eq!(server.directory_state(), DirectoryState::Disabled);
}

#[test]
fn unreachable_port_is_reported() {
    init_logging();
    let port = 47_370;
    let (address, _) = directory("NOT REACHABLE\n");
    let mut server = listening_server(port, 0);
    server
        .register_on_directory(&format!("http://{}/register", address))
        .expect("valid url");
    assert!(wait_until(
        || server.directory_state() == DirectoryState::FailedPortForwarding
    ));
}

#[test]
fn registration_needs_a_listening_server() {
    init_logging();
    let mut server = Server::new(ServerConfig::default(), protocol());
    assert_eq!(
        server.register_on_directory("http://127.0.0.1:1/register"),
        Err(TetherServerError::NotListening)
    );
}
