use std::{
    net::{SocketAddr, ToSocketAddrs},
    process::ExitCode,
    thread,
    time::Duration,
};

use clap::Parser;
use log::{error, info};

use tether_proxy::{Proxy, ProxyConfig};
use tether_shared::DEFAULT_SERVER_PORT;

const TICK: Duration = Duration::from_millis(10);

#[derive(Parser)]
#[command(name = "tether-proxy")]
#[command(about = "Relays tether clients over one connection to a server")]
struct Cli {
    /// Server to connect to. Without it, wait for a server to dial in.
    #[arg(long)]
    host: Option<String>,

    /// Server port
    #[arg(long, default_value_t = DEFAULT_SERVER_PORT)]
    host_port: u16,

    /// Password the proxy presents to the server
    #[arg(long)]
    password: Option<String>,

    /// Port clients connect to
    #[arg(long, default_value_t = DEFAULT_SERVER_PORT)]
    listen_port: u16,
}

fn resolve(host: &str, port: u16) -> Option<SocketAddr> {
    (host, port).to_socket_addrs().ok()?.next()
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let upstream = match cli.host.as_deref() {
        Some(host) => match resolve(host, cli.host_port) {
            Some(address) => Some(address),
            None => {
                error!("could not resolve {}:{}", host, cli.host_port);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    let mut proxy = Proxy::new(ProxyConfig {
        upstream,
        password: cli.password,
        listen_port: cli.listen_port,
        ..Default::default()
    });
    if let Err(error) = proxy.start() {
        error!("proxy failed to start: {}", error);
        return ExitCode::FAILURE;
    }
    if upstream.is_none() {
        info!("waiting for a server to connect on port {}", cli.listen_port);
    }

    loop {
        if let Err(error) = proxy.update() {
            error!("{}", error);
            return ExitCode::FAILURE;
        }
        thread::sleep(TICK);
    }
}
