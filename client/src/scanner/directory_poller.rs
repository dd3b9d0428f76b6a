use std::{
    mem,
    net::{IpAddr, SocketAddr, ToSocketAddrs},
    sync::{Arc, Condvar, Mutex, PoisonError},
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, warn};
use reqwest::blocking::Client;
use url::Url;

use tether_shared::{parse_directory_url, versions_compatible};

use super::ScannerError;

/// One line of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DirectoryEntry {
    pub address: SocketAddr,
    pub version: i32,
    pub name: String,
}

/// Parses `address:port:version:name` lines, keeping compatible servers.
/// The name runs to the end of the line and may itself contain `:`.
pub(crate) fn parse_directory_listing(body: &str, version: i32) -> Vec<DirectoryEntry> {
    body.lines()
        .filter_map(|line| {
            let mut parts = line.trim_end_matches('\r').splitn(4, ':');
            let host = parts.next()?.trim();
            let port: u16 = parts.next()?.trim().parse().ok()?;
            let server_version: i32 = parts.next()?.trim().parse().ok()?;
            let name = parts.next()?.to_string();
            if !versions_compatible(version, server_version) {
                return None;
            }
            let address = resolve(host, port)?;
            Some(DirectoryEntry {
                address,
                version: server_version,
                name,
            })
        })
        .collect()
}

fn resolve(host: &str, port: u16) -> Option<SocketAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(SocketAddr::new(ip, port));
    }
    (host, port).to_socket_addrs().ok()?.next()
}

struct Shared {
    pending: Vec<DirectoryEntry>,
    shutdown: bool,
}

/// Background thread fetching the directory listing every interval. Results
/// wait in a pending list until the scanner's next update.
pub(crate) struct DirectoryPoller {
    shared: Arc<(Mutex<Shared>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl DirectoryPoller {
    pub fn start(
        url: &str,
        version: i32,
        interval: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ScannerError> {
        let url = parse_directory_url(url)?;
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|error| ScannerError::Client {
                message: error.to_string(),
            })?;

        let shared = Arc::new((
            Mutex::new(Shared {
                pending: Vec::new(),
                shutdown: false,
            }),
            Condvar::new(),
        ));
        let thread_shared = shared.clone();
        let handle = thread::Builder::new()
            .name("tether-directory-poller".to_string())
            .spawn(move || run(thread_shared, client, url, version, interval))
            .map_err(|error| ScannerError::Thread {
                message: error.to_string(),
            })?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    pub fn take_pending(&self) -> Vec<DirectoryEntry> {
        let (lock, _) = &*self.shared;
        mem::take(&mut lock.lock().unwrap_or_else(PoisonError::into_inner).pending)
    }
}

impl Drop for DirectoryPoller {
    fn drop(&mut self) {
        let (lock, condvar) = &*self.shared;
        lock.lock().unwrap_or_else(PoisonError::into_inner).shutdown = true;
        condvar.notify_all();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("directory poller thread panicked");
            }
        }
    }
}

fn run(
    shared: Arc<(Mutex<Shared>, Condvar)>,
    client: Client,
    url: Url,
    version: i32,
    interval: Duration,
) {
    let (lock, condvar) = &*shared;
    loop {
        let entries = fetch(&client, &url, version);

        let mut guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.shutdown {
            return;
        }
        guard.pending.extend(entries);

        let (guard, _) = condvar
            .wait_timeout_while(guard, interval, |shared| !shared.shutdown)
            .unwrap_or_else(PoisonError::into_inner);
        if guard.shutdown {
            return;
        }
    }
}

fn fetch(client: &Client, url: &Url, version: i32) -> Vec<DirectoryEntry> {
    let body = client
        .get(url.clone())
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.text());
    match body {
        Ok(body) => {
            let entries = parse_directory_listing(&body, version);
            debug!("directory {} lists {} compatible servers", url, entries.len());
            entries
        }
        Err(error) => {
            warn!("directory {} unavailable: {}", url, error);
            Vec::new()
        }
    }
}
