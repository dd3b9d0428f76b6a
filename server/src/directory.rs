use std::{
    sync::{Arc, Condvar, Mutex, PoisonError},
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{info, warn};
use reqwest::{blocking::Client, header::CONTENT_TYPE};
use thiserror::Error;
use url::{form_urlencoded, Url};

use tether_shared::{parse_directory_url, DirectoryUrlError};

/// Outcome of the most recent directory registration attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryState {
    Disabled,
    Registering,
    Success,
    FailedToReachDirectory,
    FailedPortForwarding,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Url(#[from] DirectoryUrlError),

    #[error("Could not build the directory HTTP client: {message}")]
    Client { message: String },

    #[error("Could not start the directory thread: {message}")]
    Thread { message: String },
}

pub(crate) fn registration_body(port: u16, name: &str, version: i32) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair("port", &port.to_string())
        .append_pair("name", name)
        .append_pair("version", &version.to_string())
        .finish()
}

/// Maps the body of a successful registration POST to a state. The directory
/// answers `OK` once it has reached the server's port from outside.
pub(crate) fn parse_registration_response(body: &str) -> DirectoryState {
    if body.trim() == "OK" {
        DirectoryState::Success
    } else {
        DirectoryState::FailedPortForwarding
    }
}

struct Shared {
    state: DirectoryState,
    shutdown: bool,
}

/// Background thread that keeps the server listed on a directory service
pub(crate) struct DirectoryRegistration {
    shared: Arc<(Mutex<Shared>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl DirectoryRegistration {
    pub fn start(
        url: &str,
        port: u16,
        name: &str,
        version: i32,
        refresh_interval: Duration,
        request_timeout: Duration,
    ) -> Result<Self, DirectoryError> {
        let url = parse_directory_url(url)?;
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|error| DirectoryError::Client {
                message: error.to_string(),
            })?;
        let body = registration_body(port, name, version);

        let shared = Arc::new((
            Mutex::new(Shared {
                state: DirectoryState::Registering,
                shutdown: false,
            }),
            Condvar::new(),
        ));
        let thread_shared = shared.clone();
        let handle = thread::Builder::new()
            .name("tether-directory-registration".to_string())
            .spawn(move || run(thread_shared, client, url, body, refresh_interval))
            .map_err(|error| DirectoryError::Thread {
                message: error.to_string(),
            })?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    pub fn state(&self) -> DirectoryState {
        let (lock, _) = &*self.shared;
        lock.lock().unwrap_or_else(PoisonError::into_inner).state
    }
}

impl Drop for DirectoryRegistration {
    fn drop(&mut self) {
        let (lock, condvar) = &*self.shared;
        lock.lock().unwrap_or_else(PoisonError::into_inner).shutdown = true;
        condvar.notify_all();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("directory registration thread panicked");
            }
        }
    }
}

fn run(
    shared: Arc<(Mutex<Shared>, Condvar)>,
    client: Client,
    url: Url,
    body: String,
    refresh_interval: Duration,
) {
    let (lock, condvar) = &*shared;
    loop {
        let state = register(&client, &url, &body);

        let mut guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.shutdown {
            return;
        }
        if guard.state != state {
            info!("directory registration at {}: {:?}", url, state);
        }
        guard.state = state;

        let (guard, _) = condvar
            .wait_timeout_while(guard, refresh_interval, |shared| !shared.shutdown)
            .unwrap_or_else(PoisonError::into_inner);
        if guard.shutdown {
            return;
        }
    }
}

fn register(client: &Client, url: &Url, body: &str) -> DirectoryState {
    let response = client
        .post(url.clone())
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(body.to_string())
        .send();

    match response {
        Ok(response) if response.status().is_success() => match response.text() {
            Ok(text) => parse_registration_response(&text),
            Err(error) => {
                warn!("directory {} sent an unreadable body: {}", url, error);
                DirectoryState::FailedToReachDirectory
            }
        },
        Ok(response) => {
            warn!("directory {} answered {}", url, response.status());
            DirectoryState::FailedToReachDirectory
        }
        Err(error) => {
            warn!("directory {} unreachable: {}", url, error);
            DirectoryState::FailedToReachDirectory
        }
    }
}
