use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
};

use super::{
    error::TransportError,
    stream::{StreamListener, StreamState, StreamTransport},
};

#[derive(Default)]
struct Pipe {
    bytes: VecDeque<u8>,
    closed: bool,
}

fn lock(pipe: &Mutex<Pipe>) -> MutexGuard<'_, Pipe> {
    match pipe.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// In-process stream endpoint. Created in connected pairs.
pub struct LocalTransport {
    outgoing: Arc<Mutex<Pipe>>,
    incoming: Arc<Mutex<Pipe>>,
    write_limit: Option<usize>,
    closed: bool,
}

impl LocalTransport {
    pub fn pair() -> (LocalTransport, LocalTransport) {
        let a_to_b = Arc::new(Mutex::new(Pipe::default()));
        let b_to_a = Arc::new(Mutex::new(Pipe::default()));
        let a = LocalTransport {
            outgoing: a_to_b.clone(),
            incoming: b_to_a.clone(),
            write_limit: None,
            closed: false,
        };
        let b = LocalTransport {
            outgoing: b_to_a,
            incoming: a_to_b,
            write_limit: None,
            closed: false,
        };
        (a, b)
    }

    /// Cap how many unread bytes may sit in the outgoing direction, to
    /// simulate a full socket buffer
    pub fn set_write_limit(&mut self, limit: Option<usize>) {
        self.write_limit = limit;
    }
}

impl StreamTransport for LocalTransport {
    fn state(&mut self) -> StreamState {
        if self.closed {
            return StreamState::Closed;
        }
        let incoming = lock(&self.incoming);
        if incoming.closed && incoming.bytes.is_empty() {
            StreamState::Closed
        } else {
            StreamState::Connected
        }
    }

    fn send_raw(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let mut outgoing = lock(&self.outgoing);
        if outgoing.closed {
            return Err(TransportError::Closed);
        }
        let count = match self.write_limit {
            Some(limit) => data.len().min(limit.saturating_sub(outgoing.bytes.len())),
            None => data.len(),
        };
        outgoing.bytes.extend(&data[..count]);
        Ok(count)
    }

    fn receive_raw(&mut self, buffer: &mut [u8]) -> Result<usize, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let mut incoming = lock(&self.incoming);
        if incoming.bytes.is_empty() {
            return if incoming.closed {
                Err(TransportError::Closed)
            } else {
                Ok(0)
            };
        }
        let count = buffer.len().min(incoming.bytes.len());
        for (slot, byte) in buffer.iter_mut().zip(incoming.bytes.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        lock(&self.outgoing).closed = true;
        lock(&self.incoming).closed = true;
    }
}

impl Drop for LocalTransport {
    fn drop(&mut self) {
        self.close();
    }
}

type PendingQueue = Arc<Mutex<VecDeque<LocalTransport>>>;

/// Accepting half of an in-process listener
pub struct LocalListener {
    pending: PendingQueue,
}

/// Dialing half of an in-process listener
#[derive(Clone)]
pub struct LocalConnector {
    pending: PendingQueue,
}

pub fn local_listener() -> (LocalListener, LocalConnector) {
    let pending: PendingQueue = Arc::new(Mutex::new(VecDeque::new()));
    (
        LocalListener {
            pending: pending.clone(),
        },
        LocalConnector { pending },
    )
}

impl LocalConnector {
    pub fn connect(&self) -> LocalTransport {
        let (client_end, server_end) = LocalTransport::pair();
        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        pending.push_back(server_end);
        client_end
    }
}

impl StreamListener for LocalListener {
    fn accept(&mut self) -> Result<Option<Box<dyn StreamTransport>>, TransportError> {
        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(pending
            .pop_front()
            .map(|transport| Box::new(transport) as Box<dyn StreamTransport>))
    }
}
