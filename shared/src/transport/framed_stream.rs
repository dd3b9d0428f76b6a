use std::mem;

use tether_serde::ByteWriter;

use super::{
    error::TransportError,
    stream::{StreamState, StreamTransport},
};
use crate::constants::{FRAME_HEADER_SIZE, MAX_FRAME_SIZE};

/// Splits a byte stream into length-prefixed frames.
///
/// Each outgoing frame is a 4-byte big-endian length followed by the payload.
/// Bytes the transport does not accept immediately wait in a send queue that
/// is flushed, in order, ahead of any later data.
pub struct FramedStream {
    transport: Box<dyn StreamTransport>,
    send_queue: Vec<u8>,
    header: [u8; FRAME_HEADER_SIZE],
    header_received: usize,
    payload: Vec<u8>,
    payload_received: usize,
    bytes_sent: u64,
}

impl FramedStream {
    pub fn new(transport: Box<dyn StreamTransport>) -> Self {
        Self {
            transport,
            send_queue: Vec::new(),
            header: [0; FRAME_HEADER_SIZE],
            header_received: 0,
            payload: Vec::new(),
            payload_received: 0,
            bytes_sent: 0,
        }
    }

    pub fn state(&mut self) -> StreamState {
        self.transport.state()
    }

    pub fn send(&mut self, packet: &ByteWriter) -> Result<(), TransportError> {
        self.send_frame(packet.as_slice())
    }

    pub fn send_frame(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let size = u32::try_from(payload.len())
            .ok()
            .filter(|size| *size <= MAX_FRAME_SIZE)
            .ok_or(TransportError::FrameTooLarge {
                size: u32::try_from(payload.len()).unwrap_or(u32::MAX),
                max: MAX_FRAME_SIZE,
            })?;

        self.send_queue.extend_from_slice(&size.to_be_bytes());
        self.send_queue.extend_from_slice(payload);
        self.flush()
    }

    /// Push queued bytes into the transport until it stops accepting them
    pub fn flush(&mut self) -> Result<(), TransportError> {
        while !self.send_queue.is_empty() {
            let written = self.transport.send_raw(&self.send_queue)?;
            if written == 0 {
                break;
            }
            self.send_queue.drain(..written);
            self.bytes_sent += written as u64;
        }
        Ok(())
    }

    /// Returns the next complete frame, or `None` if one has not fully
    /// arrived yet
    pub fn receive(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        self.flush()?;

        loop {
            if self.header_received < FRAME_HEADER_SIZE {
                let read = self
                    .transport
                    .receive_raw(&mut self.header[self.header_received..])?;
                if read == 0 {
                    return Ok(None);
                }
                self.header_received += read;
                if self.header_received < FRAME_HEADER_SIZE {
                    continue;
                }

                let size = u32::from_be_bytes(self.header);
                if size > MAX_FRAME_SIZE {
                    return Err(TransportError::FrameTooLarge {
                        size,
                        max: MAX_FRAME_SIZE,
                    });
                }
                self.payload = vec![0; size as usize];
                self.payload_received = 0;
            }

            if self.payload_received < self.payload.len() {
                let read = self
                    .transport
                    .receive_raw(&mut self.payload[self.payload_received..])?;
                if read == 0 {
                    return Ok(None);
                }
                self.payload_received += read;
                if self.payload_received < self.payload.len() {
                    continue;
                }
            }

            self.header_received = 0;
            self.payload_received = 0;
            return Ok(Some(mem::take(&mut self.payload)));
        }
    }

    pub fn update(&mut self) -> Result<(), TransportError> {
        self.flush()
    }

    /// Bytes accepted by the transport since the last call
    pub fn take_bytes_sent(&mut self) -> u64 {
        mem::take(&mut self.bytes_sent)
    }

    pub fn pending_bytes(&self) -> usize {
        self.send_queue.len()
    }

    pub fn peer_addr(&self) -> Option<std::net::SocketAddr> {
        self.transport.peer_addr()
    }

    pub fn close(&mut self) {
        let _ = self.flush();
        self.transport.close();
    }

    pub fn into_transport(self) -> Box<dyn StreamTransport> {
        self.transport
    }
}
