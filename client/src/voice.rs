use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, PoisonError},
};

use tether_shared::ClientId;

/// One event of a remote speaker's voice stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoicePacket {
    Start { speaker: ClientId },
    Data { speaker: ClientId, bytes: Vec<u8> },
    Stop { speaker: ClientId },
}

impl VoicePacket {
    pub fn speaker(&self) -> ClientId {
        match self {
            VoicePacket::Start { speaker }
            | VoicePacket::Data { speaker, .. }
            | VoicePacket::Stop { speaker } => *speaker,
        }
    }
}

/// Incoming voice, filled by the Client during `update` and drained by an
/// audio playback thread. Clones share the same queue.
#[derive(Debug, Clone, Default)]
pub struct VoiceStreams {
    queue: Arc<Mutex<VecDeque<VoicePacket>>>,
}

impl VoiceStreams {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, packet: VoicePacket) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(packet);
    }

    pub fn pop(&self) -> Option<VoicePacket> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    pub fn drain(&self) -> Vec<VoicePacket> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
