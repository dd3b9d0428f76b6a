use std::collections::{HashMap, HashSet};

use tether_shared::ClientId;

/// Decides who hears a speaker. Installed with `Server::set_voice_policy`.
pub trait VoiceTargetPolicy: Send {
    /// Listeners for `speaker`, given the `target_identifier` it asked for
    /// and every connected client
    fn voice_targets(
        &mut self,
        speaker: ClientId,
        target_identifier: i32,
        clients: &[ClientId],
    ) -> HashSet<ClientId>;
}

/// Everybody hears everybody else
#[derive(Debug, Default, Clone, Copy)]
pub struct BroadcastVoice;

impl VoiceTargetPolicy for BroadcastVoice {
    fn voice_targets(
        &mut self,
        speaker: ClientId,
        _target_identifier: i32,
        clients: &[ClientId],
    ) -> HashSet<ClientId> {
        clients
            .iter()
            .copied()
            .filter(|client_id| *client_id != speaker)
            .collect()
    }
}

/// Active speakers and the listeners fixed when each one started
pub(crate) struct VoiceRouter {
    policy: Box<dyn VoiceTargetPolicy>,
    active: HashMap<ClientId, HashSet<ClientId>>,
}

impl VoiceRouter {
    pub fn new() -> Self {
        Self {
            policy: Box::new(BroadcastVoice),
            active: HashMap::new(),
        }
    }

    pub fn set_policy(&mut self, policy: Box<dyn VoiceTargetPolicy>) {
        self.policy = policy;
    }

    /// Recomputes the listener set of `speaker`. Returns the listeners that
    /// should be told the stream started.
    pub fn start(
        &mut self,
        speaker: ClientId,
        target_identifier: i32,
        clients: &[ClientId],
    ) -> Vec<ClientId> {
        let mut targets = self
            .policy
            .voice_targets(speaker, target_identifier, clients);
        targets.retain(|client_id| clients.contains(client_id));
        let mut listeners: Vec<ClientId> = targets.iter().copied().collect();
        listeners.sort_unstable();
        self.active.insert(speaker, targets);
        listeners
    }

    /// Listeners of an active speaker; `None` drops the packet
    pub fn targets(&self, speaker: ClientId) -> Option<Vec<ClientId>> {
        self.active.get(&speaker).map(|targets| {
            let mut listeners: Vec<ClientId> = targets.iter().copied().collect();
            listeners.sort_unstable();
            listeners
        })
    }

    pub fn stop(&mut self, speaker: ClientId) -> Option<Vec<ClientId>> {
        self.active.remove(&speaker).map(|targets| {
            let mut listeners: Vec<ClientId> = targets.into_iter().collect();
            listeners.sort_unstable();
            listeners
        })
    }

    /// Forgets a departed client as speaker and as listener. Returns the
    /// listeners of its stream, if it was speaking.
    pub fn remove_client(&mut self, client_id: ClientId) -> Option<Vec<ClientId>> {
        for targets in self.active.values_mut() {
            targets.remove(&client_id);
        }
        self.stop(client_id)
    }
}
