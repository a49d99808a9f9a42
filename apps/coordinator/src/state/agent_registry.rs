use krakenhashes_models::ControlMessage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, RwLock};

/// The live half of a connected agent: the channel used to push messages
/// down its control channel, plus the hash type it is currently working
/// on (needed to resolve bare crack reports back to a hash row).
///
/// `generation` disambiguates a displaced connection from the one that
/// replaced it: if an agent opens a second control channel before the
/// first one notices it's dead, the first connection's teardown must not
/// be allowed to remove the second connection's entry out from under it.
struct ConnectionHandle {
    sender: mpsc::UnboundedSender<ControlMessage>,
    current_hash_type_id: Option<i32>,
    generation: u64,
}

/// In-memory registry of currently connected agents. A row in the
/// `agents` table can exist with no entry here (the agent is known but
/// not currently connected); an entry here always corresponds to a row.
pub struct AgentRegistry {
    connections: RwLock<HashMap<i64, ConnectionHandle>>,
    next_generation: AtomicU64,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self { connections: RwLock::new(HashMap::new()), next_generation: AtomicU64::new(0) }
    }

    /// Registers a new connection for `agent_id`, displacing whatever
    /// connection was there before, and returns the generation assigned
    /// to it. Callers must hold on to this and pass it back to
    /// `unregister` so a stale teardown can't clobber a newer connection.
    pub async fn register(&self, agent_id: i64, sender: mpsc::UnboundedSender<ControlMessage>) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        self.connections
            .write()
            .await
            .insert(agent_id, ConnectionHandle { sender, current_hash_type_id: None, generation });
        generation
    }

    /// Removes the entry for `agent_id` only if it still belongs to
    /// `generation`. Returns whether the removal happened, so the caller
    /// knows whether it's still safe to mark the agent inactive.
    pub async fn unregister(&self, agent_id: i64, generation: u64) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get(&agent_id) {
            Some(handle) if handle.generation == generation => {
                connections.remove(&agent_id);
                true
            }
            _ => false,
        }
    }

    pub async fn is_connected(&self, agent_id: i64) -> bool {
        self.connections.read().await.contains_key(&agent_id)
    }

    /// Sends a message down the agent's control channel. Returns `false`
    /// if the agent is not currently connected or its channel is closed.
    pub async fn send_to(&self, agent_id: i64, message: ControlMessage) -> bool {
        match self.connections.read().await.get(&agent_id) {
            Some(handle) => handle.sender.send(message).is_ok(),
            None => false,
        }
    }

    pub async fn set_current_hash_type(&self, agent_id: i64, hash_type_id: i32) {
        if let Some(handle) = self.connections.write().await.get_mut(&agent_id) {
            handle.current_hash_type_id = Some(hash_type_id);
        }
    }

    pub async fn current_hash_type(&self, agent_id: i64) -> Option<i32> {
        self.connections.read().await.get(&agent_id).and_then(|h| h.current_hash_type_id)
    }

    pub async fn connected_agent_ids(&self) -> Vec<i64> {
        self.connections.read().await.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use krakenhashes_models::MessagePayload;

    #[tokio::test]
    async fn send_to_unknown_agent_returns_false() {
        let registry = AgentRegistry::new();
        let sent = registry
            .send_to(1, ControlMessage::new(MessagePayload::TaskStop { task_id: 1, reason: "x".into() }))
            .await;
        assert!(!sent);
    }

    #[tokio::test]
    async fn registered_agent_is_connected_until_unregistered() {
        let registry = AgentRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let generation = registry.register(7, tx).await;
        assert!(registry.is_connected(7).await);
        assert!(registry.unregister(7, generation).await);
        assert!(!registry.is_connected(7).await);
    }

    #[tokio::test]
    async fn stale_unregister_does_not_clobber_a_newer_connection() {
        let registry = AgentRegistry::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        let first_generation = registry.register(7, tx1).await;
        let second_generation = registry.register(7, tx2).await;
        assert_ne!(first_generation, second_generation);

        assert!(!registry.unregister(7, first_generation).await);
        assert!(registry.is_connected(7).await);

        assert!(registry.unregister(7, second_generation).await);
        assert!(!registry.is_connected(7).await);
    }
}
