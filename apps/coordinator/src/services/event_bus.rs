use krakenhashes_models::RealTimeEvent;
use tokio::sync::broadcast;
use tracing::{debug, instrument};

/// Broadcast capacity tuned to absorb a burst of task progress updates
/// without triggering a lagging receiver error on a slow dashboard client.
const CHANNEL_CAPACITY: usize = 4096;

/// Central fan-out point for real-time events, consumed by WebSocket
/// telemetry subscribers and the coordinator's own handlers.
pub struct EventBus {
    sender: broadcast::Sender<RealTimeEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealTimeEvent> {
        self.sender.subscribe()
    }

    #[instrument(skip(self, event))]
    pub fn publish(&self, event: RealTimeEvent) {
        match self.sender.send(event) {
            Ok(subscribers) => debug!("published event to {subscribers} subscribers"),
            Err(_) => debug!("published event with no subscribers listening"),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
