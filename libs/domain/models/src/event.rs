use serde::{Deserialize, Serialize};

/// A real-time event broadcast on the coordinator's internal event bus,
/// fanned out to WebSocket telemetry subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum RealTimeEvent {
    AgentConnected { agent_id: i64 },
    AgentDisconnected { agent_id: i64 },
    TaskAssigned { task_id: i64, agent_id: i64 },
    TaskProgress { task_id: i64, progress_percent: f32 },
    TaskCompleted { task_id: i64 },
    TaskInterrupted { task_id: i64, reason: String },
    CrackFound { hash_value: String },
    Log { level: String, message: String },
}
