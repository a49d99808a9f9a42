use serde::{Deserialize, Serialize};

use crate::agent::{AgentDevice, Benchmark};
use crate::job::{AttackMode, TaskStatus};

/// The wire envelope for the agent-coordinator control channel.
/// One JSON document per frame, max frame size enforced by the transport crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlMessage {
    #[serde(flatten)]
    pub payload: MessagePayload,
    pub correlation_id: Option<String>,
}

impl ControlMessage {
    pub fn new(payload: MessagePayload) -> Self {
        Self {
            payload,
            correlation_id: None,
        }
    }

    pub fn with_correlation(payload: MessagePayload, correlation_id: impl Into<String>) -> Self {
        Self {
            payload,
            correlation_id: Some(correlation_id.into()),
        }
    }
}

/// The core message taxonomy from the control channel, §4.4.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MessagePayload {
    // --- Agent -> Coordinator ---
    HardwareReport {
        devices: Vec<AgentDevice>,
        agent_version: String,
    },
    TaskProgress {
        task_id: i64,
        progress_percent: f32,
        hashes_per_second: i64,
        keyspace_processed: i64,
        status: TaskStatus,
    },
    CrackFound {
        cracks: Vec<CrackedPair>,
    },
    BenchmarkResult {
        attack_mode: AttackMode,
        hash_type_id: i32,
        hashes_per_second: i64,
    },
    BenchmarkFailed {
        attack_mode: AttackMode,
        hash_type_id: i32,
        error: String,
    },
    FileSyncResponse {
        files: Vec<LocalFileEntry>,
    },
    FileSyncStatus {
        name: String,
        bytes_downloaded: u64,
        total_bytes: u64,
        complete: bool,
        error: Option<String>,
    },

    // --- Coordinator -> Agent ---
    TaskAssignment {
        task_id: i64,
        job_execution_id: i64,
        attack_mode: AttackMode,
        hash_type_id: i32,
        binary_path: String,
        wordlist_paths: Vec<String>,
        rule_paths: Vec<String>,
        mask: Option<String>,
        hashlist_path: String,
        chunk_start: i64,
        chunk_length: i64,
        status_interval_seconds: u32,
    },
    TaskStop {
        task_id: i64,
        reason: String,
    },
    BenchmarkRequest {
        attack_mode: AttackMode,
        hash_type_id: i32,
        binary_path: String,
        wordlist_paths: Vec<String>,
        rule_paths: Vec<String>,
        mask: Option<String>,
        test_duration_seconds: u32,
    },
    FileSyncRequest {
        types: Vec<String>,
    },
    FileSyncCommand {
        files: Vec<RemoteFileTarget>,
    },
    ConfigUpdate {
        settings: std::collections::HashMap<String, String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrackedPair {
    pub hash_value: String,
    pub plaintext: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalFileEntry {
    pub name: String,
    pub file_type: String,
    pub md5_hash: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteFileTarget {
    pub file_id: i64,
    pub name: String,
    pub file_type: String,
    pub download_url: String,
    pub md5_hash: String,
}

/// A benchmark report turned into a stored Benchmark row by the caller.
pub fn benchmark_from_result(agent_id: i64, attack_mode: AttackMode, hash_type_id: i32, hps: i64) -> Benchmark {
    Benchmark {
        agent_id,
        attack_mode,
        hash_type_id,
        hashes_per_second: hps,
        measured_at: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_through_json() {
        let message = ControlMessage::with_correlation(
            MessagePayload::TaskStop {
                task_id: 42,
                reason: "preempted".into(),
            },
            "corr-1",
        );
        let encoded = serde_json::to_string(&message).unwrap();
        let decoded: ControlMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.correlation_id.as_deref(), Some("corr-1"));
        match decoded.payload {
            MessagePayload::TaskStop { task_id, .. } => assert_eq!(task_id, 42),
            other => panic!("unexpected payload: {other:?}"),
        }
    }
}
