use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackMode {
    Straight,
    Combination,
    BruteForceMask,
    HybridWlMask,
    HybridMaskWl,
}

/// A reusable attack recipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetJob {
    pub id: i64,
    pub name: String,
    pub attack_mode: AttackMode,
    pub wordlist_ids: Vec<i64>,
    pub rule_ids: Vec<i64>,
    pub mask: Option<String>,
    pub binary_id: i64,
    pub priority: i32,
    pub chunk_duration_seconds: i64,
    pub small_job: bool,
    pub allow_high_priority_override: bool,
    pub status_updates: bool,
}

/// An ordered set of preset jobs; submitting enqueues one JobExecution per step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: i64,
    pub name: String,
    pub preset_job_ids: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobExecutionStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Interrupted,
}

/// One application of a PresetJob to a Hashlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExecution {
    pub id: i64,
    pub preset_job_id: i64,
    pub hashlist_id: i64,
    pub priority: i32,
    pub status: JobExecutionStatus,
    pub keyspace_total: i64,
    pub keyspace_processed: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub error_message: Option<String>,
}

impl JobExecution {
    pub fn remaining_keyspace(&self) -> i64 {
        (self.keyspace_total - self.keyspace_processed).max(0)
    }

    /// Aggregate progress in 0..=100, for display only.
    pub fn progress_percent(&self) -> f32 {
        if self.keyspace_total <= 0 {
            return 0.0;
        }
        (self.keyspace_processed as f64 / self.keyspace_total as f64 * 100.0) as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// A contiguous slice of an execution's keyspace assigned to one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTask {
    pub id: i64,
    pub job_execution_id: i64,
    pub agent_id: Option<i64>,
    pub chunk_start: i64,
    pub chunk_length: i64,
    pub status: TaskStatus,
    pub progress_percent: f32,
    pub hashes_per_second: i64,
    pub error_message: Option<String>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl JobTask {
    pub fn chunk_end(&self) -> i64 {
        self.chunk_start + self.chunk_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_keyspace_never_negative() {
        let execution = JobExecution {
            id: 1,
            preset_job_id: 1,
            hashlist_id: 1,
            priority: 0,
            status: JobExecutionStatus::Running,
            keyspace_total: 100,
            keyspace_processed: 150,
            created_at: chrono::Utc::now(),
            completed_at: None,
            error_message: None,
        };
        assert_eq!(execution.remaining_keyspace(), 0);
    }
}
