use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Pending,
    Active,
    Inactive,
    Error,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Gpu,
    Cpu,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDevice {
    pub index: u32,
    pub name: String,
    pub device_type: DeviceType,
    pub memory_mb: u64,
    pub driver_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

/// A per-weekday time window (minutes since midnight, coordinator-local time).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScheduleWindow {
    pub weekday: Weekday,
    pub start_minute: u16,
    pub end_minute: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: i64,
    pub name: String,
    pub status: AgentStatus,
    pub api_key: String,
    pub cert_fingerprint: Option<String>,
    pub hardware: Vec<AgentDevice>,
    pub version: String,
    pub last_heartbeat: Option<chrono::DateTime<chrono::Utc>>,
    pub schedule: Option<Vec<ScheduleWindow>>,
    pub metadata: std::collections::HashMap<String, String>,
}

impl Agent {
    /// Liveness check per §8 property 8: an agent whose last heartbeat
    /// exceeds `pong_wait` must not be considered active.
    pub fn is_alive(&self, now: chrono::DateTime<chrono::Utc>, pong_wait: chrono::Duration) -> bool {
        match self.last_heartbeat {
            Some(last) => now - last < pong_wait,
            None => false,
        }
    }
}

/// A one-time (or continuous) bootstrap credential authorizing self-registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimVoucher {
    pub id: i64,
    pub code: String,
    pub is_active: bool,
    pub is_continuous: bool,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub used_by_agent_id: Option<i64>,
}

impl ClaimVoucher {
    pub fn authorizes_registration(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        match self.expires_at {
            Some(expiry) => now < expiry,
            None => true,
        }
    }
}

/// Measured hashes-per-second for a (agent, attack mode, hash type) triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Benchmark {
    pub agent_id: i64,
    pub attack_mode: super::job::AttackMode,
    pub hash_type_id: i32,
    pub hashes_per_second: i64,
    pub measured_at: chrono::DateTime<chrono::Utc>,
}

impl Benchmark {
    pub fn is_valid(&self, now: chrono::DateTime<chrono::Utc>, cache_duration: chrono::Duration) -> bool {
        now - self.measured_at < cache_duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_continuous_voucher_expires() {
        let voucher = ClaimVoucher {
            id: 1,
            code: "abc123".into(),
            is_active: true,
            is_continuous: false,
            expires_at: Some(chrono::Utc::now() - chrono::Duration::seconds(1)),
            used_by_agent_id: None,
        };
        assert!(!voucher.authorizes_registration(chrono::Utc::now()));
    }

    #[test]
    fn benchmark_gate_respects_cache_duration() {
        let benchmark = Benchmark {
            agent_id: 1,
            attack_mode: super::super::job::AttackMode::Straight,
            hash_type_id: 0,
            hashes_per_second: 1000,
            measured_at: chrono::Utc::now() - chrono::Duration::hours(200),
        };
        assert!(!benchmark.is_valid(chrono::Utc::now(), chrono::Duration::hours(168)));
    }
}
