use serde::{Deserialize, Serialize};

/// System-tunable values, stored as key/value rows but exposed as a typed
/// struct with the documented defaults from §6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSettings {
    pub max_priority: i32,
    pub chunk_fluctuation_percentage: i32,
    pub benchmark_cache_duration_hours: i64,
    pub speedtest_timeout_seconds: i64,
    pub scheduler_check_interval_seconds: i64,
    pub default_data_retention_months: Option<i32>,
    pub require_client_for_hashlist: bool,
    pub agent_scheduling_enabled: bool,
    pub hashlist_batch_size: i64,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            max_priority: 1000,
            chunk_fluctuation_percentage: 20,
            benchmark_cache_duration_hours: 168,
            speedtest_timeout_seconds: 180,
            scheduler_check_interval_seconds: 30,
            default_data_retention_months: None,
            require_client_for_hashlist: false,
            agent_scheduling_enabled: false,
            hashlist_batch_size: 1000,
        }
    }
}

impl SystemSettings {
    pub const KEYS: &'static [&'static str] = &[
        "max_priority",
        "chunk_fluctuation_percentage",
        "benchmark_cache_duration_hours",
        "speedtest_timeout_seconds",
        "scheduler_check_interval_seconds",
        "default_data_retention_months",
        "require_client_for_hashlist",
        "agent_scheduling_enabled",
        "hashlist_batch_size",
    ];

    /// Applies a single key/value pair parsed from storage, ignoring
    /// unknown keys and leaving the value unchanged on parse failure.
    pub fn apply_raw(&mut self, key: &str, value: &str) {
        match key {
            "max_priority" => {
                if let Ok(v) = value.parse() {
                    self.max_priority = v;
                }
            }
            "chunk_fluctuation_percentage" => {
                if let Ok(v) = value.parse() {
                    self.chunk_fluctuation_percentage = v;
                }
            }
            "benchmark_cache_duration_hours" => {
                if let Ok(v) = value.parse() {
                    self.benchmark_cache_duration_hours = v;
                }
            }
            "speedtest_timeout_seconds" => {
                if let Ok(v) = value.parse() {
                    self.speedtest_timeout_seconds = v;
                }
            }
            "scheduler_check_interval_seconds" => {
                if let Ok(v) = value.parse() {
                    self.scheduler_check_interval_seconds = v;
                }
            }
            "default_data_retention_months" => {
                self.default_data_retention_months = value.parse().ok();
            }
            "require_client_for_hashlist" => {
                if let Ok(v) = value.parse() {
                    self.require_client_for_hashlist = v;
                }
            }
            "agent_scheduling_enabled" => {
                if let Ok(v) = value.parse() {
                    self.agent_scheduling_enabled = v;
                }
            }
            "hashlist_batch_size" => {
                if let Ok(v) = value.parse() {
                    self.hashlist_batch_size = v;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let settings = SystemSettings::default();
        assert_eq!(settings.max_priority, 1000);
        assert_eq!(settings.chunk_fluctuation_percentage, 20);
        assert_eq!(settings.benchmark_cache_duration_hours, 168);
    }

    #[test]
    fn unknown_key_is_ignored() {
        let mut settings = SystemSettings::default();
        settings.apply_raw("not_a_real_key", "123");
        assert_eq!(settings, SystemSettings::default());
    }
}
