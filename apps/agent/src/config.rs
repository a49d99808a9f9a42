//! Command-line and environment configuration for the agent binary.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "KrakenHashes agent: cracks assigned chunks and reports results upstream")]
pub struct AgentConfig {
    /// Base URL of the coordinator, e.g. https://coordinator.internal:3000
    #[arg(long, env = "KRAKENHASHES_COORDINATOR_URL")]
    pub coordinator_url: String,

    /// One-time claim voucher code, required only on first run before
    /// this agent has a persisted API key.
    #[arg(long, env = "KRAKENHASHES_VOUCHER_CODE")]
    pub voucher_code: Option<String>,

    /// Local directory for synced wordlists/rules/binaries and persisted
    /// registration credentials.
    #[arg(long, env = "KRAKENHASHES_DATA_DIR", default_value = "./krakenhashes-agent-data")]
    pub data_dir: PathBuf,

    /// Reported hostname; defaults to the OS hostname.
    #[arg(long, env = "KRAKENHASHES_HOSTNAME")]
    pub hostname: Option<String>,
}

impl AgentConfig {
    pub fn resolved_hostname(&self) -> String {
        self.hostname.clone().unwrap_or_else(|| {
            hostname_from_env_or_proc().unwrap_or_else(|| "unknown-agent-host".to_string())
        })
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir.join("agent.json")
    }
}

fn hostname_from_env_or_proc() -> Option<String> {
    std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty()).or_else(|| {
        std::fs::read_to_string("/proc/sys/kernel/hostname")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}
