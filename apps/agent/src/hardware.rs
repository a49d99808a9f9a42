//! Hardware inventory reported to the coordinator at connect time and
//! whenever the control channel is asked to refresh it.

use krakenhashes_models::{AgentDevice, DeviceType};
use std::fs;

/// Builds the device list this host exposes to the scheduler.
///
/// GPU enumeration depends on vendor tooling (nvidia-smi, rocm-smi) that
/// isn't portable across hosts; this always reports the CPU as a single
/// logical device and leaves GPU discovery as a deployment-time extension
/// point (an agent running on a GPU rig would need a vendor-specific probe
/// wired in here).
pub fn detect_devices() -> Vec<AgentDevice> {
    vec![AgentDevice {
        index: 0,
        name: cpu_model_name(),
        device_type: DeviceType::Cpu,
        memory_mb: total_memory_mb(),
        driver_version: None,
    }]
}

fn cpu_model_name() -> String {
    fs::read_to_string("/proc/cpuinfo")
        .ok()
        .and_then(|contents| {
            contents
                .lines()
                .find(|line| line.starts_with("model name"))
                .and_then(|line| line.split(':').nth(1))
                .map(|name| name.trim().to_string())
        })
        .unwrap_or_else(|| format!("{}-core CPU", num_cpus::get()))
}

fn total_memory_mb() -> u64 {
    fs::read_to_string("/proc/meminfo")
        .ok()
        .and_then(|contents| {
            contents
                .lines()
                .find(|line| line.starts_with("MemTotal:"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<u64>().ok())
        })
        .map(|kb| kb / 1024)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_devices_always_reports_one_cpu() {
        let devices = detect_devices();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].device_type, DeviceType::Cpu);
    }
}
