//! Host requirements: advisory-only evaluation of a devcontainer's declared
//! `hostRequirements` (cpus, memory, storage) against the local host.
//!
//! Per the specification this is advisory: a requirement the host doesn't
//! meet is reported, never used to block a launch.

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostRequirements {
    pub cpus: Option<u64>,
    pub memory: Option<String>,
    pub storage: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortfall {
    pub requirement: String,
    pub declared: String,
}

/// Parses a size string like `4gb`, `512mb`, `1tb` into bytes.
pub fn parse_size_bytes(raw: &str) -> Option<u64> {
    let raw = raw.trim().to_lowercase();
    let (num_part, unit) = raw
        .char_indices()
        .find(|(_, c)| c.is_alphabetic())
        .map(|(i, _)| raw.split_at(i))
        .unwrap_or((raw.as_str(), ""));
    let value: f64 = num_part.trim().parse().ok()?;
    let multiplier: u64 = match unit.trim() {
        "" | "b" => 1,
        "kb" => 1_000,
        "mb" => 1_000_000,
        "gb" => 1_000_000_000,
        "tb" => 1_000_000_000_000,
        _ => return None,
    };
    Some((value * multiplier as f64) as u64)
}

/// Evaluates requirements against detected host capacity. Returns the list
/// of requirements the host falls short on; an empty list means the host
/// satisfies (or the requirement wasn't declared / couldn't be compared).
pub fn evaluate(
    requirements: &HostRequirements,
    available_cpus: u64,
    available_memory_bytes: u64,
) -> Vec<Shortfall> {
    let mut shortfalls = Vec::new();

    if let Some(cpus) = requirements.cpus {
        if available_cpus < cpus {
            shortfalls.push(Shortfall {
                requirement: "cpus".to_string(),
                declared: cpus.to_string(),
            });
        }
    }

    if let Some(memory) = &requirements.memory {
        if let Some(required_bytes) = parse_size_bytes(memory) {
            if available_memory_bytes < required_bytes {
                shortfalls.push(Shortfall {
                    requirement: "memory".to_string(),
                    declared: memory.clone(),
                });
            }
        }
    }

    for shortfall in &shortfalls {
        warn!(
            requirement = shortfall.requirement,
            declared = shortfall.declared,
            "host requirement not met (advisory only)"
        );
    }

    shortfalls
}

/// Logical CPU count, for comparison against a declared `cpus` requirement.
pub fn detected_cpus() -> u64 {
    num_cpus::get() as u64
}

/// Best-effort total system memory in bytes. Unparseable or unavailable
/// (non-Linux, missing `/proc/meminfo`) reports `u64::MAX`, so a memory
/// requirement degrades to "satisfied" rather than a false shortfall.
#[cfg(target_os = "linux")]
pub fn detected_memory_bytes() -> u64 {
    let Ok(content) = std::fs::read_to_string("/proc/meminfo") else {
        return u64::MAX;
    };
    content
        .lines()
        .find(|line| line.starts_with("MemTotal:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
        .unwrap_or(u64::MAX)
}

#[cfg(not(target_os = "linux"))]
pub fn detected_memory_bytes() -> u64 {
    u64::MAX
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_size_strings() {
        assert_eq!(parse_size_bytes("4gb"), Some(4_000_000_000));
        assert_eq!(parse_size_bytes("512mb"), Some(512_000_000));
    }

    #[test]
    fn evaluate_reports_cpu_shortfall_without_failing() {
        let req = HostRequirements {
            cpus: Some(8),
            memory: None,
            storage: None,
        };
        let shortfalls = evaluate(&req, 4, u64::MAX);
        assert_eq!(shortfalls.len(), 1);
        assert_eq!(shortfalls[0].requirement, "cpus");
    }

    #[test]
    fn evaluate_empty_when_satisfied() {
        let req = HostRequirements {
            cpus: Some(2),
            memory: Some("1gb".to_string()),
            storage: None,
        };
        assert!(evaluate(&req, 8, 16_000_000_000).is_empty());
    }
}
