//! # System Constants
//!
//! Fixed tables and limits that define the operational boundaries of the
//! scan orchestration core: the closed set of scan types, the global stage
//! table, liveness timings and the periodic job schedule.
//!
//! None of these are derived from user configuration. A scan engine
//! configuration can only enable or disable what is declared here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of scan types the orchestrator knows how to plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    SubdomainDiscovery,
    PortScan,
    SiteScan,
    FingerprintDetect,
    DirectoryScan,
    UrlFetch,
    VulnScan,
}

/// Where a scan type keeps its tool entries inside its sub-configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolGrouping {
    /// `passive_tools: { <tool>: { enabled: .. } }`
    PassiveTools,
    /// `tools: { <tool>: { enabled: .. } }`
    Tools,
}

impl ToolGrouping {
    pub fn key(&self) -> &'static str {
        match self {
            ToolGrouping::PassiveTools => "passive_tools",
            ToolGrouping::Tools => "tools",
        }
    }
}

impl ScanType {
    /// Every supported scan type, in stage-table order
    pub const ALL: [ScanType; 7] = [
        ScanType::SubdomainDiscovery,
        ScanType::PortScan,
        ScanType::SiteScan,
        ScanType::FingerprintDetect,
        ScanType::DirectoryScan,
        ScanType::UrlFetch,
        ScanType::VulnScan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::SubdomainDiscovery => "subdomain_discovery",
            ScanType::PortScan => "port_scan",
            ScanType::SiteScan => "site_scan",
            ScanType::FingerprintDetect => "fingerprint_detect",
            ScanType::DirectoryScan => "directory_scan",
            ScanType::UrlFetch => "url_fetch",
            ScanType::VulnScan => "vuln_scan",
        }
    }

    /// Tool grouping used to decide enablement for this scan type
    pub fn tool_grouping(&self) -> ToolGrouping {
        match self {
            ScanType::SubdomainDiscovery => ToolGrouping::PassiveTools,
            ScanType::PortScan
            | ScanType::SiteScan
            | ScanType::FingerprintDetect
            | ScanType::DirectoryScan
            | ScanType::UrlFetch
            | ScanType::VulnScan => ToolGrouping::Tools,
        }
    }

    /// Position of this scan type in the global stage table
    pub fn stage_index(&self) -> Option<usize> {
        EXECUTION_STAGES
            .iter()
            .position(|stage| stage.scan_types.contains(self))
    }

    /// Names of every supported scan type, for error messages
    pub fn supported_names() -> Vec<String> {
        Self::ALL.iter().map(|t| t.as_str().to_string()).collect()
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unsupported scan type '{s}'"))
    }
}

/// How the scan types of one stage are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageMode {
    Sequential,
    Parallel,
}

impl StageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageMode::Sequential => "sequential",
            StageMode::Parallel => "parallel",
        }
    }
}

impl fmt::Display for StageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the global stage table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionStage {
    pub name: &'static str,
    pub mode: StageMode,
    pub scan_types: &'static [ScanType],
}

/// Global stage table. Order is total and never taken from user configuration.
pub const EXECUTION_STAGES: &[ExecutionStage] = &[
    ExecutionStage {
        name: "discovery",
        mode: StageMode::Sequential,
        scan_types: &[
            ScanType::SubdomainDiscovery,
            ScanType::PortScan,
            ScanType::SiteScan,
            ScanType::FingerprintDetect,
        ],
    },
    ExecutionStage {
        name: "content",
        mode: StageMode::Parallel,
        scan_types: &[ScanType::DirectoryScan, ScanType::UrlFetch],
    },
    ExecutionStage {
        name: "vulnerability",
        mode: StageMode::Sequential,
        scan_types: &[ScanType::VulnScan],
    },
];

/// Worker liveness timings
pub mod liveness {
    use std::time::Duration;

    /// Prefix of the per-worker load record key
    pub const WORKER_LOAD_KEY_PREFIX: &str = "worker:load:";

    /// Expected interval between two heartbeats of a healthy worker
    pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(3);

    /// Lifetime of a load record; five missed heartbeats mark a worker offline
    pub const LOAD_RECORD_TTL: Duration = Duration::from_secs(15);

    /// Hash field names of a load record
    pub const FIELD_CPU: &str = "cpu";
    pub const FIELD_MEMORY: &str = "mem";
    pub const FIELD_UPDATED: &str = "updated";

    /// Redis connection budget; an unreachable store must not stall startup
    pub const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
    pub const REDIS_RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);
    pub const REDIS_CONNECT_RETRIES: usize = 1;

    /// Load above which a worker is not picked for new work
    pub const DEFAULT_MAX_CPU_PERCENT: f64 = 85.0;
    pub const DEFAULT_MAX_MEMORY_PERCENT: f64 = 85.0;
}

/// Periodic job schedule
pub mod scheduler {
    use std::time::Duration;

    pub const DUE_SCANS_JOB_ID: &str = "due_scheduled_scans";
    pub const STATISTICS_JOB_ID: &str = "refresh_statistics";
    pub const CLEANUP_JOB_ID: &str = "worker_cleanup";

    /// How often due recurring scans are looked up
    pub const DUE_SCANS_INTERVAL: Duration = Duration::from_secs(60);

    /// Top of every hour (sec min hour day-of-month month day-of-week)
    pub const STATISTICS_CRON: &str = "0 0 * * * *";

    /// Every day at 03:00 UTC
    pub const CLEANUP_CRON: &str = "0 0 3 * * *";

    /// Late firings inside this window still run
    pub const MISFIRE_GRACE: Duration = Duration::from_secs(300);

    pub const MAX_INSTANCES: usize = 1;

    /// Upper bound on missed firings enumerated in one catch-up pass
    pub const MAX_CATCH_UP_FIRINGS: usize = 10_000;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_scan_type_belongs_to_exactly_one_stage() {
        for scan_type in ScanType::ALL {
            let stages = EXECUTION_STAGES
                .iter()
                .filter(|stage| stage.scan_types.contains(&scan_type))
                .count();
            assert_eq!(stages, 1, "{scan_type} must appear in exactly one stage");
        }
    }

    #[test]
    fn test_all_is_in_stage_table_order() {
        let flattened: Vec<ScanType> = EXECUTION_STAGES
            .iter()
            .flat_map(|stage| stage.scan_types.iter().copied())
            .collect();
        assert_eq!(flattened, ScanType::ALL.to_vec());
    }

    #[test]
    fn test_scan_type_string_round_trip() {
        let names: HashSet<&str> = ScanType::ALL.iter().map(|t| t.as_str()).collect();
        assert_eq!(names.len(), ScanType::ALL.len());

        for scan_type in ScanType::ALL {
            assert_eq!(scan_type.as_str().parse::<ScanType>(), Ok(scan_type));
        }
        assert!("screenshot".parse::<ScanType>().is_err());
    }

    #[test]
    fn test_serde_name_matches_as_str() {
        let json = serde_json::to_string(&ScanType::FingerprintDetect).unwrap();
        assert_eq!(json, "\"fingerprint_detect\"");
    }

    #[test]
    fn test_only_subdomain_discovery_uses_passive_tools() {
        for scan_type in ScanType::ALL {
            let expected = if scan_type == ScanType::SubdomainDiscovery {
                ToolGrouping::PassiveTools
            } else {
                ToolGrouping::Tools
            };
            assert_eq!(scan_type.tool_grouping(), expected);
        }
    }

    #[test]
    fn test_heartbeat_tolerance_is_five_beats() {
        assert_eq!(
            liveness::LOAD_RECORD_TTL.as_secs(),
            liveness::HEARTBEAT_INTERVAL.as_secs() * 5
        );
    }
}
