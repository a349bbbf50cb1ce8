use std::{cmp::Ordering, collections::BTreeMap, net::IpAddr, str::FromStr};

/// A port the engine saw on some host, e.g. `22/tcp` or `general/icmp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPort {
    pub name: String,
}

/// One result record of a report, before any filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFinding {
    pub host: String,
    pub port: String,
    pub name: String,
    pub description: Option<String>,
    pub threat: String,
    pub severity: String,
    pub nvt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawReport {
    pub total_vulnerabilities: u64,
    pub apps_found: u64,
    pub ports: Vec<RawPort>,
    pub findings: Vec<RawFinding>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Finding {
    pub port: String,
    pub name: String,
    pub description: Option<String>,
    pub threat_level: String,
    pub severity_score: String,
    pub nvt: String,
}

impl From<RawFinding> for Finding {
    fn from(raw: RawFinding) -> Self {
        Self {
            port: raw.port,
            name: raw.name,
            description: raw.description,
            threat_level: raw.threat,
            severity_score: raw.severity,
            nvt: raw.nvt,
        }
    }
}

/// Host address as the engine reports it. Addresses order numerically,
/// so `10.0.0.2` comes before `10.0.0.10`; names sort after all addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Host(String);

impl Host {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Host {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Host {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Ord for Host {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.parse::<IpAddr>(), other.0.parse::<IpAddr>()) {
            (Ok(a), Ok(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for Host {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Findings per host, in address order.
pub type HostFindings = BTreeMap<Host, Vec<Finding>>;

/// The filtered JSON report written after every scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ScanReport {
    pub total_vulnerabilities: u64,
    pub apps_found: u64,
    pub ports_found: Vec<String>,
    pub vulnerabilities: HostFindings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ThreatLevel {
    High,
    Medium,
    Low,
    Log,
    Debug,
    FalsePositive,
}

impl ThreatLevel {
    /// Only these levels describe actual vulnerabilities.
    pub fn is_actionable(self) -> bool {
        matches!(self, Self::High | Self::Medium | Self::Low)
    }
}

impl FromStr for ThreatLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "High" => Ok(Self::High),
            "Medium" => Ok(Self::Medium),
            "Low" => Ok(Self::Low),
            "Log" => Ok(Self::Log),
            "Debug" => Ok(Self::Debug),
            "False Positive" => Ok(Self::FalsePositive),
            other => Err(format!("unknown threat level: {other}")),
        }
    }
}
