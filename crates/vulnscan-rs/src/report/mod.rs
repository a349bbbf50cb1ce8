use std::{
    collections::{BTreeSet, HashSet},
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::{de::DeserializeOwned, Serialize};

use crate::models::{Finding, Host, HostFindings, RawReport, ScanReport};

/// Findings that are never vulnerabilities: scan bookkeeping by name and
/// pseudo ports the engine uses for host-level notes.
#[derive(Debug, Clone)]
pub struct Whitelist {
    names: HashSet<String>,
    ports: HashSet<String>,
}

impl Default for Whitelist {
    fn default() -> Self {
        Self {
            names: ["Traceroute"].into_iter().map(String::from).collect(),
            ports: ["general/icmp", "general/CPE-T"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl Whitelist {
    pub fn ignores_port(&self, port: &str) -> bool {
        self.ports.contains(port)
    }

    pub fn ignores(&self, finding: &Finding) -> bool {
        self.names.contains(&finding.name) || self.ignores_port(&finding.port)
    }
}

/// Builds the filtered report out of a parsed raw report.
pub fn build_report(raw: RawReport, whitelist: &Whitelist) -> ScanReport {
    let ports_found: BTreeSet<String> = raw
        .ports
        .into_iter()
        .map(|p| p.name)
        .filter(|name| !whitelist.ignores_port(name))
        .collect();

    let mut vulnerabilities = HostFindings::new();
    for raw_finding in raw.findings {
        let host = Host::from(raw_finding.host.as_str());
        let finding = Finding::from(raw_finding);
        if whitelist.ignores(&finding) {
            continue;
        }
        vulnerabilities.entry(host).or_default().push(finding);
    }

    ScanReport {
        total_vulnerabilities: raw.total_vulnerabilities,
        apps_found: raw.apps_found,
        ports_found: ports_found.into_iter().collect(),
        vulnerabilities,
    }
}

impl ScanReport {
    pub fn finding_count(&self) -> usize {
        self.vulnerabilities.values().map(Vec::len).sum()
    }
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

/// Serializes `value` the way every JSON artifact is written: four-space indents.
pub fn to_pretty_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8(buf)?)
}

pub fn write_json<T: Serialize>(value: &T, path: &Path) -> anyhow::Result<()> {
    fs::write(path, to_pretty_json(value)?).with_context(|| format!("failed to write {}", path.display()))
}

/// `<dir>/<timestamp>--<run_id>--scan-results.xml`
pub fn raw_report_path(dir: &Path, timestamp: &str, run_id: &str) -> PathBuf {
    dir.join(format!("{timestamp}--{run_id}--scan-results.xml"))
}

pub fn json_report_path(raw_path: &Path) -> PathBuf {
    raw_path.with_extension("json")
}
