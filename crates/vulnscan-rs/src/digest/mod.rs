//! Severity-bucketed summary of a scan report for dashboards.
//!
//! Findings are grouped by threat level, then by the check that produced
//! them, so a vulnerability present on many hosts shows up once with the
//! list of affected hosts.

use std::{collections::BTreeMap, path::Path};

use serde::Serialize;
use tracing::info;

use crate::{
    models::{Host, HostFindings, ThreatLevel},
    report::{read_json, to_pretty_json, write_json, Whitelist},
};

/// The part of a scan report the digest reads. Counts and port lists are
/// left alone, so reports that store counts as strings load just the same.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct DigestInput {
    pub vulnerabilities: HostFindings,
}

/// Affected hosts. Published as `{"<host>": ""}`, so values are always empty.
pub type HostSet = BTreeMap<Host, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestEntry {
    pub score: String,
    pub name: String,
    pub description: Option<String>,
    pub found_on: HostSet,
}

/// Digest entries keyed by check identifier.
pub type Tier = BTreeMap<String, DigestEntry>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Digest {
    #[serde(rename = "High")]
    pub high: Tier,
    #[serde(rename = "Medium")]
    pub medium: Tier,
    #[serde(rename = "Low")]
    pub low: Tier,
}

impl Digest {
    fn tier_mut(&mut self, level: ThreatLevel) -> Option<&mut Tier> {
        match level {
            ThreatLevel::High => Some(&mut self.high),
            ThreatLevel::Medium => Some(&mut self.medium),
            ThreatLevel::Low => Some(&mut self.low),
            _ => None,
        }
    }
}

/// Reports written by older runs may still carry whitelisted entries, so
/// the whitelist is applied again here.
pub fn build_digest(input: &DigestInput, whitelist: &Whitelist) -> Digest {
    let mut digest = Digest::default();
    for (host, findings) in &input.vulnerabilities {
        for finding in findings {
            if whitelist.ignores(finding) {
                continue;
            }
            // log-only and unknown levels are not vulnerabilities
            let Ok(level) = finding.threat_level.parse::<ThreatLevel>() else {
                continue;
            };
            if !level.is_actionable() {
                continue;
            }
            let Some(tier) = digest.tier_mut(level) else {
                continue;
            };
            tier.entry(finding.nvt.clone())
                .or_insert_with(|| DigestEntry {
                    score: finding.severity_score.clone(),
                    name: finding.name.clone(),
                    description: finding.description.clone(),
                    found_on: HostSet::default(),
                })
                .found_on
                .insert(host.clone(), String::new());
        }
    }
    digest
}

/// Reads one JSON report and writes its digest to `output`, or stdout.
pub fn run(input: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let report: DigestInput = read_json(input)?;
    let digest = build_digest(&report, &Whitelist::default());
    info!(
        high = digest.high.len(),
        medium = digest.medium.len(),
        low = digest.low.len(),
        "digest built"
    );
    match output {
        Some(path) => write_json(&digest, path),
        None => {
            println!("{}", to_pretty_json(&digest)?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{Finding, ScanReport},
        parser::parse_report_xml,
        report::build_report,
    };

    fn finding(nvt: &str, threat: &str, name: &str) -> Finding {
        Finding {
            port: "22/tcp".into(),
            name: name.into(),
            description: Some(format!("{name} details")),
            threat_level: threat.into(),
            severity_score: "5.0".into(),
            nvt: nvt.into(),
        }
    }

    fn report(entries: &[(&str, Finding)]) -> ScanReport {
        let mut report = ScanReport::default();
        for (host, f) in entries {
            report.vulnerabilities.entry(Host::from(*host)).or_default().push(f.clone());
        }
        report
    }

    fn digest_of(entries: &[(&str, Finding)]) -> Digest {
        let input = DigestInput {
            vulnerabilities: report(entries).vulnerabilities,
        };
        build_digest(&input, &Whitelist::default())
    }

    fn read_digest(path: &Path) -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn same_check_on_two_hosts_is_one_entry() {
        let ssh = finding("1.3.6.1.4.1.25623.X", "Medium", "OpenSSH disclosure");
        let digest = digest_of(&[("10.0.0.1", ssh.clone()), ("10.0.0.2", ssh)]);
        assert_eq!(digest.medium.len(), 1);
        let entry = &digest.medium["1.3.6.1.4.1.25623.X"];
        let hosts: Vec<&str> = entry.found_on.keys().map(Host::as_str).collect();
        assert_eq!(hosts, ["10.0.0.1", "10.0.0.2"]);
        assert_eq!(entry.score, "5.0");
        assert_eq!(entry.name, "OpenSSH disclosure");
    }

    #[test]
    fn first_occurrence_sets_entry_details() {
        let first = finding("oid-1", "High", "first");
        let mut second = finding("oid-1", "High", "second");
        second.severity_score = "9.0".into();
        let digest = digest_of(&[("10.0.0.1", first), ("10.0.0.1", second)]);
        let entry = &digest.high["oid-1"];
        assert_eq!(entry.name, "first");
        assert_eq!(entry.found_on.len(), 1);
    }

    #[test]
    fn non_actionable_levels_are_dropped() {
        let digest = digest_of(&[
            ("10.0.0.1", finding("oid-log", "Log", "OS Detection")),
            ("10.0.0.1", finding("oid-fp", "False Positive", "noise")),
            ("10.0.0.1", finding("oid-x", "Critical", "unknown level")),
            ("10.0.0.1", finding("oid-low", "Low", "TCP timestamps")),
        ]);
        assert!(digest.high.is_empty());
        assert!(digest.medium.is_empty());
        assert_eq!(digest.low.keys().collect::<Vec<_>>(), ["oid-low"]);
    }

    #[test]
    fn same_check_in_different_tiers_stays_separate() {
        let digest = digest_of(&[
            ("10.0.0.1", finding("oid-1", "High", "a")),
            ("10.0.0.2", finding("oid-1", "Low", "a")),
        ]);
        assert!(digest.high.contains_key("oid-1"));
        assert!(digest.low.contains_key("oid-1"));
        assert!(digest.medium.is_empty());
    }

    #[test]
    fn serialized_shape() {
        let digest = digest_of(&[("10.0.0.1", finding("oid-1", "Medium", "a"))]);
        let json = serde_json::to_value(&digest).unwrap();
        assert_eq!(json["High"], serde_json::json!({}));
        assert_eq!(json["Low"], serde_json::json!({}));
        assert_eq!(
            json["Medium"]["oid-1"],
            serde_json::json!({
                "score": "5.0",
                "name": "a",
                "description": "a details",
                "found_on": {"10.0.0.1": ""}
            })
        );
    }

    #[test]
    fn run_writes_digest_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("scan.json");
        let output = dir.path().join("digest.json");
        let ssh = finding("1.3.6.1.4.1.25623.X", "Medium", "OpenSSH disclosure");
        write_json(&report(&[("10.0.0.1", ssh)]), &input).unwrap();

        run(&input, Some(&output)).unwrap();

        let written = read_digest(&output);
        assert_eq!(
            written["Medium"]["1.3.6.1.4.1.25623.X"]["found_on"],
            serde_json::json!({"10.0.0.1": ""})
        );
    }

    #[test]
    fn run_drops_whitelisted_entries_from_old_reports() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("scan.json");
        let output = dir.path().join("digest.json");
        let mut traceroute = finding("oid-trace", "Low", "Traceroute");
        traceroute.port = "general/icmp".into();
        write_json(&report(&[("10.0.0.1", traceroute)]), &input).unwrap();

        run(&input, Some(&output)).unwrap();

        let written = read_digest(&output);
        assert_eq!(written["Low"], serde_json::json!({}));
    }

    #[test]
    fn first_occurrence_follows_address_order() {
        let mut later = finding("oid-1", "High", "seen on .10");
        later.severity_score = "9.0".into();
        let digest = digest_of(&[
            ("10.0.0.10", later),
            ("10.0.0.2", finding("oid-1", "High", "seen on .2")),
        ]);
        let entry = &digest.high["oid-1"];
        assert_eq!(entry.name, "seen on .2");
        assert_eq!(entry.score, "5.0");
        let hosts: Vec<&str> = entry.found_on.keys().map(Host::as_str).collect();
        assert_eq!(hosts, ["10.0.0.2", "10.0.0.10"]);
    }

    #[test]
    fn run_accepts_reports_with_string_counts_and_no_ports() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("scan.json");
        let output = dir.path().join("digest.json");
        std::fs::write(
            &input,
            r#"{
                "total_vulnerabilities": "3",
                "apps_found": "4",
                "vulnerabilities": {
                    "10.0.0.1": [{
                        "port": "443/tcp",
                        "name": "SSL/TLS: Report Weak Cipher Suites",
                        "description": null,
                        "threat_level": "High",
                        "severity_score": "7.5",
                        "nvt": "SSL/TLS: Report Weak Cipher Suites"
                    }]
                }
            }"#,
        )
        .unwrap();

        run(&input, Some(&output)).unwrap();

        let entry = &read_digest(&output)["High"]["SSL/TLS: Report Weak Cipher Suites"];
        assert_eq!(entry["score"], "7.5");
        assert!(entry["description"].is_null());
        assert_eq!(entry["found_on"], serde_json::json!({"10.0.0.1": ""}));
    }

    #[test]
    fn engine_report_to_digest() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("scan.json");
        let output = dir.path().join("digest.json");
        let raw = parse_report_xml(include_str!("../../fixtures/get_report.xml")).unwrap();
        write_json(&build_report(raw, &Whitelist::default()), &input).unwrap();

        run(&input, Some(&output)).unwrap();

        let digest = read_digest(&output);
        let ssh = &digest["Medium"]["1.3.6.1.4.1.25623.1.0.108001"];
        assert_eq!(ssh["name"], "OpenSSH disclosure");
        assert_eq!(ssh["score"], "5.0");
        assert_eq!(ssh["found_on"], serde_json::json!({"10.0.0.1": "", "10.0.0.2": ""}));
        assert_eq!(digest["Medium"].as_object().unwrap().len(), 1);
        let text = std::fs::read_to_string(&output).unwrap();
        assert!(!text.contains("Traceroute"));
        assert!(!text.contains("OS Detection"));
    }

    #[test]
    fn run_fails_on_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(&dir.path().join("absent.json"), None).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
