use quick_xml::de::from_str;

use crate::models::{RawFinding, RawPort, RawReport};

#[derive(Debug, serde::Deserialize)]
struct GetReportsResponse {
    report: OuterReport,
}

/// `get_reports` wraps the actual report in a second `report` element
/// carrying format metadata.
#[derive(Debug, serde::Deserialize)]
struct OuterReport {
    report: ReportBody,
}

#[derive(Debug, serde::Deserialize)]
struct ReportBody {
    #[serde(default)]
    vulns: Option<Counter>,
    #[serde(default)]
    apps: Option<Counter>,
    #[serde(default)]
    ports: Option<PortList>,
    #[serde(default)]
    results: Option<ResultList>,
}

#[derive(Debug, serde::Deserialize)]
struct Counter {
    #[serde(default)]
    count: u64,
}

#[derive(Debug, serde::Deserialize)]
struct PortList {
    #[serde(rename = "port", default)]
    ports: Vec<PortNode>,
}

/// `<port>22/tcp<host>10.0.0.1</host>...</port>`; only the text matters.
#[derive(Debug, serde::Deserialize)]
struct PortNode {
    #[serde(rename = "$text", default)]
    name: String,
}

#[derive(Debug, serde::Deserialize)]
struct ResultList {
    #[serde(rename = "result", default)]
    results: Vec<ResultNode>,
}

#[derive(Debug, serde::Deserialize)]
struct ResultNode {
    name: String,
    host: ResultHost,
    port: String,
    nvt: NvtNode,
    threat: String,
    severity: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct ResultHost {
    #[serde(rename = "$text", default)]
    addr: String,
}

#[derive(Debug, serde::Deserialize)]
struct NvtNode {
    #[serde(rename = "@oid", default)]
    oid: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl NvtNode {
    /// Checks are identified by OID; older feeds only carry a name.
    fn identifier(self) -> String {
        self.oid
            .filter(|oid| !oid.trim().is_empty())
            .or(self.name)
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    }
}

pub fn parse_report_xml(xml: &str) -> anyhow::Result<RawReport> {
    let doc: GetReportsResponse = from_str(xml)?;
    let body = doc.report.report;

    let ports = body
        .ports
        .map(|p| p.ports)
        .unwrap_or_default()
        .into_iter()
        .map(|p| RawPort {
            name: p.name.trim().to_string(),
        })
        .collect();

    let findings = body
        .results
        .map(|r| r.results)
        .unwrap_or_default()
        .into_iter()
        .map(|r| RawFinding {
            host: r.host.addr.trim().to_string(),
            port: r.port.trim().to_string(),
            name: r.name.trim().to_string(),
            description: r.description.filter(|d| !d.trim().is_empty()),
            threat: r.threat.trim().to_string(),
            severity: r.severity.trim().to_string(),
            nvt: r.nvt.identifier(),
        })
        .collect();

    Ok(RawReport {
        total_vulnerabilities: body.vulns.map(|c| c.count).unwrap_or_default(),
        apps_found: body.apps.map(|c| c.count).unwrap_or_default(),
        ports,
        findings,
    })
}
