use std::{collections::HashMap, fs, net::Ipv4Addr, path::Path};

use anyhow::Context;
use ipnet::Ipv4Net;
use serde::Deserialize;
use tracing::{error, info};

use crate::engine::{CreateTarget, EngineClient};

/// The expanded host list travels inside a single `omp` argument, and Linux
/// caps one argument at 128 KiB. A /19 (8190 hosts, at most 16 bytes each
/// with the separator) is the largest network that still fits.
const MIN_PREFIX: u8 = 19;

#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("invalid CIDR notation: {0}")]
    InvalidCidr(String),
    #[error("{0} has host bits set")]
    HostBitsSet(String),
    #[error("{cidr}: /{prefix} is too large to expand")]
    TooLarge { cidr: String, prefix: u8 },
    #[error("target {target} references unknown port list \"{port_list}\"")]
    UnknownPortList { target: String, port_list: String },
}

#[derive(Debug, Deserialize)]
struct TargetEntry {
    name: String,
    cidr: String,
    #[serde(default)]
    port_list: Option<String>,
    #[serde(default)]
    blacklist: Vec<String>,
}

/// `{"targets": [...], "<port list name>": "<port range>", ...}`
#[derive(Debug, Deserialize)]
struct TargetFile {
    targets: Vec<TargetEntry>,
    #[serde(flatten)]
    port_lists: HashMap<String, serde_json::Value>,
}

/// A target with its port list reference resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub cidr: String,
    pub port_range: Option<String>,
    pub blacklist: Vec<String>,
}

impl Target {
    pub fn to_command(&self) -> Result<CreateTarget, TargetError> {
        Ok(CreateTarget {
            name: self.name.clone(),
            hosts: join_hosts(&expand_cidr(&self.cidr)?),
            exclude_hosts: self.blacklist.join(","),
            port_range: self.port_range.clone(),
        })
    }
}

/// Usable host addresses of an IPv4 network in ascending order.
///
/// The manager rejects some CIDR notations outright, while an explicit
/// address list is always accepted.
pub fn expand_cidr(cidr: &str) -> Result<Vec<Ipv4Addr>, TargetError> {
    let net: Ipv4Net = cidr
        .trim()
        .parse()
        .map_err(|e| TargetError::InvalidCidr(format!("{cidr}: {e}")))?;
    if net.addr() != net.network() {
        return Err(TargetError::HostBitsSet(cidr.to_string()));
    }
    if net.prefix_len() < MIN_PREFIX {
        return Err(TargetError::TooLarge {
            cidr: cidr.to_string(),
            prefix: net.prefix_len(),
        });
    }
    Ok(net.hosts().collect())
}

pub fn join_hosts(hosts: &[Ipv4Addr]) -> String {
    hosts.iter().map(Ipv4Addr::to_string).collect::<Vec<_>>().join(",")
}

pub fn parse_targets(raw: &str) -> anyhow::Result<Vec<Target>> {
    let file: TargetFile = serde_json::from_str(raw).context("invalid target configuration")?;
    let mut targets = Vec::with_capacity(file.targets.len());
    for entry in file.targets {
        let port_range = match entry.port_list.as_deref().filter(|p| !p.is_empty()) {
            None => None,
            Some(list) => {
                let range = file
                    .port_lists
                    .get(list)
                    .and_then(serde_json::Value::as_str)
                    .ok_or_else(|| TargetError::UnknownPortList {
                        target: entry.name.clone(),
                        port_list: list.to_string(),
                    })?;
                Some(range.to_string())
            }
        };
        targets.push(Target {
            name: entry.name,
            cidr: entry.cidr,
            port_range,
            blacklist: entry.blacklist,
        });
    }
    Ok(targets)
}

pub fn load_targets(path: &Path) -> anyhow::Result<Vec<Target>> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_targets(&raw)
}

/// Registers every target in file order, stopping at the first rejection.
pub async fn provision_targets(client: &EngineClient, targets: &[Target]) -> anyhow::Result<usize> {
    for target in targets {
        let command = target.to_command()?;
        match client.create_target(&command).await {
            Ok(id) => info!(name = %target.name, id = id.as_deref().unwrap_or_default(), "target created"),
            Err(e) => {
                error!(name = %target.name, cidr = %target.cidr, error = %e, "engine rejected target");
                return Err(e).with_context(|| format!("failed to create target {}", target.name));
            }
        }
    }
    Ok(targets.len())
}
