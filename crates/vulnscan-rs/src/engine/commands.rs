//! Command documents understood by the OpenVAS manager.
//!
//! Each struct serializes to exactly one command element; the field names
//! are the element and attribute names of the management protocol.

use serde::Serialize;

use super::EngineError;

pub fn render<T: Serialize>(command: &T) -> Result<String, EngineError> {
    Ok(quick_xml::se::to_string(command)?)
}

#[derive(Debug, Serialize)]
#[serde(rename = "create_target")]
pub struct CreateTarget {
    pub name: String,
    pub hosts: String,
    pub exclude_hosts: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_range: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IdRef {
    #[serde(rename = "@id")]
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct Preference {
    pub scanner_name: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct Preferences {
    pub preference: Vec<Preference>,
}

#[derive(Debug, Serialize)]
#[serde(rename = "create_task")]
pub struct CreateTask {
    pub name: String,
    pub config: IdRef,
    pub target: IdRef,
    pub preferences: Preferences,
}

impl CreateTask {
    pub fn new(name: &str, config_id: &str, target_id: &str, max_hosts: usize, max_checks: u32) -> Self {
        Self {
            name: name.to_string(),
            config: IdRef {
                id: config_id.to_string(),
            },
            target: IdRef {
                id: target_id.to_string(),
            },
            preferences: Preferences {
                preference: vec![
                    Preference {
                        scanner_name: "max_hosts".to_string(),
                        value: max_hosts.to_string(),
                    },
                    Preference {
                        scanner_name: "max_checks".to_string(),
                        value: max_checks.to_string(),
                    },
                ],
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename = "get_targets")]
pub struct GetTargets {}

#[derive(Debug, Serialize)]
#[serde(rename = "get_configs")]
pub struct GetConfigs {}

#[derive(Debug, Default, Serialize)]
#[serde(rename = "get_tasks")]
pub struct GetTasks {
    #[serde(rename = "@details", skip_serializing_if = "Option::is_none")]
    pub details: Option<u8>,
    #[serde(rename = "@task_id", skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

impl GetTasks {
    /// Status query for one task. `details` is very expensive on the
    /// manager side and is only needed to find the report id.
    pub fn for_task(task_id: &str, details: bool) -> Self {
        Self {
            details: Some(u8::from(details)),
            task_id: Some(task_id.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename = "start_task")]
pub struct StartTask {
    #[serde(rename = "@task_id")]
    pub task_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename = "get_reports")]
pub struct GetReports {
    #[serde(rename = "@report_id")]
    pub report_id: String,
}
