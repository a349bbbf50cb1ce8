mod commands;
mod error;
mod responses;

use std::{collections::HashMap, time::Duration};

use quick_xml::de::from_str;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

pub use commands::{CreateTarget, CreateTask};
pub use error::EngineError;

use commands::{render, GetConfigs, GetReports, GetTargets, GetTasks, StartTask};
use responses::{CreatedResource, Envelope, GetConfigsResponse, GetTargetsResponse, GetTasksResponse};

/// Statuses after which a task will never reach `Done` without operator action.
const FAILED_STATUSES: &[&str] = &["Stopped", "Interrupted", "Internal Error"];

const DONE: &str = "Done";

/// Executables the transport may spawn, by file name. The install path is
/// configurable, the program is not.
const ALLOWED_ENGINE_BINARIES: &[&str] = &["omp"];

/// Delivers one command document to the engine and returns its raw reply.
#[async_trait::async_trait]
pub trait EngineTransport: Send + Sync {
    async fn execute(&self, command: &str) -> Result<String, EngineError>;
}

/// Talks to the manager through the `omp` command line client.
pub struct OmpTransport {
    binary: String,
    timeout: Duration,
}

impl OmpTransport {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl EngineTransport for OmpTransport {
    async fn execute(&self, command: &str) -> Result<String, EngineError> {
        let args = vec!["-i".to_string(), "--xml".to_string(), command.to_string()];
        crate::security::run_command_allowlisted(&self.binary, &args, ALLOWED_ENGINE_BINARIES, self.timeout).await
    }
}

/// Typed operations over the management protocol.
pub struct EngineClient {
    transport: Box<dyn EngineTransport>,
}

impl EngineClient {
    pub fn new(transport: Box<dyn EngineTransport>) -> Self {
        Self { transport }
    }

    /// Sends `command`, rejects error envelopes and returns the raw reply.
    async fn send<C: Serialize>(&self, command: &C) -> Result<String, EngineError> {
        let xml = render(command)?;
        debug!(command = %xml, "sending engine command");
        let reply = self.transport.execute(&xml).await?;
        Envelope::parse(&reply)?.check()?;
        Ok(reply)
    }

    async fn query<C: Serialize, R: DeserializeOwned>(&self, command: &C) -> Result<R, EngineError> {
        let reply = self.send(command).await?;
        Ok(from_str(&reply)?)
    }

    /// Returns the id of the new target, if the engine reported one.
    pub async fn create_target(&self, target: &CreateTarget) -> Result<Option<String>, EngineError> {
        let created: CreatedResource = self.query(target).await?;
        Ok(created.id)
    }

    pub async fn create_task(&self, task: &CreateTask) -> Result<Option<String>, EngineError> {
        let created: CreatedResource = self.query(task).await?;
        Ok(created.id)
    }

    pub async fn list_targets(&self) -> Result<Vec<String>, EngineError> {
        let resp: GetTargetsResponse = self.query(&GetTargets {}).await?;
        Ok(resp
            .targets
            .into_iter()
            .map(|t| {
                info!(target_id = %t.id, name = t.name.as_deref().unwrap_or_default(), "found target");
                t.id
            })
            .collect())
    }

    /// Scan configurations by display name. Everything on the engine is
    /// addressed by id, so names have to be resolved through this map.
    pub async fn list_configs(&self) -> Result<HashMap<String, String>, EngineError> {
        let resp: GetConfigsResponse = self.query(&GetConfigs {}).await?;
        let mut configs = HashMap::new();
        for config in resp.configs {
            let Some(name) = config.name else { continue };
            let name = name.trim().to_string();
            info!(name = %name, config_id = %config.id, "found config");
            configs.insert(name, config.id);
        }
        Ok(configs)
    }

    pub async fn list_tasks(&self) -> Result<Vec<String>, EngineError> {
        let resp: GetTasksResponse = self.query(&GetTasks::default()).await?;
        Ok(resp
            .tasks
            .into_iter()
            .map(|t| {
                info!(task_id = %t.id, status = t.status(), "found task");
                t.id
            })
            .collect())
    }

    pub async fn start_task(&self, task_id: &str) -> Result<(), EngineError> {
        info!(task_id, "starting task run");
        self.send(&StartTask {
            task_id: task_id.to_string(),
        })
        .await?;
        Ok(())
    }

    /// `true` once every returned task node reports `Done`.
    ///
    /// Stopped or interrupted tasks never finish by themselves and are
    /// reported as [`EngineError::TaskFailed`].
    pub async fn get_task_status(&self, task_id: &str) -> Result<bool, EngineError> {
        let resp: GetTasksResponse = self.query(&GetTasks::for_task(task_id, false)).await?;
        if resp.tasks.is_empty() {
            return Err(EngineError::MissingElement("task"));
        }
        for task in &resp.tasks {
            let status = task.status();
            if FAILED_STATUSES.contains(&status) {
                return Err(EngineError::TaskFailed {
                    task_id: task.id.clone(),
                    status: status.to_string(),
                });
            }
            if status != DONE {
                debug!(task_id, status, "task not finished");
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub async fn get_report_id(&self, task_id: &str) -> Result<String, EngineError> {
        let resp: GetTasksResponse = self.query(&GetTasks::for_task(task_id, true)).await?;
        let task = resp.tasks.first().ok_or(EngineError::MissingElement("task"))?;
        if task.status() != DONE {
            warn!(task_id, status = task.status(), "scan task is in inconsistent state");
        }
        task.report_id()
            .map(str::to_string)
            .ok_or(EngineError::MissingElement("task report"))
    }

    /// Raw report document as returned by the engine.
    pub async fn get_report(&self, report_id: &str) -> Result<String, EngineError> {
        self.send(&GetReports {
            report_id: report_id.to_string(),
        })
        .await
    }
}
