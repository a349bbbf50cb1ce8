mod poll;

use std::{
    fmt,
    path::{Path, PathBuf},
};

use anyhow::Context;
use rand::seq::SliceRandom;
use tracing::{error, info, warn};
use uuid::Uuid;

pub use poll::{poll_until, PollError, PollPolicy};

use crate::{
    config::AppConfig,
    engine::{EngineClient, EngineError},
    parser::parse_report_xml,
    report::{build_report, json_report_path, raw_report_path, write_json, Whitelist},
    upload::ReportUploader,
};

/// Where a task is in its scan pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Created,
    Started,
    Polling,
    Done,
    Fetched,
    Reported,
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::Polling => "polling",
            Self::Done => "done",
            Self::Fetched => "fetched",
            Self::Reported => "reported",
        })
    }
}

/// Artifacts written for one finished task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub task_id: String,
    pub report_id: String,
    pub raw_path: PathBuf,
    pub json_path: PathBuf,
    pub findings: usize,
    pub uploaded: Option<String>,
}

pub struct ScanRunner {
    client: EngineClient,
    uploader: Option<Box<dyn ReportUploader>>,
    policy: PollPolicy,
    report_dir: PathBuf,
    whitelist: Whitelist,
    run_id: String,
}

impl ScanRunner {
    pub fn new(client: EngineClient, uploader: Option<Box<dyn ReportUploader>>, cfg: &AppConfig) -> Self {
        let mut run_id = Uuid::new_v4().simple().to_string();
        run_id.truncate(12);
        Self {
            client,
            uploader,
            policy: PollPolicy {
                interval: cfg.poll_interval(),
                max_failures: cfg.poll_failure_ceiling,
            },
            report_dir: cfg.report_dir.clone(),
            whitelist: Whitelist::default(),
            run_id,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Runs every task on the engine, one at a time, in random order so no
    /// task is systematically scanned while the engine is busiest. The first
    /// failing task ends the whole run.
    pub async fn run(&self) -> anyhow::Result<Vec<TaskOutcome>> {
        let mut tasks = self.client.list_tasks().await.context("failed to list tasks")?;
        tasks.shuffle(&mut rand::thread_rng());
        info!(run_id = %self.run_id, tasks = tasks.len(), "starting scan run");

        let mut outcomes = Vec::with_capacity(tasks.len());
        for task_id in &tasks {
            outcomes.push(self.run_task(task_id).await?);
        }
        Ok(outcomes)
    }

    pub async fn run_task(&self, task_id: &str) -> anyhow::Result<TaskOutcome> {
        info!(task_id, phase = %TaskPhase::Created, "picked task");
        self.client
            .start_task(task_id)
            .await
            .with_context(|| format!("failed to start task {task_id}"))?;
        info!(task_id, phase = %TaskPhase::Started, "task started");

        info!(task_id, phase = %TaskPhase::Polling, interval = ?self.policy.interval, "waiting for task");
        let failures = match poll_until(self.policy, || self.client.get_task_status(task_id), EngineError::is_transient).await {
            Ok(failures) => failures,
            Err(e @ PollError::Exhausted { .. }) => {
                error!(task_id, "the scan looks to have failed, wait for resurrection");
                return Err(e.into());
            }
            Err(PollError::Fatal(e)) => return Err(e).with_context(|| format!("task {task_id} did not finish")),
        };
        info!(task_id, phase = %TaskPhase::Done, failures, "scan task OK");

        let report_id = self.client.get_report_id(task_id).await?;
        let raw_path = self.save_report_xml(&report_id).await?;
        info!(task_id, phase = %TaskPhase::Fetched, report_id = %report_id, path = %raw_path.display(), "report saved");

        let (json_path, findings) = self.save_report_json(&raw_path).await?;
        let uploaded = self.upload(&json_path).await;
        info!(task_id, phase = %TaskPhase::Reported, findings, path = %json_path.display(), "report written");

        Ok(TaskOutcome {
            task_id: task_id.to_string(),
            report_id,
            raw_path,
            json_path,
            findings,
            uploaded,
        })
    }

    async fn save_report_xml(&self, report_id: &str) -> anyhow::Result<PathBuf> {
        let now = chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string();
        let path = raw_report_path(&self.report_dir, &now, &self.run_id);
        let body = self.client.get_report(report_id).await?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    async fn save_report_json(&self, raw_path: &Path) -> anyhow::Result<(PathBuf, usize)> {
        let xml = tokio::fs::read_to_string(raw_path)
            .await
            .with_context(|| format!("failed to read {}", raw_path.display()))?;
        let raw = parse_report_xml(&xml).with_context(|| format!("failed to parse {}", raw_path.display()))?;
        let report = build_report(raw, &self.whitelist);
        let json_path = json_report_path(raw_path);
        write_json(&report, &json_path)?;
        Ok((json_path, report.finding_count()))
    }

    /// Uploading is optional; failures are logged and the run goes on.
    async fn upload(&self, path: &Path) -> Option<String> {
        let uploader = self.uploader.as_ref()?;
        match uploader.upload(path).await {
            Ok(key) => {
                info!(key = %key, "report uploaded");
                Some(key)
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "report upload skipped");
                None
            }
        }
    }
}
