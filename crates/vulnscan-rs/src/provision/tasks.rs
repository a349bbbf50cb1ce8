use std::fmt;

use clap::ValueEnum;
use tracing::info;

use crate::engine::{CreateTask, EngineClient, EngineError};

/// Scan configurations operators may pick. The plain discovery variants
/// the engine also ships are not useful here and stay hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScanProfile {
    Discover,
    Simple,
    Dangerous,
    Slow,
    VeryDangerous,
}

impl ScanProfile {
    /// Name of the matching scan configuration on the engine.
    pub fn engine_name(self) -> &'static str {
        match self {
            Self::Discover => "Discovery",
            Self::Simple => "Full and fast",
            Self::Dangerous => "Full and fast ultimate",
            Self::Slow => "Full and very deep",
            Self::VeryDangerous => "Full and very deep ultimate",
        }
    }
}

impl fmt::Display for ScanProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.engine_name())
    }
}

/// Hosts the scanner may probe at once; follows the CPUs this process may use.
pub fn cpu_core_count() -> usize {
    num_cpus::get().max(1)
}

/// Creates one task per (target, profile) pair and returns how many were created.
pub async fn assign_scans(
    client: &EngineClient,
    profiles: &[ScanProfile],
    max_hosts: usize,
    max_checks: u32,
) -> Result<usize, EngineError> {
    let configs = client.list_configs().await?;
    let targets = client.list_targets().await?;

    let mut created = 0;
    for profile in profiles {
        info!(profile = %profile, "creating tasks for scan profile");
        let config_id = configs
            .get(profile.engine_name())
            .ok_or_else(|| EngineError::UnknownProfile(profile.engine_name().to_string()))?;
        for target_id in &targets {
            let task = CreateTask::new(profile.engine_name(), config_id, target_id, max_hosts, max_checks);
            let task_id = client.create_task(&task).await?;
            info!(
                target_id = %target_id,
                task_id = task_id.as_deref().unwrap_or_default(),
                max_hosts,
                "task created"
            );
            created += 1;
        }
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine::testing::ScriptedTransport;

    const CREATED: &str = r#"<create_task_response status="201" status_text="OK, resource created" id="task-1"/>"#;

    fn scripted() -> Arc<ScriptedTransport> {
        Arc::new(
            ScriptedTransport::default()
                .reply("get_configs", include_str!("../../fixtures/get_configs.xml"))
                .reply("get_targets", include_str!("../../fixtures/get_targets.xml"))
                .reply("create_task", CREATED),
        )
    }

    #[test]
    fn profiles_map_to_engine_configs() {
        assert_eq!(ScanProfile::Simple.engine_name(), "Full and fast");
        assert_eq!(ScanProfile::VeryDangerous.engine_name(), "Full and very deep ultimate");
        assert_eq!(
            ScanProfile::from_str("very-dangerous", false).unwrap(),
            ScanProfile::VeryDangerous
        );
        assert!(ScanProfile::from_str("empty", false).is_err());
    }

    #[test]
    fn core_count_is_positive() {
        assert!(cpu_core_count() >= 1);
    }

    #[tokio::test]
    async fn one_task_per_target_and_profile() {
        let transport = scripted();
        let client = EngineClient::new(Box::new(transport.clone()));

        let created = assign_scans(&client, &[ScanProfile::Simple, ScanProfile::Discover], 4, 3)
            .await
            .unwrap();
        assert_eq!(created, 4);

        let tasks: Vec<_> = transport
            .sent()
            .into_iter()
            .filter(|c| c.starts_with("<create_task>"))
            .collect();
        assert_eq!(tasks.len(), 4);
        assert!(tasks[0].contains("<name>Full and fast</name>"));
        assert!(tasks[0].contains(r#"<config id="daba56c8-73ec-11df-a475-002264764cea"/>"#));
        assert!(tasks[0].contains(r#"<target id="b493b7a8-7489-11df-a3ec-002264764cea"/>"#));
        assert!(tasks[1].contains(r#"<target id="c1e3a8d2-0b6f-4e1c-9e34-6f0b7f4b2a11"/>"#));
        assert!(tasks[0].contains("<scanner_name>max_hosts</scanner_name><value>4</value>"));
        assert!(tasks[2].contains(r#"<config id="8715c877-47a0-438d-98a3-27c7a6ab2196"/>"#));
    }

    #[tokio::test]
    async fn profile_missing_on_engine_is_an_error() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .reply(
                    "get_configs",
                    r#"<get_configs_response status="200" status_text="OK"><config id="c"><name>empty</name></config></get_configs_response>"#,
                )
                .reply("get_targets", include_str!("../../fixtures/get_targets.xml")),
        );
        let client = EngineClient::new(Box::new(transport.clone()));
        let err = assign_scans(&client, &[ScanProfile::Slow], 4, 3).await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownProfile(name) if name == "Full and very deep"));
        assert!(!transport.sent().iter().any(|c| c.starts_with("<create_task>")));
    }
}
