use quick_xml::de::from_str;
use serde::Deserialize;

use super::EngineError;

/// Attributes every `*_response` element carries.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(rename = "@status")]
    pub status: u16,
    #[serde(rename = "@status_text", default)]
    pub status_text: String,
}

impl Envelope {
    pub fn parse(xml: &str) -> Result<Self, EngineError> {
        Ok(from_str(xml)?)
    }

    pub fn check(self) -> Result<Self, EngineError> {
        if self.status >= 400 {
            return Err(EngineError::Status {
                code: self.status,
                text: self.status_text,
            });
        }
        Ok(self)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatedResource {
    #[serde(rename = "@id", default)]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NamedResource {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GetTargetsResponse {
    #[serde(rename = "target", default)]
    pub targets: Vec<NamedResource>,
}

#[derive(Debug, Deserialize)]
pub struct GetConfigsResponse {
    #[serde(rename = "config", default)]
    pub configs: Vec<NamedResource>,
}

#[derive(Debug, Deserialize)]
pub struct ReportRef {
    #[serde(rename = "@id")]
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReportRefs {
    #[serde(rename = "report", default)]
    pub reports: Vec<ReportRef>,
}

#[derive(Debug, Deserialize)]
pub struct LastReport {
    pub report: ReportRef,
}

#[derive(Debug, Deserialize)]
pub struct TaskNode {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reports: Option<ReportRefs>,
    #[serde(default)]
    pub last_report: Option<LastReport>,
}

impl TaskNode {
    pub fn status(&self) -> &str {
        self.status.as_deref().map(str::trim).unwrap_or_default()
    }

    /// The most recent report of the task. Detailed listings carry the
    /// full `reports` list; summaries only carry `last_report`.
    pub fn report_id(&self) -> Option<&str> {
        self.reports
            .as_ref()
            .and_then(|r| r.reports.last())
            .or(self.last_report.as_ref().map(|l| &l.report))
            .map(|r| r.id.as_str())
    }
}

#[derive(Debug, Deserialize)]
pub struct GetTasksResponse {
    #[serde(rename = "task", default)]
    pub tasks: Vec<TaskNode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_rejects_error_statuses() {
        let env = Envelope::parse(
            r#"<create_target_response status="400" status_text="Error in host specification"/>"#,
        )
        .unwrap();
        match env.check().unwrap_err() {
            EngineError::Status { code, text } => {
                assert_eq!(code, 400);
                assert_eq!(text, "Error in host specification");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn envelope_accepts_created() {
        let xml = r#"<create_task_response status="201" status_text="OK, resource created" id="254cd3ef"/>"#;
        assert_eq!(Envelope::parse(xml).unwrap().check().unwrap().status, 201);
        let created: CreatedResource = from_str(xml).unwrap();
        assert_eq!(created.id.as_deref(), Some("254cd3ef"));
    }

    #[test]
    fn targets_list_ignores_surrounding_elements() {
        let xml = include_str!("../../fixtures/get_targets.xml");
        let resp: GetTargetsResponse = from_str(xml).unwrap();
        let ids: Vec<_> = resp.targets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["b493b7a8-7489-11df-a3ec-002264764cea", "c1e3a8d2-0b6f-4e1c-9e34-6f0b7f4b2a11"]);
        assert_eq!(resp.targets[0].name.as_deref(), Some("lab"));
    }

    #[test]
    fn detailed_task_exposes_report_list() {
        let resp: GetTasksResponse = from_str(include_str!("../../fixtures/get_task_details.xml")).unwrap();
        let task = &resp.tasks[0];
        assert_eq!(task.status(), "Done");
        assert_eq!(task.report_id(), Some("f0fdf522-276d-4893-9274-fb8699dc2270"));
    }

    #[test]
    fn summary_task_falls_back_to_last_report() {
        let xml = r#"<get_tasks_response status="200" status_text="OK">
            <task id="t-1"><name>Full and fast</name><status>Done</status>
              <last_report><report id="r-9"><timestamp>2019-01-10T10:00:00Z</timestamp></report></last_report>
            </task>
        </get_tasks_response>"#;
        let resp: GetTasksResponse = from_str(xml).unwrap();
        assert_eq!(resp.tasks[0].report_id(), Some("r-9"));
    }
}
