use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("command not allowed: {0}")]
    CommandNotAllowed(String),
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("command timed out after {0:?}")]
    Timeout(Duration),
    #[error("command failed (exit code {code:?}): {stderr}")]
    CommandFailed { code: Option<i32>, stderr: String },
    #[error("engine returned status {code}: {text}")]
    Status { code: u16, text: String },
    #[error("malformed engine response: {0}")]
    Xml(String),
    #[error("engine response is missing {0}")]
    MissingElement(&'static str),
    #[error("scan profile \"{0}\" is not known to the engine")]
    UnknownProfile(String),
    #[error("task {task_id} ended in state \"{status}\"")]
    TaskFailed { task_id: String, status: String },
}

impl EngineError {
    /// Errors the engine is known to recover from on its own, e.g. the
    /// manager refusing connections for a while after a scan finishes.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Spawn { .. } | Self::Timeout(_) | Self::CommandFailed { .. } | Self::Status { .. }
        )
    }
}

impl From<quick_xml::DeError> for EngineError {
    fn from(err: quick_xml::DeError) -> Self {
        Self::Xml(err.to_string())
    }
}
