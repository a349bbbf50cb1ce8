use std::{collections::HashSet, path::Path, process::Stdio, time::Duration};

use tokio::{process::Command, time::timeout};
use tracing::{debug, info};

use crate::engine::EngineError;

/// Spawn `cmd` only if its file name is on the allowlist and collect its
/// stdout. `cmd` may be a full path; the directory is not checked.
///
/// The child is killed when `limit` elapses. A non-zero exit status is an
/// error carrying the child's stderr.
pub async fn run_command_allowlisted(
    cmd: &str,
    args: &[String],
    allowed: &[&str],
    limit: Duration,
) -> Result<String, EngineError> {
    let allowed_set: HashSet<&str> = allowed.iter().copied().collect();
    let program = Path::new(cmd).file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if !allowed_set.contains(program) {
        return Err(EngineError::CommandNotAllowed(cmd.to_string()));
    }

    info!(command = cmd, "audit: launching external tool");
    debug!(command = cmd, ?args, "external tool arguments");
    let child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| EngineError::Spawn {
            command: cmd.to_string(),
            source,
        })?;

    let out = timeout(limit, child.wait_with_output())
        .await
        .map_err(|_| EngineError::Timeout(limit))?
        .map_err(|source| EngineError::Spawn {
            command: cmd.to_string(),
            source,
        })?;

    if !out.status.success() {
        return Err(EngineError::CommandFailed {
            code: out.status.code(),
            stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&out.stdout).to_string())
}
