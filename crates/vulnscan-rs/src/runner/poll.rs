use std::{fmt::Display, future::Future, time::Duration};

use tokio::time::sleep;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    /// Pause after every unfinished or failed check.
    pub interval: Duration,
    /// Transient failures tolerated before giving up.
    pub max_failures: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum PollError<E> {
    #[error("gave up after {failures} failed status queries")]
    Exhausted { failures: u32 },
    #[error(transparent)]
    Fatal(E),
}

/// Runs `check` until it reports completion.
///
/// Errors accepted by `is_transient` are counted and retried after the same
/// interval; any other error ends polling at once. Returns the number of
/// failures absorbed on the way.
pub async fn poll_until<F, Fut, E>(
    policy: PollPolicy,
    mut check: F,
    is_transient: impl Fn(&E) -> bool,
) -> Result<u32, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: Display,
{
    let mut failures = 0u32;
    loop {
        match check().await {
            Ok(true) => return Ok(failures),
            Ok(false) => {}
            Err(e) if is_transient(&e) => {
                failures += 1;
                info!(error = %e, failures, "status query failed");
                if failures % 3 == 0 {
                    warn!(failures, "engine is still failing");
                }
                if failures > policy.max_failures {
                    error!(failures, "status queries keep failing, giving up");
                    return Err(PollError::Exhausted { failures });
                }
            }
            Err(e) => return Err(PollError::Fatal(e)),
        }
        sleep(policy.interval).await;
    }
}
