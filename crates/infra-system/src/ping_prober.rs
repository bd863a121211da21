// Reachability prober backed by the system ping utility
// reason: tokio process so a stuck probe can be bounded and killed
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use smsgw_core::domain::Reachability;
use smsgw_core::port::ReachabilityProber;

/// Extra allowance on top of the batch bound (ADR: No magic values)
const PROBE_GRACE: Duration = Duration::from_secs(2);

/// Per-reply slack added to each attempt when bounding the whole batch
const PER_ATTEMPT_SLACK: Duration = Duration::from_secs(1);

/// Echo prober: `ping -c <attempts> -W <timeout> <target>`
///
/// Reachable iff ping exits 0 (at least one reply). Spawn errors, missing
/// binary and overruns all map to Unreachable.
pub struct PingProber {
    program: String,
}

impl PingProber {
    pub fn new() -> Self {
        Self::with_program("ping")
    }

    /// Use another ping-compatible program
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(target: &str, attempts: u32, per_attempt_timeout: Duration) -> Vec<String> {
        vec![
            "-c".to_string(),
            attempts.max(1).to_string(),
            "-W".to_string(),
            per_attempt_timeout.as_secs().max(1).to_string(),
            target.to_string(),
        ]
    }

    /// Upper bound for a whole batch
    fn batch_limit(attempts: u32, per_attempt_timeout: Duration) -> Duration {
        (per_attempt_timeout + PER_ATTEMPT_SLACK) * attempts.max(1) + PROBE_GRACE
    }
}

impl Default for PingProber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReachabilityProber for PingProber {
    async fn probe(
        &self,
        target: &str,
        attempts: u32,
        per_attempt_timeout: Duration,
    ) -> Reachability {
        let limit = Self::batch_limit(attempts, per_attempt_timeout);
        let child = Command::new(&self.program)
            .args(Self::args(target, attempts, per_attempt_timeout))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        match timeout(limit, child).await {
            Ok(Ok(status)) => {
                debug!(target = %target, attempts, exit_code = ?status.code(), "Probe finished");
                Reachability::from(status.success())
            }
            Ok(Err(e)) => {
                warn!(target = %target, program = %self.program, error = %e, "Probe could not run");
                Reachability::Unreachable
            }
            Err(_) => {
                // Dropping the future kills the child
                warn!(target = %target, limit_ms = limit.as_millis() as u64, "Probe overran its bound");
                Reachability::Unreachable
            }
        }
    }
}
