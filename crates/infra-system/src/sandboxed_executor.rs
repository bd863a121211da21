// Sandboxed command executor
// reason: tokio process + semaphore for bounded concurrent execution of whitelisted actions
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, warn};

use smsgw_core::application::constants::MIN_TIMEOUT_SECS;
use smsgw_core::application::CommandRegistry;
use smsgw_core::domain::{CommandArgs, CommandDefinition};
use smsgw_core::port::{
    CommandExecutor, ExecutionErrorKind, ExecutionRequest, ExecutionResult, IdProvider,
    TimeProvider,
};
use smsgw_core::settings::ExecutorSettings;

/// Captured output of one child process
struct Captured {
    stdout: String,
    stderr: String,
}

impl Captured {
    fn empty() -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

/// How a supervised child ended
enum Exit {
    Completed(ExitStatus),
    TimedOut,
    WaitFailed(std::io::Error),
}

/// Executes whitelisted commands only
///
/// - argv is built from the definition plus validated `--key value` pairs; never a shell
/// - environment is cleared and rebuilt from `[executor].env` and `inherit_env`
/// - at most `max_concurrent` children run at once; extra callers wait
pub struct SandboxedExecutor {
    registry: Arc<CommandRegistry>,
    settings: ExecutorSettings,
    gate: Arc<Semaphore>,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
}

impl SandboxedExecutor {
    pub fn new(
        registry: Arc<CommandRegistry>,
        settings: ExecutorSettings,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        let gate = Arc::new(Semaphore::new(settings.max_concurrent.max(1)));
        Self {
            registry,
            settings,
            gate,
            time_provider,
            id_provider,
        }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Override (or the command default) clamped to `[1, max_timeout_secs]`
    pub fn effective_timeout(&self, def: &CommandDefinition, override_secs: Option<u64>) -> Duration {
        let max = self.settings.max_timeout_secs.max(MIN_TIMEOUT_SECS);
        let secs = override_secs
            .unwrap_or(def.default_timeout_secs)
            .clamp(MIN_TIMEOUT_SECS, max);
        Duration::from_secs(secs)
    }

    /// Fixed environment plus the allow-listed variables `lookup` finds
    ///
    /// Only allow-listed names are read. Values that are not valid Unicode are skipped.
    fn filter_env<F>(&self, lookup: F) -> BTreeMap<String, String>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let mut env = self.settings.env.clone();
        for name in &self.settings.inherit_env {
            if env.contains_key(name) {
                continue;
            }
            match lookup(name).map(OsString::into_string) {
                Some(Ok(value)) => {
                    env.insert(name.clone(), value);
                }
                Some(Err(_)) => warn!(variable = %name, "Skipping non-UTF-8 environment variable"),
                None => {}
            }
        }
        env
    }

    async fn run(
        &self,
        execution_id: &str,
        def: &CommandDefinition,
        args: &CommandArgs,
        limit: Duration,
    ) -> ExecutionResult {
        let started_at = self.time_provider.now();
        let started = Instant::now();
        let argv = def.argv(args);

        info!(
            execution_id = %execution_id,
            command = %def.name,
            executable = %def.executable.display(),
            args = ?argv,
            timeout_secs = limit.as_secs(),
            "Starting command execution"
        );

        let spawned = Command::new(&def.executable)
            .args(&argv)
            .env_clear()
            .envs(self.filter_env(|name| std::env::var_os(name)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                error!(execution_id = %execution_id, command = %def.name, error = %e, "Failed to spawn command");
                return self.finish(
                    execution_id,
                    def,
                    started_at,
                    started,
                    Captured::empty(),
                    -1,
                    Some((ExecutionErrorKind::SpawnFailure, format!("Failed to spawn: {}", e))),
                );
            }
        };

        let stdout_task = tokio::spawn(drain(child.stdout.take()));
        let stderr_task = tokio::spawn(drain(child.stderr.take()));

        let exit = tokio::select! {
            status = child.wait() => match status {
                Ok(status) => Exit::Completed(status),
                Err(e) => Exit::WaitFailed(e),
            },
            _ = sleep(limit) => Exit::TimedOut,
        };

        if matches!(exit, Exit::TimedOut) {
            warn!(
                execution_id = %execution_id,
                command = %def.name,
                timeout_secs = limit.as_secs(),
                "Command timed out; terminating"
            );
            self.terminate(&mut child, execution_id).await;
        }

        let grace = self.settings.terminate_grace();
        let captured = Captured {
            stdout: collect(stdout_task, grace).await,
            stderr: collect(stderr_task, grace).await,
        };

        match exit {
            Exit::Completed(status) => {
                // No code means death by signal
                let exit_code = status.code().unwrap_or(-1);
                let failure = (exit_code != 0).then(|| {
                    let message = match status.code() {
                        Some(code) => format!("Command exited with code {}", code),
                        None => "Command terminated by signal".to_string(),
                    };
                    (ExecutionErrorKind::ExecutionFailure, message)
                });
                self.finish(execution_id, def, started_at, started, captured, exit_code, failure)
            }
            Exit::TimedOut => self.finish(
                execution_id,
                def,
                started_at,
                started,
                captured,
                -1,
                Some((
                    ExecutionErrorKind::ExecutionTimeout,
                    format!("Command timed out after {}s", limit.as_secs()),
                )),
            ),
            Exit::WaitFailed(e) => self.finish(
                execution_id,
                def,
                started_at,
                started,
                captured,
                -1,
                Some((ExecutionErrorKind::SpawnFailure, format!("Failed to wait for command: {}", e))),
            ),
        }
    }

    /// SIGTERM first, SIGKILL after the grace period
    async fn terminate(&self, child: &mut Child, execution_id: &str) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = child.id() {
                let pid = Pid::from_raw(pid as i32);
                match kill(pid, Signal::SIGTERM) {
                    Ok(()) => debug!(execution_id = %execution_id, pid = %pid, "Sent SIGTERM"),
                    Err(e) => warn!(execution_id = %execution_id, pid = %pid, error = %e, "SIGTERM failed"),
                }
                if timeout(self.settings.terminate_grace(), child.wait()).await.is_ok() {
                    debug!(execution_id = %execution_id, "Process exited after SIGTERM");
                    return;
                }
                warn!(execution_id = %execution_id, pid = %pid, "Process ignored SIGTERM; sending SIGKILL");
            }
        }

        if let Err(e) = child.kill().await {
            warn!(execution_id = %execution_id, error = %e, "Failed to kill timed-out process");
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        execution_id: &str,
        def: &CommandDefinition,
        started_at: chrono::DateTime<chrono::Utc>,
        started: Instant,
        captured: Captured,
        exit_code: i32,
        failure: Option<(ExecutionErrorKind, String)>,
    ) -> ExecutionResult {
        let duration_ms = started.elapsed().as_millis() as i64;
        let (error, error_message) = match failure {
            Some((kind, message)) => (Some(kind), Some(message)),
            None => (None, None),
        };
        let result = ExecutionResult {
            execution_id: execution_id.to_string(),
            command: def.name.clone(),
            success: error.is_none() && exit_code == 0,
            stdout: captured.stdout,
            stderr: captured.stderr,
            exit_code,
            duration_ms,
            started_at,
            completed_at: self.time_provider.now(),
            error,
            error_message,
        };

        if result.success {
            info!(
                execution_id = %execution_id,
                command = %def.name,
                duration_ms,
                "Command execution completed"
            );
        } else {
            warn!(
                execution_id = %execution_id,
                command = %def.name,
                exit_code,
                duration_ms,
                error = ?result.error,
                "Command execution failed"
            );
        }
        result
    }
}

#[async_trait]
impl CommandExecutor for SandboxedExecutor {
    async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        let execution_id = request
            .request_id
            .clone()
            .unwrap_or_else(|| self.id_provider.generate_id());

        let def = match self.registry.validate_args(&request.command, &request.args) {
            Ok(def) => def,
            Err(err) => {
                warn!(execution_id = %execution_id, command = %request.command, error = %err, "Execution rejected");
                return ExecutionResult::rejected(
                    execution_id,
                    request.command,
                    self.time_provider.now(),
                    &err,
                );
            }
        };
        let limit = self.effective_timeout(def, request.timeout_secs);

        if self.gate.available_permits() == 0 {
            warn!(
                execution_id = %execution_id,
                command = %def.name,
                max_concurrent = self.settings.max_concurrent,
                "Concurrency limit reached; waiting for a free slot"
            );
        }
        let _permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                error!(execution_id = %execution_id, error = %e, "Concurrency gate closed");
                return self.finish(
                    &execution_id,
                    def,
                    self.time_provider.now(),
                    Instant::now(),
                    Captured::empty(),
                    -1,
                    Some((ExecutionErrorKind::SpawnFailure, e.to_string())),
                );
            }
        };

        self.run(&execution_id, def, &request.args, limit).await
    }

    fn list(&self) -> Vec<CommandDefinition> {
        self.registry.list().to_vec()
    }
}

async fn drain<R>(reader: Option<R>) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    if let Some(mut reader) = reader {
        if let Err(e) = reader.read_to_end(&mut buffer).await {
            debug!(error = %e, "Output stream closed with error");
        }
    }
    buffer
}

/// Decoded output; a stream still held open by a grandchild is abandoned after `grace`
async fn collect(mut task: JoinHandle<Vec<u8>>, grace: Duration) -> String {
    match timeout(grace, &mut task).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).trim().to_string(),
        Ok(Err(e)) => {
            debug!(error = %e, "Output reader task failed");
            String::new()
        }
        Err(_) => {
            task.abort();
            String::new()
        }
    }
}
