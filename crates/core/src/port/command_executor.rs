// Command Executor Port
// Abstraction for running whitelisted notification actions

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CommandArgs, CommandDefinition};
use crate::error::ValidationError;

/// A (command name, argument map, optional timeout) triple
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub command: String,
    #[serde(default)]
    pub args: CommandArgs,
    /// Timeout override in seconds (clamped by the executor)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Caller correlation id; generated when absent
    #[serde(default)]
    pub request_id: Option<String>,
}

impl ExecutionRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn with_args(mut self, args: CommandArgs) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }
}

/// Machine-readable failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionErrorKind {
    InvalidCommand,
    InvalidArguments,
    ExecutionTimeout,
    ExecutionFailure,
    SpawnFailure,
}

impl std::fmt::Display for ExecutionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionErrorKind::InvalidCommand => "INVALID_COMMAND",
            ExecutionErrorKind::InvalidArguments => "INVALID_ARGUMENTS",
            ExecutionErrorKind::ExecutionTimeout => "EXECUTION_TIMEOUT",
            ExecutionErrorKind::ExecutionFailure => "EXECUTION_FAILURE",
            ExecutionErrorKind::SpawnFailure => "SPAWN_FAILURE",
        };
        f.write_str(s)
    }
}

impl From<&ValidationError> for ExecutionErrorKind {
    fn from(err: &ValidationError) -> Self {
        match err {
            ValidationError::UnknownCommand(_) => ExecutionErrorKind::InvalidCommand,
            ValidationError::InvalidArguments { .. } => ExecutionErrorKind::InvalidArguments,
        }
    }
}

/// Result of one command execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub execution_id: String,
    pub command: String,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    /// -1 when the process never ran, was killed, or died by signal
    pub exit_code: i32,
    pub duration_ms: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub error: Option<ExecutionErrorKind>,
    pub error_message: Option<String>,
}

impl ExecutionResult {
    /// Result for a request rejected before any process existed
    pub fn rejected(
        execution_id: impl Into<String>,
        command: impl Into<String>,
        at: DateTime<Utc>,
        err: &ValidationError,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            command: command.into(),
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: -1,
            duration_ms: 0,
            started_at: at,
            completed_at: at,
            error: Some(err.into()),
            error_message: Some(err.to_string()),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.error == Some(ExecutionErrorKind::ExecutionTimeout)
    }
}

/// Command Executor trait
///
/// Implementations:
/// - SandboxedExecutor: spawns whitelisted executables (infra-system)
///
/// `execute` never fails: every outcome, including validation errors and
/// spawn faults, is reported through `ExecutionResult`.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, request: ExecutionRequest) -> ExecutionResult;

    /// Whitelisted commands in configuration order
    fn list(&self) -> Vec<CommandDefinition>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Executor recording requests and answering with a fixed exit code
    #[derive(Clone)]
    pub struct RecordingExecutor {
        exit_code: i32,
        requests: Arc<Mutex<Vec<ExecutionRequest>>>,
    }

    impl RecordingExecutor {
        pub fn new_success() -> Self {
            Self::with_exit_code(0)
        }

        pub fn with_exit_code(exit_code: i32) -> Self {
            Self {
                exit_code,
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn commands(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.command.clone())
                .collect()
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CommandExecutor for RecordingExecutor {
        async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
            let now = Utc::now();
            let command = request.command.clone();
            self.requests.lock().unwrap().push(request);

            let success = self.exit_code == 0;
            ExecutionResult {
                execution_id: "mock".to_string(),
                command,
                success,
                stdout: "mock output".to_string(),
                stderr: String::new(),
                exit_code: self.exit_code,
                duration_ms: 0,
                started_at: now,
                completed_at: now,
                error: (!success).then_some(ExecutionErrorKind::ExecutionFailure),
                error_message: (!success)
                    .then(|| format!("Command failed with exit code {}", self.exit_code)),
            }
        }

        fn list(&self) -> Vec<CommandDefinition> {
            Vec::new()
        }
    }
}
