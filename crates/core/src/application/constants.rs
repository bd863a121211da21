// Gateway constants (ADR: No magic values)

/// External address probed every tick
pub const DEFAULT_PRIMARY_TARGET: &str = "8.8.8.8";

/// Local router address used to classify an outage
pub const DEFAULT_SECONDARY_TARGET: &str = "172.168.133.1";

/// Pause between monitor ticks (30s)
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 30;

/// Echo requests per primary probe
pub const DEFAULT_PROBE_ATTEMPTS: u32 = 4;

/// Per-echo reply wait (2s)
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 2;

/// Consecutive primary failures before an outage is declared
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 4;

/// Reminder cadence during an outage (5 minutes)
pub const DEFAULT_REMINDER_INTERVAL_SECS: u64 = 300;

/// The diagnostic probe of the secondary target is single-shot
pub const SECONDARY_PROBE_ATTEMPTS: u32 = 1;

/// Concurrency gate capacity of the executor
pub const DEFAULT_MAX_CONCURRENT_EXECUTIONS: usize = 3;

/// Hard upper bound for any execution timeout (2 minutes)
pub const DEFAULT_MAX_TIMEOUT_SECS: u64 = 120;

/// Largest accepted `max_timeout_secs` (1 day)
pub const MAX_TIMEOUT_CEILING_SECS: u64 = 86_400;

/// Timeout of commands that declare none (30s)
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

/// Lower clamp for any execution timeout (1s)
pub const MIN_TIMEOUT_SECS: u64 = 1;

/// SIGTERM to SIGKILL grace period for timed-out children (500ms)
pub const DEFAULT_TERMINATE_GRACE_MS: u64 = 500;
