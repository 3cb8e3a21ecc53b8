//! Git plumbing via subprocess.
//!
//! [`exec_git`] is a free function: each call spawns an independent process,
//! there is no shared state to hold. [`parse`] turns porcelain and log output
//! into the shared status/history types.

mod exec;
pub mod parse;

pub use exec::{GitOutput, exec_git};
pub use parse::{LOG_FORMAT, parse_conflicts, parse_log, parse_status};

/// Errors from git invocations.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    /// git could not be started (not installed, bad cwd).
    #[error("failed to spawn git: {0}")]
    Spawn(#[source] std::io::Error),

    /// The process outlived its wall-clock limit and was killed.
    #[error("git {args} timed out after {timeout_ms}ms")]
    Timeout { args: String, timeout_ms: u64 },

    /// Non-zero exit.
    #[error("git {args} failed: {stderr}")]
    CommandFailed {
        args: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Output did not match the requested format.
    #[error("unexpected git output: {0}")]
    UnexpectedOutput(String),
}

impl GitError {
    /// Timeouts are transient; callers decide whether to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GitError::Timeout { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GitError::Spawn(_) => "git_spawn",
            GitError::Timeout { .. } => "git_timeout",
            GitError::CommandFailed { .. } => "git_command_failed",
            GitError::UnexpectedOutput(_) => "git_output",
        }
    }
}
