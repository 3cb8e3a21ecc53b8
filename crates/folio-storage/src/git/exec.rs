//! Subprocess git invocation.
//!
//! Arguments go to the process as an argv vector; nothing is ever passed
//! through a shell, so paths and commit messages cannot inject commands.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, warn};

use super::GitError;

/// Captured output of a successful git invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    /// stdout with surrounding whitespace removed.
    pub fn trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// stdout and stderr together, for commands that report on either stream.
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Run `git <args>` in `cwd`, killing it after `timeout`.
///
/// A non-zero exit becomes [`GitError::CommandFailed`] carrying stderr, or
/// `exit code N` when stderr is empty. Expiry becomes [`GitError::Timeout`];
/// the child is killed when the pending future is dropped.
pub async fn exec_git<I, S>(cwd: &Path, args: I, timeout: Duration) -> Result<GitOutput, GitError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<S> = args.into_iter().collect();
    let command_line = args
        .iter()
        .map(|a| a.as_ref().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");

    let mut cmd = Command::new("git");
    cmd.args(&args)
        .current_dir(cwd)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(cwd = %cwd.display(), args = %command_line, "running git");
    let started = Instant::now();

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(result) => result.map_err(GitError::Spawn)?,
        Err(_) => {
            warn!(args = %command_line, timeout_ms = timeout.as_millis() as u64, "git timed out");
            return Err(GitError::Timeout {
                args: command_line,
                timeout_ms: timeout.as_millis() as u64,
            });
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    debug!(
        args = %command_line,
        elapsed_ms = started.elapsed().as_millis() as u64,
        code = ?output.status.code(),
        "git finished"
    );

    if !output.status.success() {
        let code = output.status.code();
        let detail = if stderr.trim().is_empty() {
            match code {
                Some(c) => format!("exit code {c}"),
                None => "terminated by signal".to_string(),
            }
        } else {
            stderr.trim().to_string()
        };
        return Err(GitError::CommandFailed {
            args: command_line,
            code,
            stderr: detail,
        });
    }

    Ok(GitOutput { stdout, stderr })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_version_succeeds() {
        let dir = TempDir::new().unwrap();
        let out = exec_git(dir.path(), ["--version"], Duration::from_secs(10))
            .await
            .unwrap();
        assert!(out.trimmed().starts_with("git version"));
    }

    #[tokio::test]
    async fn test_failure_carries_stderr() {
        let dir = TempDir::new().unwrap();
        // Not a repository, so status fails.
        let err = exec_git(dir.path(), ["status"], Duration::from_secs(10))
            .await
            .unwrap_err();
        match err {
            GitError::CommandFailed { args, code, stderr } => {
                assert_eq!(args, "status");
                assert_ne!(code, Some(0));
                assert!(!stderr.is_empty());
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_arguments_are_not_shell_interpreted() {
        let dir = TempDir::new().unwrap();
        exec_git(dir.path(), ["init", "-q"], Duration::from_secs(10))
            .await
            .unwrap();
        let marker = dir.path().join("pwned");
        let hostile = format!("x; touch {}", marker.display());
        // The whole string is one pathspec argument.
        let _ = exec_git(
            dir.path(),
            ["add", "--", hostile.as_str()],
            Duration::from_secs(10),
        )
        .await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_failure_reports_full_command_line() {
        let dir = TempDir::new().unwrap();
        let err = exec_git(
            dir.path(),
            ["rev-parse", "--verify", "no-such-ref"],
            Duration::from_secs(10),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().starts_with("git rev-parse --verify no-such-ref failed"));
    }
}
