//! Git command wrappers.
//!
//! Every git invocation goes through a `GitRunner`, which binds one
//! repository path. `GitCommand` is the system-git implementation; tests
//! substitute scripted runners.

use crate::error::GitError;
use crate::log::SyncLogger;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::constants::CHILD_POLL_MS;

/// Exit code and trimmed output streams of one git invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

pub trait GitRunner: Send + Sync {
    /// Path of the repository this runner is bound to.
    fn repo_path(&self) -> &Path;

    /// Runs `git <args>` against the bound repository.
    ///
    /// With `fail_on_non_zero` a non-zero exit becomes
    /// `GitError::CommandFailed`; without it the caller inspects the code.
    fn run(&self, args: &[&str], fail_on_non_zero: bool) -> Result<CommandOutput, GitError>;

    fn run_checked(&self, args: &[&str]) -> Result<CommandOutput, GitError> {
        self.run(args, true)
    }

    /// Runs a command whose failure is an expected answer, not an error.
    fn query(&self, args: &[&str]) -> Result<CommandOutput, GitError> {
        self.run(args, false)
    }
}

/// Runs the system git executable as `git -C <path> ...`.
#[derive(Clone)]
pub struct GitCommand {
    path: PathBuf,
    timeout: Option<Duration>,
    logger: Option<Arc<dyn SyncLogger>>,
}

impl GitCommand {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout: None,
            logger: None,
        }
    }

    /// Kills any invocation that runs longer than `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Logs each invocation at debug level.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn SyncLogger>) -> Self {
        self.logger = Some(logger);
        self
    }
}

impl GitRunner for GitCommand {
    fn repo_path(&self) -> &Path {
        &self.path
    }

    fn run(&self, args: &[&str], fail_on_non_zero: bool) -> Result<CommandOutput, GitError> {
        let joined = args.join(" ");
        if let Some(logger) = &self.logger {
            logger.debug(&format!("git -C {} {}", self.path.display(), joined));
        }

        let mut command = Command::new("git");
        command
            .arg("-C")
            .arg(&self.path)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = match self.timeout {
            Some(timeout) => output_with_deadline(command, timeout, &joined)?,
            None => command.output().map_err(|source| GitError::Spawn {
                args: joined.clone(),
                source,
            })?,
        };

        // A signal-terminated child has no exit code.
        let code = output.status.code().unwrap_or(-1);
        let result = CommandOutput {
            code,
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        };

        if fail_on_non_zero && !result.success() {
            return Err(GitError::CommandFailed {
                args: joined,
                code,
                stderr: result.stderr,
            });
        }
        Ok(result)
    }
}

fn output_with_deadline(
    mut command: Command,
    timeout: Duration,
    args: &str,
) -> Result<Output, GitError> {
    let spawn_error = |source| GitError::Spawn {
        args: args.to_string(),
        source,
    };

    let mut child = command.spawn().map_err(spawn_error)?;
    // Drain both pipes concurrently so a chatty child cannot block on a full buffer.
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_reader = thread::spawn(move || read_pipe(stdout));
    let stderr_reader = thread::spawn(move || read_pipe(stderr));

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait().map_err(spawn_error)? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(GitError::Timeout {
                    args: args.to_string(),
                    timeout,
                });
            }
            None => thread::sleep(Duration::from_millis(CHILD_POLL_MS)),
        }
    };

    Ok(Output {
        status,
        stdout: stdout_reader.join().unwrap_or_default(),
        stderr: stderr_reader.join().unwrap_or_default(),
    })
}

fn read_pipe<R: Read>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    buf
}

/// Convenience for one-off commands: runs `git <args>` in `repo` and
/// returns trimmed stdout, failing on a non-zero exit.
pub fn run_git(repo: &Path, args: &[&str]) -> Result<String, GitError> {
    GitCommand::new(repo)
        .run_checked(args)
        .map(|output| output.stdout)
}

/// Rejects names git would misread as options or that carry characters
/// outside `[A-Za-z0-9._/-]`.
pub fn validate_branch_name(branch: &str) -> Result<(), GitError> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/');
    if branch.is_empty()
        || branch.starts_with('-')
        || branch.contains("..")
        || !branch.chars().all(allowed)
    {
        return Err(GitError::InvalidBranchName(branch.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_branch_name_accepts_common_names() {
        for name in ["main", "feature/login", "release-1.2", "user_x/fix.3"] {
            assert!(validate_branch_name(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn test_validate_branch_name_rejects_option_like_and_odd_names() {
        for name in ["", "-f", "--force", "bad;name", "a b", "x..y", "tab\tname", "nul\0"] {
            assert!(
                matches!(validate_branch_name(name), Err(GitError::InvalidBranchName(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_command_output_success_is_exit_code_zero() {
        let ok = CommandOutput::default();
        assert!(ok.success());
        let failed = CommandOutput {
            code: 1,
            ..CommandOutput::default()
        };
        assert!(!failed.success());
    }
}
