//! Error types for git invocations and repository synchronization.

use std::time::Duration;
use thiserror::Error;

/// Failures raised by the command layer.
#[derive(Debug, Error)]
pub enum GitError {
    /// The git executable could not be started at all.
    #[error("Failed to spawn git command `git {args}`: {source}")]
    Spawn {
        args: String,
        #[source]
        source: std::io::Error,
    },

    /// git ran and exited with a non-zero status.
    #[error("git {args} failed (exit code {code}): {stderr}")]
    CommandFailed {
        args: String,
        code: i32,
        stderr: String,
    },

    /// The per-call deadline elapsed and the process was killed.
    #[error("git {args} timed out after {}s", .timeout.as_secs())]
    Timeout { args: String, timeout: Duration },

    #[error("Invalid branch name: {0:?}")]
    InvalidBranchName(String),
}

impl GitError {
    /// Exit code of a failed command, if git got far enough to report one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            GitError::CommandFailed { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Failure taxonomy of a sync run.
///
/// Only `Fetch` aborts a repository. Checkout, upstream and pull failures
/// mark a single branch as errored; restore, stash and pop failures are
/// logged and never change the outcome.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("fetch failed: {0}")]
    Fetch(#[source] GitError),

    #[error("checkout of '{branch}' failed: {reason}")]
    Checkout { branch: String, reason: String },

    #[error("pull of '{branch}' failed: {source}")]
    Pull {
        branch: String,
        #[source]
        source: GitError,
    },

    #[error("remote branch {remote}/{branch} does not exist")]
    RemoteBranchMissing { remote: String, branch: String },

    #[error("linking '{branch}' to its upstream failed: {source}")]
    Upstream {
        branch: String,
        #[source]
        source: GitError,
    },

    #[error("could not restore branch '{branch}': {reason}")]
    Restore { branch: String, reason: String },

    #[error("stash failed: {0}")]
    Stash(#[source] GitError),

    #[error("stash pop failed: {0}")]
    Pop(#[source] GitError),

    #[error("could not determine the current branch")]
    NoCurrentBranch,

    /// Anything the state machine did not expect; surfaces as the
    /// top-level error of a failed result.
    #[error(transparent)]
    Git(#[from] GitError),
}

/// Failures converting a `SyncResult` to or from its key/value record.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("result record is not a key/value object")]
    NotAnObject,

    #[error("result record has no schema_version")]
    MissingVersion,

    #[error("unsupported result schema version {0}")]
    UnsupportedVersion(u64),

    #[error("invalid result record: {0}")]
    Invalid(#[from] serde_json::Error),
}
