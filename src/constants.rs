//! Application-wide constants.
//!
//! Centralized configuration values to avoid magic numbers throughout the codebase.

use std::time::Duration;

/// Returns the optional per-call git deadline.
///
/// Off unless the GIT_SYNC_TIMEOUT environment variable holds a positive
/// number of seconds.
///
/// Example: `GIT_SYNC_TIMEOUT=60 git-sync -r ~/src`
pub fn git_timeout() -> Option<Duration> {
    std::env::var("GIT_SYNC_TIMEOUT")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

/// Upper bound for `--jobs`.
/// Higher than CPU count because git operations are I/O-bound (network, disk).
pub const MAX_JOBS: usize = 60;

/// Interval at which a timed-out-capable child process is polled.
pub const CHILD_POLL_MS: u64 = 10;

/// Progress bar tick interval in milliseconds.
/// Controls how often the spinner/bar animates.
pub const PROGRESS_TICK_MS: u64 = 80;

/// Maximum number of completed repositories to show in the workspace progress display.
pub const MAX_VISIBLE_COMPLETIONS: usize = 5;

/// Remote used when none is configured.
pub const DEFAULT_REMOTE: &str = "origin";

/// Default recursion limit for repository discovery.
pub const DEFAULT_MAX_DEPTH: usize = 3;

/// Default name used when a repository name cannot be determined from its path.
pub const DEFAULT_REPO_NAME: &str = "repository";

/// Skip reasons recorded on `BranchDetail::error`.
pub const REASON_NO_UPSTREAM: &str = "no upstream";
pub const REASON_BRANCH_MISSING: &str = "branch does not exist";
pub const REASON_REMOTE_MISSING: &str = "remote branch missing";
pub const REASON_LOCAL_MISSING: &str = "local branch missing";
