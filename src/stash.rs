//! Guarded stash and pop. Both are best-effort: failures are logged and
//! reported as `false`, never raised.

use crate::error::{GitError, SyncError};
use crate::git::GitRunner;
use crate::log::SyncLogger;

pub struct StashCoordinator<'a> {
    runner: &'a dyn GitRunner,
    logger: &'a dyn SyncLogger,
    repo_name: &'a str,
}

impl<'a> StashCoordinator<'a> {
    pub fn new(runner: &'a dyn GitRunner, logger: &'a dyn SyncLogger, repo_name: &'a str) -> Self {
        Self {
            runner,
            logger,
            repo_name,
        }
    }

    /// Stashes tracked changes.
    ///
    /// Returns false without touching the stash when the repository has no
    /// commits, or when git saved nothing (untracked files only).
    pub fn stash(&self) -> bool {
        match self.has_commits() {
            Ok(true) => {}
            Ok(false) => {
                self.logger.warn(&format!(
                    "{}: no commits yet, skipping stash",
                    self.repo_name
                ));
                return false;
            }
            Err(e) => {
                self.logger.error(&format!("{}: {}", self.repo_name, SyncError::Stash(e)));
                return false;
            }
        }

        match self.push() {
            Ok(true) => {
                self.logger
                    .info(&format!("{}: stashed local changes", self.repo_name));
                true
            }
            Ok(false) => {
                self.logger
                    .warn(&format!("{}: nothing was stashed", self.repo_name));
                false
            }
            Err(e) => {
                self.logger.error(&format!("{}: {}", self.repo_name, SyncError::Stash(e)));
                false
            }
        }
    }

    /// Pops the newest stash entry. Returns false without popping when the
    /// stash list is empty.
    pub fn pop_stash(&self) -> bool {
        match self.runner.query(&["stash", "list"]) {
            Ok(output) if output.success() && !output.stdout.is_empty() => {}
            Ok(_) => {
                self.logger
                    .warn(&format!("{}: stash is empty, nothing to restore", self.repo_name));
                return false;
            }
            Err(e) => {
                self.logger.error(&format!("{}: {}", self.repo_name, SyncError::Pop(e)));
                return false;
            }
        }

        match self.runner.run_checked(&["stash", "pop"]) {
            Ok(_) => {
                self.logger
                    .info(&format!("{}: restored stashed changes", self.repo_name));
                true
            }
            Err(e) => {
                self.logger.error(&format!("{}: {}", self.repo_name, SyncError::Pop(e)));
                false
            }
        }
    }

    fn has_commits(&self) -> Result<bool, GitError> {
        Ok(self
            .runner
            .query(&["rev-parse", "--verify", "--quiet", "HEAD"])?
            .success())
    }

    fn push(&self) -> Result<bool, GitError> {
        let output = self.runner.run_checked(&["stash", "push"])?;
        Ok(!output.stdout.contains("No local changes to save"))
    }
}
