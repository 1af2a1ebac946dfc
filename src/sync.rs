//! Per-repository synchronization state machine.
//!
//! `SyncOrchestrator::sync_repo` fetches, optionally stashes, syncs the
//! branches selected by `SyncConfig::mode`, then puts the working copy
//! back: the entry branch (or detached commit) is checked out again and
//! the stash is popped, even when a mode failed part way through.

use crate::config::{SyncConfig, SyncMode};
use crate::constants::{
    REASON_BRANCH_MISSING, REASON_LOCAL_MISSING, REASON_NO_UPSTREAM, REASON_REMOTE_MISSING,
};
use crate::error::{GitError, SyncError};
use crate::git::GitRunner;
use crate::inspect::BranchInspector;
use crate::log::SyncLogger;
use crate::repo::RepoTarget;
use crate::result::{BranchDetail, ResultBuilder, SyncResult};
use crate::stash::StashCoordinator;
use crate::upstream::UpstreamResolver;
use std::fmt;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStep {
    Started,
    DetectingBranch,
    Fetching,
    Stashing,
    CheckingOut { branch: String },
    ResolvingUpstream { branch: String },
    Pulling { branch: String },
    RestoringBranch { branch: String },
    PoppingStash,
    Completed,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStep::Started => write!(f, "Starting sync"),
            SyncStep::DetectingBranch => write!(f, "Detecting current branch"),
            SyncStep::Fetching => write!(f, "Fetching from remote"),
            SyncStep::Stashing => write!(f, "Stashing uncommitted changes"),
            SyncStep::CheckingOut { branch } => write!(f, "Checking out {branch}"),
            SyncStep::ResolvingUpstream { branch } => write!(f, "Resolving upstream of {branch}"),
            SyncStep::Pulling { branch } => write!(f, "Pulling {branch}"),
            SyncStep::RestoringBranch { branch } => write!(f, "Restoring {branch}"),
            SyncStep::PoppingStash => write!(f, "Restoring stashed changes"),
            SyncStep::Completed => write!(f, "Completed"),
        }
    }
}

/// Progress hooks for a presenter. All methods default to doing nothing.
pub trait SyncCallbacks: Send + Sync {
    fn on_sync_start(&self, _repo_name: &str) {}
    fn on_step(&self, _step: &SyncStep) {}
    fn on_complete(&self, _result: &SyncResult) {}
}

/// No-op callbacks for when progress tracking is not needed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoOpCallbacks;

impl SyncCallbacks for NoOpCallbacks {}

/// Where HEAD pointed when a run started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginalHead {
    Branch(String),
    /// Detached at this commit.
    Detached(String),
    /// No commits yet.
    Unborn,
}

impl OriginalHead {
    pub fn branch(&self) -> &str {
        match self {
            OriginalHead::Branch(name) => name,
            _ => "",
        }
    }
}

impl fmt::Display for OriginalHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OriginalHead::Branch(name) => write!(f, "{name}"),
            OriginalHead::Detached(sha) => write!(f, "detached at {}", &sha[..sha.len().min(7)]),
            OriginalHead::Unborn => write!(f, "no commits"),
        }
    }
}

pub struct SyncOrchestrator<'a> {
    target: RepoTarget,
    runner: &'a dyn GitRunner,
    logger: &'a dyn SyncLogger,
    callbacks: &'a dyn SyncCallbacks,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(target: RepoTarget, runner: &'a dyn GitRunner, logger: &'a dyn SyncLogger) -> Self {
        Self {
            target,
            runner,
            logger,
            callbacks: &NoOpCallbacks,
        }
    }

    #[must_use]
    pub fn with_callbacks(mut self, callbacks: &'a dyn SyncCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Syncs the repository and always returns a result; errors are recorded
    /// in it rather than propagated.
    pub fn sync_repo(&self, config: &SyncConfig) -> SyncResult {
        let started = Instant::now();
        self.callbacks.on_sync_start(&self.target.name);
        self.step(SyncStep::Started);

        let mut builder = ResultBuilder::new(&self.target);
        if let Err(e) = self.run(config, &mut builder) {
            self.logger.error(&format!("{}: {}", self.target.name, e));
            builder.fail(e.to_string());
        }
        self.step(SyncStep::Completed);

        let result = builder.finish(started.elapsed());
        self.callbacks.on_complete(&result);
        result
    }

    fn run(&self, config: &SyncConfig, builder: &mut ResultBuilder) -> Result<(), SyncError> {
        let inspector =
            BranchInspector::new(self.runner, &config.remote).with_logger(self.logger);

        self.step(SyncStep::DetectingBranch);
        let entry_head = self.snapshot(&inspector)?;
        builder.current_branch(entry_head.branch());

        let is_bare = inspector.is_bare()?;
        if is_bare {
            self.logger.warn(&format!(
                "{}: bare repository, stash is skipped",
                self.target.name
            ));
        }

        self.step(SyncStep::Fetching);
        self.fetch(config)?;

        let stash = StashCoordinator::new(self.runner, self.logger, &self.target.name);
        let stashed = if !is_bare && !config.no_stash && inspector.has_uncommitted_changes()? {
            self.step(SyncStep::Stashing);
            stash.stash()
        } else {
            false
        };
        builder.stashed(stashed);

        let outcome = match config.mode() {
            SyncMode::Multi(branches) => self.sync_multiple(&inspector, branches, config, builder),
            SyncMode::Single(branch) => self.sync_single(&inspector, branch, config, builder),
            SyncMode::Current => self.sync_current(&inspector, &entry_head, config, builder),
        };

        self.restore(&inspector, &entry_head);
        if stashed {
            self.step(SyncStep::PoppingStash);
            stash.pop_stash();
        }
        outcome
    }

    fn snapshot(&self, inspector: &BranchInspector<'_>) -> Result<OriginalHead, GitError> {
        let branch = inspector.current_branch()?;
        if !branch.is_empty() {
            return Ok(OriginalHead::Branch(branch));
        }
        Ok(match inspector.head_commit()? {
            Some(sha) => OriginalHead::Detached(sha),
            None => OriginalHead::Unborn,
        })
    }

    fn fetch(&self, config: &SyncConfig) -> Result<(), SyncError> {
        let depth = config.fetch_depth.map(|d| format!("--depth={d}"));
        let mut args = vec!["fetch", "--prune", config.remote.as_str()];
        if let Some(depth) = depth.as_deref() {
            args.push(depth);
        }

        match self.runner.run_checked(&args) {
            Ok(_) => {
                self.logger
                    .info(&format!("{}: fetched {}", self.target.name, config.remote));
                Ok(())
            }
            Err(e) => Err(SyncError::Fetch(e)),
        }
    }

    fn sync_current(
        &self,
        inspector: &BranchInspector<'_>,
        entry_head: &OriginalHead,
        config: &SyncConfig,
        builder: &mut ResultBuilder,
    ) -> Result<(), SyncError> {
        let branch = entry_head.branch();
        if branch.is_empty() {
            return Err(SyncError::NoCurrentBranch);
        }

        let mut detail = BranchDetail::new(branch);
        detail.is_current = true;
        detail.exists_remotely = inspector.branch_exists_remotely(branch)?;
        self.pull_branch(inspector, detail, config, builder)
    }

    fn sync_single(
        &self,
        inspector: &BranchInspector<'_>,
        branch: &str,
        config: &SyncConfig,
        builder: &mut ResultBuilder,
    ) -> Result<(), SyncError> {
        let mut detail = BranchDetail::new(branch);
        detail.exists_locally = inspector.branch_exists_locally(branch)?;
        detail.exists_remotely = inspector.branch_exists_remotely(branch)?;

        if !detail.exists_locally && !detail.exists_remotely {
            self.logger.warn(&format!(
                "{}: '{}' exists neither locally nor on {}, skipping",
                self.target.name, branch, config.remote
            ));
            builder.skipped(detail, REASON_BRANCH_MISSING);
            return Ok(());
        }

        if let Err(e) = self.checkout(branch, detail.exists_locally, true, config) {
            self.logger.error(&format!("{}: {}", self.target.name, e));
            builder.errored(detail, &e);
            return Ok(());
        }
        detail.is_current = true;
        self.pull_branch(inspector, detail, config, builder)
    }

    fn sync_multiple(
        &self,
        inspector: &BranchInspector<'_>,
        branches: &[String],
        config: &SyncConfig,
        builder: &mut ResultBuilder,
    ) -> Result<(), SyncError> {
        let active_before = self.snapshot(inspector)?;
        // Which listed branch is checked out right now, if any.
        let mut checked_out: Option<&str> = None;

        for branch in branches {
            let mut detail = BranchDetail::new(branch.as_str());
            detail.exists_locally = inspector.branch_exists_locally(branch)?;
            detail.exists_remotely = inspector.branch_exists_remotely(branch)?;

            if !detail.exists_remotely {
                self.logger.warn(&format!(
                    "{}: {}/{} does not exist, skipping",
                    self.target.name, config.remote, branch
                ));
                builder.skipped(detail, REASON_REMOTE_MISSING);
                continue;
            }
            if !detail.exists_locally && config.skip_non_existent_local {
                self.logger.warn(&format!(
                    "{}: no local branch '{}', skipping",
                    self.target.name, branch
                ));
                builder.skipped(detail, REASON_LOCAL_MISSING);
                continue;
            }

            let allow_create = !config.skip_non_existent_local;
            if let Err(e) = self.checkout(branch, detail.exists_locally, allow_create, config) {
                self.logger.error(&format!("{}: {}", self.target.name, e));
                builder.errored(detail, &e);
                continue;
            }
            checked_out = Some(branch.as_str());
            detail.is_current = true;
            self.pull_branch(inspector, detail, config, builder)?;
        }

        if let Some(last) = checked_out {
            self.logger.debug(&format!(
                "{}: leaving '{}', returning to {}",
                self.target.name, last, active_before
            ));
            self.restore(inspector, &active_before);
        }
        Ok(())
    }

    /// Checks out `branch`, creating it from `<remote>/<branch>` with
    /// tracking when it has no local copy and creation is allowed.
    fn checkout(
        &self,
        branch: &str,
        exists_locally: bool,
        allow_create: bool,
        config: &SyncConfig,
    ) -> Result<(), SyncError> {
        self.step(SyncStep::CheckingOut {
            branch: branch.to_string(),
        });

        let start_point = format!("{}/{}", config.remote, branch);
        let result = if exists_locally {
            self.runner.run_checked(&["checkout", branch])
        } else if allow_create {
            self.runner
                .run_checked(&["checkout", "-b", branch, "--track", &start_point])
        } else {
            return Err(SyncError::Checkout {
                branch: branch.to_string(),
                reason: REASON_LOCAL_MISSING.to_string(),
            });
        };

        match result {
            Ok(_) => {
                let verb = if exists_locally { "switched to" } else { "created" };
                self.logger
                    .info(&format!("{}: {} '{}'", self.target.name, verb, branch));
                Ok(())
            }
            Err(e) => Err(SyncError::Checkout {
                branch: branch.to_string(),
                reason: failure_reason(&e),
            }),
        }
    }

    /// Resolves the upstream of the checked-out `detail` branch, pulls, and
    /// records the terminal status.
    fn pull_branch(
        &self,
        inspector: &BranchInspector<'_>,
        mut detail: BranchDetail,
        config: &SyncConfig,
        builder: &mut ResultBuilder,
    ) -> Result<(), SyncError> {
        let branch = detail.name.clone();
        let resolver =
            UpstreamResolver::new(self.runner, &config.remote, self.logger, &self.target.name);

        self.step(SyncStep::ResolvingUpstream {
            branch: branch.clone(),
        });
        let upstream = match resolver.resolve(&branch, config.auto_upstream) {
            Ok(Some(upstream)) => upstream,
            Ok(None) => {
                builder.skipped(detail, REASON_NO_UPSTREAM);
                return Ok(());
            }
            Err(e @ SyncError::RemoteBranchMissing { .. }) => {
                builder.skipped(detail, format!("{REASON_NO_UPSTREAM}: {e}"));
                return Ok(());
            }
            Err(SyncError::Git(e)) => return Err(SyncError::Git(e)),
            Err(e) => {
                self.logger.error(&format!("{}: {}", self.target.name, e));
                builder.errored(detail, &e);
                return Ok(());
            }
        };
        detail.has_upstream = true;
        detail.auto_set_success = upstream.newly_linked;
        detail.upstream_name = Some(upstream.name.clone());

        self.step(SyncStep::Pulling {
            branch: branch.clone(),
        });
        let pulled = self.runner.run_checked(&["pull"]);
        // Measured after the pull so the report reflects the final state.
        detail.ahead_behind = inspector
            .ahead_behind(&branch, &upstream.name)
            .ok()
            .flatten();

        match pulled {
            Ok(_) => {
                self.logger
                    .info(&format!("{}: pulled '{}'", self.target.name, branch));
                builder.synced(detail);
            }
            Err(source) => {
                let err = SyncError::Pull { branch, source };
                self.logger.error(&format!("{}: {}", self.target.name, err));
                builder.errored(detail, &err);
            }
        }
        Ok(())
    }

    /// Puts HEAD back where `head` says. Best-effort: failures are logged.
    fn restore(&self, inspector: &BranchInspector<'_>, head: &OriginalHead) {
        let (target, args): (&str, Vec<&str>) = match head {
            OriginalHead::Unborn => return,
            OriginalHead::Branch(name) => {
                if inspector.current_branch().is_ok_and(|current| current == *name) {
                    return;
                }
                (name.as_str(), vec!["checkout", name.as_str()])
            }
            OriginalHead::Detached(sha) => {
                if self.snapshot(inspector).is_ok_and(|now| now == *head) {
                    return;
                }
                (sha.as_str(), vec!["checkout", "--detach", sha.as_str()])
            }
        };

        self.step(SyncStep::RestoringBranch {
            branch: head.to_string(),
        });
        match self.runner.run_checked(&args) {
            Ok(_) => self
                .logger
                .info(&format!("{}: restored {}", self.target.name, head)),
            Err(e) => {
                let err = SyncError::Restore {
                    branch: target.to_string(),
                    reason: failure_reason(&e),
                };
                self.logger.warn(&format!("{}: {}", self.target.name, err));
            }
        }
    }

    fn step(&self, step: SyncStep) {
        self.callbacks.on_step(&step);
    }
}

/// git's own stderr is the most useful explanation of a failed command.
fn failure_reason(err: &GitError) -> String {
    match err {
        GitError::CommandFailed { stderr, .. } if !stderr.is_empty() => stderr.clone(),
        other => other.to_string(),
    }
}
