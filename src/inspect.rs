//! Read-only repository queries.

use crate::error::GitError;
use crate::git::{GitRunner, validate_branch_name};
use crate::log::SyncLogger;
use crate::result::{AheadBehind, BranchDetail};

pub struct BranchInspector<'a> {
    runner: &'a dyn GitRunner,
    remote: &'a str,
    logger: Option<&'a dyn SyncLogger>,
}

impl<'a> BranchInspector<'a> {
    pub fn new(runner: &'a dyn GitRunner, remote: &'a str) -> Self {
        Self {
            runner,
            remote,
            logger: None,
        }
    }

    /// Reports remote lookups that failed and were counted as absence.
    #[must_use]
    pub fn with_logger(mut self, logger: &'a dyn SyncLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn remote(&self) -> &str {
        self.remote
    }

    /// The checked-out branch, or an empty string when HEAD is detached
    /// or the branch has no commits yet.
    pub fn current_branch(&self) -> Result<String, GitError> {
        let output = self.runner.query(&["symbolic-ref", "--quiet", "--short", "HEAD"])?;
        if !output.success() || !self.has_commits()? {
            return Ok(String::new());
        }
        Ok(output.stdout)
    }

    pub fn has_commits(&self) -> Result<bool, GitError> {
        Ok(self.head_commit()?.is_some())
    }

    /// Full SHA of HEAD, `None` before the first commit.
    pub fn head_commit(&self) -> Result<Option<String>, GitError> {
        let output = self
            .runner
            .query(&["rev-parse", "--verify", "--quiet", "HEAD"])?;
        Ok((output.success() && !output.stdout.is_empty()).then_some(output.stdout))
    }

    pub fn is_bare(&self) -> Result<bool, GitError> {
        let output = self.runner.query(&["rev-parse", "--is-bare-repository"])?;
        Ok(output.success() && output.stdout == "true")
    }

    /// Includes untracked files.
    pub fn has_uncommitted_changes(&self) -> Result<bool, GitError> {
        let output = self.runner.run_checked(&["status", "--porcelain"])?;
        Ok(!output.stdout.is_empty())
    }

    pub fn branch_exists_locally(&self, branch: &str) -> Result<bool, GitError> {
        validate_branch_name(branch)?;
        let reference = format!("refs/heads/{branch}");
        Ok(self
            .runner
            .query(&["show-ref", "--verify", "--quiet", &reference])?
            .success())
    }

    /// Asks the remote directly. Any failure to reach it, including a
    /// timeout or a git that cannot be started, counts as absence; only an
    /// invalid branch name is an error.
    pub fn branch_exists_remotely(&self, branch: &str) -> Result<bool, GitError> {
        validate_branch_name(branch)?;
        let reference = format!("refs/heads/{branch}");
        match self
            .runner
            .query(&["ls-remote", "--heads", self.remote, &reference])
        {
            Ok(output) => Ok(output.success() && !output.stdout.is_empty()),
            Err(GitError::InvalidBranchName(name)) => Err(GitError::InvalidBranchName(name)),
            Err(e) => {
                if let Some(logger) = self.logger {
                    logger.warn(&format!(
                        "treating {}/{branch} as absent: {e}",
                        self.remote
                    ));
                }
                Ok(false)
            }
        }
    }

    /// Short name of the configured upstream, e.g. `origin/main`.
    pub fn upstream_of(&self, branch: &str) -> Result<Option<String>, GitError> {
        validate_branch_name(branch)?;
        let spec = format!("{branch}@{{upstream}}");
        let output = self
            .runner
            .query(&["rev-parse", "--abbrev-ref", "--symbolic-full-name", &spec])?;
        Ok((output.success() && !output.stdout.is_empty()).then_some(output.stdout))
    }

    /// Left/right commit counts of `branch...upstream`; `None` when git
    /// cannot compare them.
    pub fn ahead_behind(&self, branch: &str, upstream: &str) -> Result<Option<AheadBehind>, GitError> {
        let range = format!("{branch}...{upstream}");
        let output = self
            .runner
            .query(&["rev-list", "--left-right", "--count", &range])?;
        if !output.success() {
            return Ok(None);
        }
        Ok(parse_left_right(&output.stdout))
    }

    pub fn local_branches(&self) -> Result<Vec<String>, GitError> {
        let output = self
            .runner
            .run_checked(&["for-each-ref", "--format=%(refname:short)", "refs/heads"])?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Reports every local branch with its remote, upstream and divergence
    /// state. Nothing is linked or modified.
    pub fn branch_details(&self) -> Result<Vec<BranchDetail>, GitError> {
        let current = self.current_branch()?;
        let mut details = Vec::new();

        for name in self.local_branches()? {
            let mut detail = BranchDetail::new(name.as_str());
            detail.is_current = name == current;
            detail.exists_remotely = self.branch_exists_remotely(&name)?;

            if let Some(upstream) = self.upstream_of(&name)? {
                detail.ahead_behind = self.ahead_behind(&name, &upstream)?;
                detail.has_upstream = true;
                detail.upstream_name = Some(upstream);
            }
            details.push(detail);
        }
        Ok(details)
    }
}

fn parse_left_right(stdout: &str) -> Option<AheadBehind> {
    let mut counts = stdout.split_whitespace().map(str::parse::<u32>);
    match (counts.next(), counts.next(), counts.next()) {
        (Some(Ok(ahead)), Some(Ok(behind)), None) => Some(AheadBehind { ahead, behind }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_left_right_counts() {
        assert_eq!(
            parse_left_right("3\t1"),
            Some(AheadBehind { ahead: 3, behind: 1 })
        );
        assert_eq!(parse_left_right("0\t0"), Some(AheadBehind::default()));
    }

    #[test]
    fn test_parse_left_right_rejects_malformed_output() {
        assert_eq!(parse_left_right(""), None);
        assert_eq!(parse_left_right("3"), None);
        assert_eq!(parse_left_right("a\tb"), None);
        assert_eq!(parse_left_right("1\t2\t3"), None);
    }
}
