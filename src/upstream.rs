//! Detects an existing tracking link or creates one.

use crate::error::SyncError;
use crate::git::GitRunner;
use crate::inspect::BranchInspector;
use crate::log::SyncLogger;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    /// Short ref name, e.g. `origin/main`.
    pub name: String,
    /// Linked by this call rather than found already configured.
    pub newly_linked: bool,
}

pub struct UpstreamResolver<'a> {
    runner: &'a dyn GitRunner,
    inspector: BranchInspector<'a>,
    logger: &'a dyn SyncLogger,
    repo_name: &'a str,
}

impl<'a> UpstreamResolver<'a> {
    pub fn new(
        runner: &'a dyn GitRunner,
        remote: &'a str,
        logger: &'a dyn SyncLogger,
        repo_name: &'a str,
    ) -> Self {
        Self {
            runner,
            inspector: BranchInspector::new(runner, remote).with_logger(logger),
            logger,
            repo_name,
        }
    }

    /// Returns the branch's upstream, linking `<remote>/<branch>` first when
    /// `auto_link` is set and no link exists.
    ///
    /// An existing link is returned as-is and never replaced. `Ok(None)`
    /// means "not linked" and is not an error.
    pub fn resolve(&self, branch: &str, auto_link: bool) -> Result<Option<Upstream>, SyncError> {
        if let Some(name) = self.inspector.upstream_of(branch)? {
            self.logger.info(&format!(
                "{}: '{}' tracks {}",
                self.repo_name, branch, name
            ));
            return Ok(Some(Upstream {
                name,
                newly_linked: false,
            }));
        }

        if !auto_link {
            self.logger.warn(&format!(
                "{}: '{}' has no upstream and auto-linking is off",
                self.repo_name, branch
            ));
            return Ok(None);
        }

        let remote = self.inspector.remote();
        if !self.inspector.branch_exists_remotely(branch)? {
            let err = SyncError::RemoteBranchMissing {
                remote: remote.to_string(),
                branch: branch.to_string(),
            };
            self.logger
                .warn(&format!("{}: {}, cannot link upstream", self.repo_name, err));
            return Err(err);
        }

        let name = format!("{remote}/{branch}");
        let set_upstream = format!("--set-upstream-to={name}");
        self.runner
            .run_checked(&["branch", &set_upstream, branch])
            .map_err(|source| SyncError::Upstream {
                branch: branch.to_string(),
                source,
            })?;

        self.logger.info(&format!(
            "{}: linked '{}' to {}",
            self.repo_name, branch, name
        ));
        Ok(Some(Upstream {
            name,
            newly_linked: true,
        }))
    }
}
