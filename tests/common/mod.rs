//! Test infrastructure for git-sync-rust integration tests.
#![allow(dead_code)]

use anyhow::Result;
use git_sync_rust::config::SyncConfig;
use git_sync_rust::error::GitError;
use git_sync_rust::git::{CommandOutput, GitRunner, run_git};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

/// Sync options with full-history fetches, so scratch repos never turn shallow.
pub fn test_config() -> SyncConfig {
    SyncConfig::default()
}

fn configure_identity(path: &Path) -> Result<()> {
    run_git(path, &["config", "user.email", "test@example.com"])?;
    run_git(path, &["config", "user.name", "Test User"])?;
    run_git(path, &["config", "commit.gpgsign", "false"])?;
    run_git(path, &["config", "pull.rebase", "false"])?;
    Ok(())
}

/// A temporary git repository for testing, optionally with a bare remote.
/// Automatically cleaned up when dropped.
pub struct TestRepo {
    _temp_dir: TempDir,
    path: PathBuf,
    remote: Option<TempDir>,
}

impl TestRepo {
    /// Creates a new test repository with an initial commit on the master branch.
    pub fn new() -> Result<Self> {
        Self::with_initial_branch("master")
    }

    pub fn with_initial_branch(branch: &str) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("work");
        std::fs::create_dir_all(&path)?;

        run_git(&path, &["init", "-b", branch])?;
        configure_identity(&path)?;

        std::fs::write(path.join("README.md"), "# Test Repo\n")?;
        run_git(&path, &["add", "README.md"])?;
        run_git(&path, &["commit", "-m", "Initial commit"])?;

        Ok(Self {
            _temp_dir: temp_dir,
            path,
            remote: None,
        })
    }

    /// A repository with `git init` but no commits.
    pub fn empty() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("empty");
        std::fs::create_dir_all(&path)?;
        run_git(&path, &["init", "-b", "master"])?;
        configure_identity(&path)?;
        Ok(Self {
            _temp_dir: temp_dir,
            path,
            remote: None,
        })
    }

    /// Creates a test repository whose `origin` is a bare repo holding the
    /// initial branch, with upstream tracking set.
    pub fn with_remote(branch: Option<&str>) -> Result<Self> {
        let branch = branch.unwrap_or("master");
        let mut repo = Self::with_initial_branch(branch)?;
        let remote_dir = TempDir::new()?;
        run_git(remote_dir.path(), &["init", "--bare"])?;

        let remote_path = path_str(remote_dir.path())?;
        run_git(&repo.path, &["remote", "add", "origin", &remote_path])?;
        run_git(&repo.path, &["push", "-u", "origin", branch])?;

        repo.remote = Some(remote_dir);
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn remote_path(&self) -> Option<&Path> {
        self.remote.as_ref().map(|dir| dir.path())
    }

    /// Deletes the bare remote so every fetch fails.
    pub fn remove_remote(&mut self) {
        self.remote = None;
    }

    pub fn git(&self, args: &[&str]) -> Result<String> {
        Ok(run_git(&self.path, args)?)
    }

    pub fn create_branch(&self, name: &str) -> Result<()> {
        self.git(&["branch", name])?;
        Ok(())
    }

    pub fn current_branch(&self) -> Result<String> {
        self.git(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    pub fn head(&self) -> Result<String> {
        self.git(&["rev-parse", "HEAD"])
    }

    pub fn commit_file(&self, file: &str, content: &str, message: &str) -> Result<()> {
        std::fs::write(self.path.join(file), content)?;
        self.git(&["add", file])?;
        self.git(&["commit", "-m", message])?;
        Ok(())
    }

    /// Modifies a tracked file.
    pub fn make_dirty(&self) -> Result<()> {
        std::fs::write(self.path.join("README.md"), "# Modified\n")?;
        Ok(())
    }

    pub fn make_untracked(&self) -> Result<()> {
        std::fs::write(self.path.join("untracked.txt"), "untracked\n")?;
        Ok(())
    }

    pub fn read_file(&self, file: &str) -> Result<String> {
        Ok(std::fs::read_to_string(self.path.join(file))?)
    }

    pub fn file_exists(&self, file: &str) -> bool {
        self.path.join(file).exists()
    }

    pub fn has_stash(&self) -> Result<bool> {
        Ok(!self.git(&["stash", "list"])?.is_empty())
    }

    /// Pushes a local branch to origin without setting upstream tracking.
    pub fn push_without_tracking(&self, branch: &str) -> Result<()> {
        self.git(&["push", "origin", branch])?;
        Ok(())
    }

    /// Creates `branch` on the remote only: pushed from here, then deleted locally.
    pub fn create_remote_only_branch(&self, branch: &str) -> Result<()> {
        self.create_branch(branch)?;
        self.push_without_tracking(branch)?;
        self.git(&["branch", "-D", branch])?;
        Ok(())
    }

    /// Adds a commit to `branch` on the remote through a separate clone.
    pub fn commit_on_remote(&self, branch: &str, file: &str, content: &str) -> Result<String> {
        let remote = self
            .remote_path()
            .ok_or_else(|| anyhow::anyhow!("test repo has no remote"))?;
        let peer_dir = TempDir::new()?;
        let peer = peer_dir.path().join("peer");
        let remote_str = path_str(remote)?;
        let peer_str = path_str(&peer)?;

        run_git(peer_dir.path(), &["clone", "--branch", branch, &remote_str, &peer_str])?;
        configure_identity(&peer)?;
        std::fs::write(peer.join(file), content)?;
        run_git(&peer, &["add", file])?;
        run_git(&peer, &["commit", "-m", "Remote commit"])?;
        run_git(&peer, &["push", "origin", branch])?;
        Ok(run_git(&peer, &["rev-parse", "HEAD"])?)
    }
}

fn path_str(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("non UTF-8 temp path: {}", path.display()))
}

/// Scripted `GitRunner`.
///
/// Each rule maps an argument prefix to a canned response; the longest
/// matching prefix wins and unmatched commands succeed with empty output.
/// Every invocation is recorded.
pub struct FakeRunner {
    path: PathBuf,
    rules: Vec<(String, CommandOutput)>,
    timeouts: Vec<String>,
    /// Branch reported by `symbolic-ref`, moved by successful checkouts.
    head: Option<Mutex<String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            path: PathBuf::from("/fake/repo"),
            rules: Vec::new(),
            timeouts: Vec::new(),
            head: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Makes `symbolic-ref` follow successful `checkout` commands, starting
    /// on `branch`.
    pub fn tracking_head(mut self, branch: &str) -> Self {
        self.head = Some(Mutex::new(branch.to_string()));
        self
    }

    /// Commands starting with `prefix` fail with `GitError::Timeout`.
    pub fn time_out(mut self, prefix: &str) -> Self {
        self.timeouts.push(prefix.to_string());
        self
    }

    pub fn head(&self) -> Option<String> {
        self.head
            .as_ref()
            .and_then(|head| head.lock().ok().map(|h| h.clone()))
    }

    /// A clean, non-bare repository on `branch` with history.
    pub fn on_branch(branch: &str) -> Self {
        Self::new()
            .ok("symbolic-ref --quiet --short HEAD", branch)
            .ok("rev-parse --verify --quiet HEAD", "1111111111111111111111111111111111111111")
            .ok("rev-parse --is-bare-repository", "false")
            .ok("status --porcelain", "")
    }

    pub fn ok(self, prefix: &str, stdout: &str) -> Self {
        self.respond(prefix, 0, stdout, "")
    }

    pub fn fail(self, prefix: &str, stderr: &str) -> Self {
        self.respond(prefix, 1, "", stderr)
    }

    pub fn respond(mut self, prefix: &str, code: i32, stdout: &str, stderr: &str) -> Self {
        self.rules.retain(|(p, _)| p != prefix);
        self.rules.push((
            prefix.to_string(),
            CommandOutput {
                code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
        ));
        self
    }

    /// Scripts a branch that exists both locally and on origin, tracking origin.
    pub fn with_tracked_branch(self, branch: &str) -> Self {
        self.ok(&format!("show-ref --verify --quiet refs/heads/{branch}"), "")
            .ok(
                &format!("ls-remote --heads origin refs/heads/{branch}"),
                &format!("2222222222222222222222222222222222222222\trefs/heads/{branch}"),
            )
            .ok(
                &format!("rev-parse --abbrev-ref --symbolic-full-name {branch}@{{upstream}}"),
                &format!("origin/{branch}"),
            )
            .ok(&format!("rev-list --left-right --count {branch}..."), "0\t0")
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.count(prefix) > 0
    }
}

impl GitRunner for FakeRunner {
    fn repo_path(&self) -> &Path {
        &self.path
    }

    fn run(&self, args: &[&str], fail_on_non_zero: bool) -> Result<CommandOutput, GitError> {
        let joined = args.join(" ");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(joined.clone());
        }

        if self.timeouts.iter().any(|prefix| joined.starts_with(prefix.as_str())) {
            return Err(GitError::Timeout {
                args: joined,
                timeout: Duration::from_secs(5),
            });
        }

        let mut output = self
            .rules
            .iter()
            .filter(|(prefix, _)| joined.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, output)| output.clone())
            .unwrap_or_default();

        if let Some(head) = &self.head {
            if let Ok(mut head) = head.lock() {
                if joined == "symbolic-ref --quiet --short HEAD" {
                    output.stdout = head.clone();
                } else if output.success() && args.first() == Some(&"checkout") {
                    // `checkout <b>` or `checkout -b <b> --track <start>`
                    let target = match args.get(1) {
                        Some(&"-b") => args.get(2),
                        other => other,
                    };
                    if let Some(target) = target.filter(|t| !t.starts_with('-')) {
                        *head = target.to_string();
                    }
                }
            }
        }

        if fail_on_non_zero && !output.success() {
            return Err(GitError::CommandFailed {
                args: joined,
                code: output.code,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }
}
