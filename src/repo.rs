//! Repository targets and bounded-depth discovery.

use crate::constants::DEFAULT_REPO_NAME;
use crate::git::{GitCommand, GitRunner};
use std::path::{Path, PathBuf};

/// A repository to synchronize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoTarget {
    pub path: PathBuf,
    pub name: String,
}

impl RepoTarget {
    /// Names the target after the last path component.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(DEFAULT_REPO_NAME)
            .to_string();
        Self { path, name }
    }
}

/// True when git reports `path` to be inside a work tree.
pub fn is_work_tree(path: &Path) -> bool {
    GitCommand::new(path)
        .query(&["rev-parse", "--is-inside-work-tree"])
        .is_ok_and(|output| output.success() && output.stdout == "true")
}

/// Finds repositories under `root`, descending at most `max_depth` levels.
///
/// A work tree is never descended into. Hidden entries are skipped, and
/// unreadable directories are ignored.
pub fn find_repos(root: &Path, max_depth: usize) -> Vec<RepoTarget> {
    find_repos_with(root, max_depth, &is_work_tree)
}

/// `find_repos` with a caller-supplied work-tree check.
pub fn find_repos_with<F>(root: &Path, max_depth: usize, is_repo: &F) -> Vec<RepoTarget>
where
    F: Fn(&Path) -> bool,
{
    if !root.is_dir() {
        return Vec::new();
    }
    if is_repo(root) {
        return vec![RepoTarget::new(root)];
    }
    let mut found = Vec::new();
    walk(root, max_depth, is_repo, &mut found);
    found
}

fn walk<F>(dir: &Path, depth: usize, is_repo: &F, found: &mut Vec<RepoTarget>)
where
    F: Fn(&Path) -> bool,
{
    if depth == 0 {
        return;
    }
    let mut children: Vec<PathBuf> = std::fs::read_dir(dir)
        .into_iter()
        .flatten()
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    children.sort();

    for child in children {
        if is_repo(&child) {
            found.push(RepoTarget::new(child));
        } else {
            walk(&child, depth - 1, is_repo, found);
        }
    }
}
