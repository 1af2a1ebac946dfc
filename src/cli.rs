//! Command-line interface definition.

use crate::config::{Config, SyncConfig, Verbosity};
use crate::constants::{DEFAULT_MAX_DEPTH, DEFAULT_REMOTE, MAX_JOBS};
use crate::git::validate_branch_name;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "git-sync",
    version,
    about = "Fetch and pull local git repositories, restoring each working copy afterwards"
)]
pub struct Cli {
    /// Repository, or with --recursive a directory containing repositories
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Sync this branch, creating it from the remote if it only exists there
    #[arg(short = 'b', long, value_parser = parse_branch)]
    pub branch: Option<String>,

    /// Sync these branches in order (takes precedence over --branch)
    #[arg(long, num_args = 1.., value_parser = parse_branch)]
    pub branches: Vec<String>,

    /// Link branches without an upstream to <remote>/<branch>
    #[arg(long)]
    pub auto_upstream: bool,

    /// With --branches, create local branches that only exist on the remote
    #[arg(long)]
    pub create_missing: bool,

    /// Limit fetched history to this many commits. Unlike shallow-by-default
    /// pull scripts, the full history is fetched unless this is given; use
    /// --depth 1 for a quick shallow sync of large repositories
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub depth: Option<u32>,

    /// Never stash uncommitted changes (checkout may then fail)
    #[arg(long)]
    pub no_stash: bool,

    /// Remote to fetch from and track
    #[arg(long, default_value = DEFAULT_REMOTE)]
    pub remote: String,

    /// Search PATH for repositories
    #[arg(short, long)]
    pub recursive: bool,

    /// Maximum directory depth for --recursive
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,

    /// Number of repositories synced in parallel
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,

    /// Report local branches and their upstreams without fetching or pulling
    #[arg(long)]
    pub status: bool,

    /// Choose which discovered repositories to sync
    #[arg(short, long)]
    pub interactive: bool,

    /// Print results as JSON records
    #[arg(long)]
    pub json: bool,

    /// Show every step and git command
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print the final count and errors
    #[arg(short, long)]
    pub quiet: bool,
}

fn parse_branch(value: &str) -> Result<String, String> {
    validate_branch_name(value)
        .map(|_| value.to_string())
        .map_err(|e| e.to_string())
}

impl Cli {
    pub fn config(&self) -> Config {
        let verbosity = if self.verbose {
            Verbosity::Verbose
        } else if self.quiet {
            Verbosity::Quiet
        } else {
            Verbosity::Normal
        };
        Config {
            verbosity,
            json: self.json,
        }
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            branch: self.branch.clone(),
            branches: self.branches.clone(),
            auto_upstream: self.auto_upstream,
            skip_non_existent_local: !self.create_missing,
            fetch_depth: self.depth,
            no_stash: self.no_stash,
            remote: self.remote.clone(),
        }
    }

    pub fn jobs(&self) -> usize {
        self.jobs.clamp(1, MAX_JOBS)
    }

    /// Non-fatal argument combinations worth telling the user about.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.branch.is_some() && !self.branches.is_empty() {
            warnings.push("both --branch and --branches given, using --branches".to_string());
        }
        if self.create_missing && self.branches.is_empty() {
            warnings.push("--create-missing only applies to --branches".to_string());
        }
        warnings
    }
}
