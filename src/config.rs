//! Configuration records: what to sync, and how loudly to report it.

use crate::constants::DEFAULT_REMOTE;
use crate::log::{ConsoleLogger, LogLevel, NoOpLogger, SyncLogger};
use std::sync::Arc;

/// Per-repository sync options, identical for every target of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Single named branch to sync.
    pub branch: Option<String>,
    /// Ordered branch list; wins over `branch` when non-empty.
    pub branches: Vec<String>,
    /// Link a missing upstream to `<remote>/<branch>` when that ref exists.
    pub auto_upstream: bool,
    /// In multi-branch mode, skip branches that have no local copy.
    pub skip_non_existent_local: bool,
    /// Passed as `fetch --depth`.
    pub fetch_depth: Option<u32>,
    pub no_stash: bool,
    pub remote: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            branch: None,
            branches: Vec::new(),
            auto_upstream: false,
            skip_non_existent_local: true,
            fetch_depth: None,
            no_stash: false,
            remote: DEFAULT_REMOTE.to_string(),
        }
    }
}

/// Branch-selection policy, derived from `SyncConfig` in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode<'a> {
    Multi(&'a [String]),
    Single(&'a str),
    Current,
}

impl SyncConfig {
    pub fn mode(&self) -> SyncMode<'_> {
        if !self.branches.is_empty() {
            SyncMode::Multi(&self.branches)
        } else if let Some(branch) = self.branch.as_deref() {
            SyncMode::Single(branch)
        } else {
            SyncMode::Current
        }
    }
}

/// Presentation settings derived from CLI arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct Config {
    /// Controls the verbosity level of CLI output.
    pub verbosity: Verbosity,
    /// Emit result records as JSON instead of the colored summary.
    pub json: bool,
}

impl Config {
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    #[must_use]
    pub fn is_verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }

    /// Progress bars are drawn only in normal, non-JSON mode.
    #[must_use]
    pub fn shows_progress(&self) -> bool {
        !self.json && self.verbosity == Verbosity::Normal
    }

    /// Returns the logging sink to hand to each orchestrator.
    ///
    /// Verbose output streams everything including git invocations; other
    /// modes stay silent so the progress display and summary own the terminal.
    #[must_use]
    pub fn logger(&self) -> Arc<dyn SyncLogger> {
        if self.is_verbose() {
            Arc::new(ConsoleLogger::new(LogLevel::Debug))
        } else {
            Arc::new(NoOpLogger)
        }
    }
}

/// Verbosity level for CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}
