//! Progress bars, colored output, and summary formatting.
//!
//! This module provides visual feedback during repository syncs including
//! spinners, progress bars, colored summaries and the JSON report.

use crate::config::Config;
use crate::constants::{MAX_VISIBLE_COMPLETIONS, PROGRESS_TICK_MS};
use crate::repo::RepoTarget;
use crate::result::{AheadBehind, BranchDetail, BranchStatus, SyncResult};
use crate::sync::{SyncCallbacks, SyncStep};
use colored::{ColoredString, Colorize};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde_json::Value;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Prints a repository header in verbose mode.
pub fn print_repo_header(config: &Config, repo_name: &str) {
    if !config.is_verbose() {
        return;
    }
    eprintln!("\n{}", format!("[{}]", repo_name).white().bold());
}

/// Prints a step progress message in verbose mode.
pub fn print_step(config: &Config, step: &SyncStep) {
    if !config.is_verbose() {
        return;
    }
    eprintln!("  {}...", step.to_string().dimmed());
}

/// Spinner for a single repository sync.
/// Uses `Option` to avoid allocation when progress is hidden.
pub struct SingleRepoProgress {
    spinner: Option<ProgressBar>,
}

impl SingleRepoProgress {
    pub fn update(&self, step: &SyncStep) {
        if let Some(spinner) = &self.spinner {
            spinner.set_message(format_step_message(step));
        }
    }

    pub fn finish(&self, result: &SyncResult) {
        let Some(spinner) = &self.spinner else {
            return;
        };
        if result.success {
            spinner.finish_with_message(format!(
                "{} {} synced successfully",
                "✓".green(),
                result.repo_name
            ));
        } else {
            spinner.finish_with_message(format!(
                "{} {} failed: {}",
                "✗".red(),
                result.repo_name,
                result.error.as_deref().unwrap_or("unknown error")
            ));
        }
    }
}

/// Callbacks for a single repository sync.
/// Combines spinner updates with verbose step output.
pub struct SingleRepoCallbacks {
    progress: SingleRepoProgress,
    config: Config,
}

impl SingleRepoCallbacks {
    pub fn new(progress: SingleRepoProgress, config: Config) -> Self {
        Self { progress, config }
    }
}

impl SyncCallbacks for SingleRepoCallbacks {
    fn on_sync_start(&self, repo_name: &str) {
        print_repo_header(&self.config, repo_name);
    }

    fn on_step(&self, step: &SyncStep) {
        self.progress.update(step);
        print_step(&self.config, step);
    }

    fn on_complete(&self, result: &SyncResult) {
        self.progress.finish(result);
    }
}

/// Consolidated state for workspace progress tracking, kept under one lock.
struct CompletionState {
    /// Recently completed repos for display (bounded by MAX_VISIBLE_COMPLETIONS)
    repos: VecDeque<(String, bool)>,
    failed_count: usize,
    total_completed: usize,
}

/// Thread-safe progress tracker for multi-repository runs.
/// Shows a progress bar with the completion count and recent results.
#[derive(Clone)]
pub struct WorkspaceProgress {
    _multi: Arc<MultiProgress>,
    main_bar: ProgressBar,
    completion_slots: Vec<ProgressBar>,
    state: Arc<Mutex<CompletionState>>,
}

impl WorkspaceProgress {
    pub fn create_repo_tracker(&self, repo_name: &str, config: Config) -> RepoProgressTracker {
        RepoProgressTracker {
            repo_name: repo_name.to_string(),
            workspace: self.clone(),
            config,
        }
    }

    pub fn mark_completed(&self, repo_name: &str, success: bool) {
        self.main_bar.inc(1);

        let mut state = self.lock_state();
        if !success {
            state.failed_count += 1;
            self.main_bar
                .set_message(format!("│ {} failed", state.failed_count).red().to_string());
        }

        state.total_completed += 1;
        state.repos.push_back((repo_name.to_string(), success));
        while state.repos.len() > MAX_VISIBLE_COMPLETIONS {
            state.repos.pop_front();
        }

        self.redraw_completions(&state);
    }

    pub fn finish(&self) {
        self.main_bar.finish_and_clear();
        for slot in &self.completion_slots {
            slot.finish_and_clear();
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CompletionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn redraw_completions(&self, state: &CompletionState) {
        let show_ellipsis = state.total_completed > MAX_VISIBLE_COMPLETIONS;

        for (i, slot) in self.completion_slots.iter().enumerate() {
            if i == 0 && show_ellipsis {
                slot.set_message("...".dimmed().to_string());
                continue;
            }
            let idx = if show_ellipsis { i - 1 } else { i };
            match state.repos.get(idx) {
                Some((name, success)) => {
                    let symbol = if *success { "✓".green() } else { "✗".red() };
                    slot.set_message(format!("{} {}", symbol, name));
                }
                None => slot.set_message(""),
            }
        }
    }
}

/// Per-repository tracker that reports completion to the workspace bar.
#[derive(Clone)]
pub struct RepoProgressTracker {
    repo_name: String,
    workspace: WorkspaceProgress,
    config: Config,
}

impl SyncCallbacks for RepoProgressTracker {
    fn on_sync_start(&self, repo_name: &str) {
        print_repo_header(&self.config, repo_name);
    }

    fn on_step(&self, step: &SyncStep) {
        print_step(&self.config, step);
    }

    fn on_complete(&self, result: &SyncResult) {
        self.workspace.mark_completed(&self.repo_name, result.success);
    }
}

fn spinner_style(template: &str) -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Creates the spinner for a single repository; hidden unless progress is shown.
#[must_use]
pub fn create_single_repo_progress(config: &Config) -> SingleRepoProgress {
    let spinner = config.shows_progress().then(|| {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(spinner_style("{spinner:.cyan} {msg}").tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        spinner.enable_steady_tick(Duration::from_millis(PROGRESS_TICK_MS));
        spinner
    });

    SingleRepoProgress { spinner }
}

/// Creates the completion-count bar for multi-repository runs.
#[must_use]
pub fn create_workspace_progress(total: usize, config: &Config) -> WorkspaceProgress {
    let multi = Arc::new(MultiProgress::new());
    let show_progress = config.shows_progress();

    let main_bar = if show_progress {
        let bar = multi.add(ProgressBar::new(total as u64));
        let style = ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos}/{len} completed {spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█░");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(PROGRESS_TICK_MS));
        bar
    } else {
        ProgressBar::hidden()
    };

    let completion_slots: Vec<ProgressBar> = if show_progress {
        (0..MAX_VISIBLE_COMPLETIONS)
            .map(|_| {
                let slot = multi.add(ProgressBar::new_spinner());
                slot.set_style(spinner_style("  {msg}"));
                slot
            })
            .collect()
    } else {
        vec![]
    };

    WorkspaceProgress {
        _multi: multi,
        main_bar,
        completion_slots,
        state: Arc::new(Mutex::new(CompletionState {
            repos: VecDeque::new(),
            failed_count: 0,
            total_completed: 0,
        })),
    }
}

pub fn print_working_dir(path: &Path, config: &Config) {
    if config.is_quiet() || config.json {
        return;
    }
    println!(
        "{} {}",
        "Working in:".cyan(),
        path.display().to_string().white().bold()
    )
}

pub fn print_workspace_start(count: usize, config: &Config) {
    if config.is_quiet() || config.json {
        return;
    }
    if count == 0 {
        print_no_repos()
    } else {
        println!(
            "{}",
            format!("Syncing {} repositories", count).dimmed()
        )
    }
}

pub fn print_no_repos() {
    println!("{}", "No git repositories found".yellow().bold())
}

pub fn print_summary(results: &[SyncResult], duration: Duration, config: &Config) {
    if config.is_quiet() {
        print_quiet_summary(results);
    } else {
        print_normal_summary(results, duration);
    }
}

/// Prints every result as a JSON array of versioned records.
pub fn print_json(results: &[SyncResult]) -> anyhow::Result<()> {
    let records = results
        .iter()
        .map(|result| result.to_record().map(Value::Object))
        .collect::<Result<Vec<_>, _>>()?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

/// Read-only branch listing for `--status`.
pub fn print_status_report(target: &RepoTarget, details: &[BranchDetail]) {
    println!(
        "{} {}",
        target.name.white().bold(),
        target.path.display().to_string().dimmed()
    );
    if details.is_empty() {
        println!("    {}", "no local branches".dimmed());
    }
    for detail in details {
        let marker = if detail.is_current { "*".cyan().bold() } else { " ".normal() };
        let upstream = match &detail.upstream_name {
            Some(name) => name.green(),
            None => "no upstream".yellow(),
        };
        let remote = if detail.exists_remotely {
            "".normal()
        } else {
            " (not on remote)".yellow()
        };
        println!(
            "  {} {} {} {}{}",
            marker,
            detail.name,
            upstream,
            format_ahead_behind(detail.ahead_behind),
            remote
        );
    }
}

fn print_quiet_summary(results: &[SyncResult]) {
    let (successes, failures): (Vec<_>, Vec<_>) = results.iter().partition(|r| r.success);

    // Always print count to stdout
    println!("{}/{} repositories synced", successes.len(), results.len());

    for result in &failures {
        eprintln!(
            "error: {}: {}",
            result.path.display(),
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
}

fn print_normal_summary(results: &[SyncResult], duration: Duration) {
    print_section("Summary");
    let (successes, failures): (Vec<_>, Vec<_>) = results.iter().partition(|r| r.success);

    print_successes(&successes);
    print_failures(&failures);

    println!(
        "{}: {}/{} repos in {}",
        "Total".white().bold(),
        successes.len(),
        results.len(),
        format_duration(duration)
    );
}

fn format_duration(duration: Duration) -> String {
    format!("{:.2}s", duration.as_secs_f32())
}

fn print_section(title: &str) {
    let line = "=".repeat(50).cyan().dimmed();
    let padding = (50 - title.len()) / 2;
    let centered = format!("{:>width$}", title, width = padding + title.len());
    println!("\n{}\n{}\n{}\n", line, centered.cyan().bold(), line);
}

fn print_successes(successes: &[&SyncResult]) {
    if successes.is_empty() {
        return;
    }
    println!(
        "{}",
        format!("Succeeded ({}):", successes.len()).green().bold()
    );

    for result in successes {
        println!(
            "  {} {} {}{} in {}",
            "OK".green().bold(),
            result.path.display().to_string().white(),
            format_current_branch(result),
            format_stash(result),
            format_duration(result.duration()).dimmed(),
        );
        print_branch_lines(result);
    }
    println!();
}

fn print_failures(failures: &[&SyncResult]) {
    if failures.is_empty() {
        return;
    }

    println!("{}", format!("Failed ({}):", failures.len()).red().bold());

    for result in failures {
        println!(
            "  {} {} {}{} {} in {}",
            "FAIL".red().bold(),
            result.path.display().to_string().white(),
            format_current_branch(result),
            format_stash(result),
            result.error.as_deref().unwrap_or("unknown error").red(),
            format_duration(result.duration()).dimmed(),
        );
        print_branch_lines(result);
    }
    println!();
}

fn print_branch_lines(result: &SyncResult) {
    for detail in &result.branch_details {
        println!("      {}", format_branch_line(detail));
    }
}

fn format_current_branch(result: &SyncResult) -> ColoredString {
    match &result.current_branch {
        Some(branch) => branch.cyan(),
        None => "(no branch)".dimmed(),
    }
}

fn format_stash(result: &SyncResult) -> ColoredString {
    if result.stashed {
        " (stash restored)".yellow()
    } else {
        "".normal()
    }
}

fn format_status(status: BranchStatus) -> ColoredString {
    match status {
        BranchStatus::Synced => "✓".green(),
        BranchStatus::Skipped => "-".yellow(),
        BranchStatus::Error => "✗".red(),
        BranchStatus::Pending => "?".dimmed(),
    }
}

fn format_branch_line(detail: &BranchDetail) -> String {
    let mut line = format!(
        "{} {} {}",
        format_status(detail.status),
        detail.name,
        detail.status.to_string().dimmed()
    );
    if let Some(upstream) = &detail.upstream_name {
        let linked = if detail.auto_set_success { " (linked)" } else { "" };
        line.push_str(&format!(" {}{}", upstream, linked));
    }
    if detail.ahead_behind.is_some() {
        line.push_str(&format!(" {}", format_ahead_behind(detail.ahead_behind)));
    }
    if let Some(reason) = &detail.error {
        line.push_str(&format!(" {}", format!("({})", reason).dimmed()));
    }
    line
}

fn format_ahead_behind(ahead_behind: Option<AheadBehind>) -> String {
    match ahead_behind {
        Some(counts) if counts.is_even() => "up to date".to_string(),
        Some(counts) => format!("↑{} ↓{}", counts.ahead, counts.behind),
        None => String::new(),
    }
}

fn format_step_message(step: &SyncStep) -> String {
    format!("{}...", step)
}
