use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use git_sync_rust::cli::Cli;
use git_sync_rust::config::{Config, SyncConfig};
use git_sync_rust::git::GitCommand;
use git_sync_rust::inspect::BranchInspector;
use git_sync_rust::output::{self, SingleRepoCallbacks};
use git_sync_rust::repo::{self, RepoTarget};
use git_sync_rust::result::{BranchDetail, SyncResult};
use git_sync_rust::sync::SyncOrchestrator;
use git_sync_rust::{constants, log::SyncLogger};
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli.config();
    let sync_config = cli.sync_config();

    for warning in cli.warnings() {
        eprintln!("{} {}", "warning:".yellow(), warning);
    }

    let root = cli
        .path
        .canonicalize()
        .with_context(|| format!("Path does not exist: {}", cli.path.display()))?;
    output::print_working_dir(&root, &config);

    let mut targets = discover(&cli, &root)?;
    if cli.interactive && !targets.is_empty() {
        targets = select_targets(targets)?;
    }
    if targets.is_empty() {
        if config.json {
            println!("[]");
        } else if !config.is_quiet() {
            output::print_no_repos();
        }
        return Ok(ExitCode::SUCCESS);
    }

    if cli.status {
        return run_status(&targets, &sync_config, &config);
    }

    let started = Instant::now();
    let results = run_sync(&targets, &sync_config, &config, cli.jobs())?;

    if config.json {
        output::print_json(&results)?;
    } else {
        output::print_summary(&results, started.elapsed(), &config);
    }

    if results.iter().all(|r| r.success) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn discover(cli: &Cli, root: &Path) -> anyhow::Result<Vec<RepoTarget>> {
    if cli.recursive {
        return Ok(repo::find_repos(root, cli.max_depth));
    }
    if repo::is_work_tree(root) {
        Ok(vec![RepoTarget::new(root)])
    } else {
        anyhow::bail!(
            "{} is not a git repository (use --recursive to search inside it)",
            root.display()
        )
    }
}

fn select_targets(targets: Vec<RepoTarget>) -> anyhow::Result<Vec<RepoTarget>> {
    let labels: Vec<String> = targets
        .iter()
        .map(|t| t.path.display().to_string())
        .collect();
    let defaults = vec![true; labels.len()];
    let chosen = dialoguer::MultiSelect::new()
        .with_prompt("Repositories to sync")
        .items(&labels)
        .defaults(&defaults)
        .interact()
        .context("Failed to read repository selection")?;

    Ok(targets
        .into_iter()
        .enumerate()
        .filter(|(i, _)| chosen.contains(i))
        .map(|(_, t)| t)
        .collect())
}

fn runner_for(target: &RepoTarget, logger: &Arc<dyn SyncLogger>) -> GitCommand {
    GitCommand::new(&target.path)
        .with_timeout(constants::git_timeout())
        .with_logger(Arc::clone(logger))
}

fn run_sync(
    targets: &[RepoTarget],
    sync_config: &SyncConfig,
    config: &Config,
    jobs: usize,
) -> anyhow::Result<Vec<SyncResult>> {
    let logger = config.logger();

    if let [target] = targets {
        let runner = runner_for(target, &logger);
        let callbacks =
            SingleRepoCallbacks::new(output::create_single_repo_progress(config), *config);
        let result = SyncOrchestrator::new(target.clone(), &runner, logger.as_ref())
            .with_callbacks(&callbacks)
            .sync_repo(sync_config);
        return Ok(vec![result]);
    }

    output::print_workspace_start(targets.len(), config);
    let progress = output::create_workspace_progress(targets.len(), config);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("Failed to build worker pool")?;

    // Each target gets its own runner; results keep the order of `targets`.
    let results = pool.install(|| {
        targets
            .par_iter()
            .map(|target| {
                let runner = runner_for(target, &logger);
                let tracker = progress.create_repo_tracker(&target.name, *config);
                SyncOrchestrator::new(target.clone(), &runner, logger.as_ref())
                    .with_callbacks(&tracker)
                    .sync_repo(sync_config)
            })
            .collect::<Vec<_>>()
    });
    progress.finish();

    Ok(results)
}

#[derive(Serialize)]
struct StatusReport<'a> {
    repo_name: &'a str,
    path: &'a Path,
    branch_details: Vec<BranchDetail>,
}

fn run_status(
    targets: &[RepoTarget],
    sync_config: &SyncConfig,
    config: &Config,
) -> anyhow::Result<ExitCode> {
    let logger = config.logger();
    let mut reports = Vec::new();
    let mut failed = false;

    for target in targets {
        let runner = runner_for(target, &logger);
        let inspector =
            BranchInspector::new(&runner, &sync_config.remote).with_logger(logger.as_ref());
        match inspector.branch_details() {
            Ok(branch_details) if config.json => reports.push(StatusReport {
                repo_name: &target.name,
                path: &target.path,
                branch_details,
            }),
            Ok(details) => output::print_status_report(target, &details),
            Err(e) => {
                failed = true;
                eprintln!("{} {}: {}", "error:".red().bold(), target.name, e);
            }
        }
    }

    if config.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
