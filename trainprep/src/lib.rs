//! trainprep: provision a GPU training image layer.
//!
//! The full run appends the NVMe scratch disk bootstrap to `$HOME/.bashrc`,
//! installs documentation tooling under `$HOME/requirements_compiled.txt` and
//! replaces `pytorch-lightning` with a pinned `lightning` on top of a CUDA 11.8
//! build of torch. The first unsuppressed failure stops the run.

pub mod cli;
pub mod config;
pub mod disk_bootstrap;
pub mod errors;
pub mod logging;
pub mod pip;
pub mod plan;
pub mod preflight;
pub mod shell_rc;
pub mod stages;
pub mod state_manager;

#[cfg(test)]
pub mod test_env;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use config::ProvisionConfig;
use stages::{Provisioner, RunOptions};
use state_manager::{JsonStateStore, RunState};
use std::path::Path;
use trainprep_hal::{LinuxHal, SystemHal};
use trainprep_workflow::{NoStore, StageDefinition, StageRunner};

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_with(cli.log_file.clone());

    let mut cfg = ProvisionConfig::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut cfg);
    cfg.validate()?;

    let home = config::home_dir()?;
    execute(&cli, &cfg, &home, &LinuxHal::new())
}

/// Dispatch a parsed command against `hal`, with `home` standing in for `$HOME`.
pub fn execute<H: SystemHal + ?Sized>(
    cli: &Cli,
    cfg: &ProvisionConfig,
    home: &Path,
    hal: &H,
) -> Result<()> {
    let paths = cfg.resolve(home);

    match cli.command() {
        Command::Run {
            skip_verify,
            dedupe_rc,
        } => {
            log::info!("🚀 Provisioning training image layer");
            let p = Provisioner::new(
                hal,
                cfg,
                paths,
                RunOptions {
                    dedupe_rc,
                    skip_verify,
                },
            );
            let state = run_stages(cli, &p.stages())?;
            report(&state);
        }
        Command::DiskBootstrap {
            now,
            yes_i_know,
            dedupe_rc,
        } => {
            if now {
                log::info!(
                    "💾 Bootstrapping {} on {} now",
                    cfg.disk.device.display(),
                    cfg.disk.mount_point.display()
                );
                let outcome = disk_bootstrap::execute_now(
                    hal,
                    &cfg.disk,
                    &disk_bootstrap::steps(),
                    yes_i_know,
                    cli.dry_run,
                )?;
                log::info!(
                    "✅ Disk bootstrap finished ({} step(s) tolerated)",
                    outcome.suppressed.len()
                );
            } else {
                let p = Provisioner::new(
                    hal,
                    cfg,
                    paths,
                    RunOptions {
                        dedupe_rc,
                        ..RunOptions::default()
                    },
                );
                let mut state = RunState::new(cli.dry_run);
                stages::stage_01_disk_bootstrap::run(&p, &mut state, cli.dry_run)?;
            }
        }
        Command::Plan => {
            let p = Provisioner::new(hal, cfg, paths, RunOptions::default());
            print!("{}", plan::build_plan(&p));
        }
        Command::Preflight { disk_tools } => {
            preflight::run(&preflight::PreflightConfig::for_provision(
                cfg, &paths, disk_tools,
            ))?;
        }
        Command::Verify => {
            let p = Provisioner::new(hal, cfg, paths, RunOptions::default());
            stages::stage_04_verify::verify(&p)?;
        }
    }
    Ok(())
}

fn run_stages(cli: &Cli, stages: &[StageDefinition<'_, RunState>]) -> Result<RunState> {
    match &cli.state {
        // A dry run must not mark stages as done for the real run that follows.
        Some(path) if !cli.dry_run => {
            log::info!("📝 Recording progress in {}", path.display());
            StageRunner::new(JsonStateStore::new(path), cli.dry_run, RunState::new).run(stages)
        }
        _ => StageRunner::new(NoStore, cli.dry_run, RunState::new).run(stages),
    }
}

fn report(state: &RunState) {
    for failure in &state.suppressed_failures {
        log::warn!("tolerated: {}", failure);
    }
    if state.dry_run {
        log::info!("🎉 Dry run complete, nothing was changed");
    } else {
        log::info!(
            "🎉 Provisioning complete ({} stages)",
            state.completed_stages.len()
        );
    }
}
