//! Swap the legacy training framework for the pinned lightweight one.
//!
//! The legacy package goes first so the resolver never sees both frameworks
//! at once.

use super::Provisioner;
use crate::config::PackageConfig;
use crate::pip::PipCommand;
use crate::state_manager::RunState;
use anyhow::Result;
use trainprep_hal::SystemHal;

pub const NAME: &str = "03_training_framework";

pub fn uninstall_legacy(packages: &PackageConfig) -> PipCommand {
    PipCommand::Uninstall {
        package: packages.legacy_framework.clone(),
    }
}

pub fn install_tensor_stack(packages: &PackageConfig) -> PipCommand {
    PipCommand::install(&packages.tensor_stack).with_index_url(&packages.tensor_index_url)
}

pub fn install_framework(packages: &PackageConfig) -> PipCommand {
    PipCommand::install(&[packages.framework_requirement()])
}

pub fn run<H: SystemHal + ?Sized>(
    p: &Provisioner<'_, H>,
    state: &mut RunState,
    dry_run: bool,
) -> Result<()> {
    let pip = p.pip(dry_run);
    let packages = &p.cfg.packages;

    let uninstall = uninstall_legacy(packages);
    if !pip.run_best_effort(&uninstall) {
        state.record_suppressed(pip.command_line(&uninstall));
    }
    pip.run(&install_tensor_stack(packages))?;
    pip.run(&install_framework(packages))?;
    Ok(())
}
