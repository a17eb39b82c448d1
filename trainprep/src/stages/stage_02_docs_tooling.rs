//! Documentation rendering packages, pinned by the compiled constraints file.

use super::Provisioner;
use crate::config::{PackageConfig, ResolvedPaths};
use crate::errors::ProvisionError;
use crate::pip::PipCommand;
use crate::state_manager::RunState;
use anyhow::Result;
use trainprep_hal::SystemHal;

pub const NAME: &str = "02_docs_tooling";

pub fn command(packages: &PackageConfig, paths: &ResolvedPaths) -> PipCommand {
    PipCommand::install(&packages.docs).with_constraints(&paths.constraints)
}

pub fn run<H: SystemHal + ?Sized>(
    p: &Provisioner<'_, H>,
    _state: &mut RunState,
    dry_run: bool,
) -> Result<()> {
    // Checked even in dry-run so a missing file shows up before a real run.
    if !p.paths.constraints.is_file() {
        return Err(ProvisionError::MissingConstraints(p.paths.constraints.clone()).into());
    }
    p.pip(dry_run).run(&command(&p.cfg.packages, &p.paths))
}
