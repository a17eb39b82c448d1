//! The provisioning sequence.
//!
//! Stage order is part of the contract: the legacy framework is removed before
//! the tensor stack and its replacement are installed, and nothing is installed
//! before the constraints file has been found.

pub mod stage_01_disk_bootstrap;
pub mod stage_02_docs_tooling;
pub mod stage_03_training_framework;
pub mod stage_04_verify;

use crate::config::{ProvisionConfig, ResolvedPaths};
use crate::pip::Pip;
use crate::state_manager::RunState;
use trainprep_hal::SystemHal;
use trainprep_workflow::StageDefinition;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub dedupe_rc: bool,
    pub skip_verify: bool,
}

/// Everything a stage needs: the host, the config and the resolved paths.
pub struct Provisioner<'a, H: SystemHal + ?Sized> {
    pub hal: &'a H,
    pub cfg: &'a ProvisionConfig,
    pub paths: ResolvedPaths,
    pub options: RunOptions,
}

impl<'a, H: SystemHal + ?Sized> Provisioner<'a, H> {
    pub fn new(
        hal: &'a H,
        cfg: &'a ProvisionConfig,
        paths: ResolvedPaths,
        options: RunOptions,
    ) -> Self {
        Self {
            hal,
            cfg,
            paths,
            options,
        }
    }

    pub fn pip(&self, dry_run: bool) -> Pip<'a, H> {
        Pip::new(
            self.hal,
            self.cfg.packages.pip_bin(),
            self.cfg.packages.install_timeout(),
            dry_run,
        )
    }

    /// The ordered stage list for a full run.
    pub fn stages(&self) -> Vec<StageDefinition<'_, RunState>> {
        let mut stages = vec![
            StageDefinition::new(
                stage_01_disk_bootstrap::NAME,
                format!(
                    "append disk bootstrap for {} to {}",
                    self.cfg.disk.device.display(),
                    self.paths.rc_file.display()
                ),
                move |state: &mut RunState, dry_run| {
                    stage_01_disk_bootstrap::run(self, state, dry_run)
                },
            ),
            StageDefinition::new(
                stage_02_docs_tooling::NAME,
                format!(
                    "install {} under {}",
                    self.cfg.packages.docs.join(", "),
                    self.paths.constraints.display()
                ),
                move |state: &mut RunState, dry_run| {
                    stage_02_docs_tooling::run(self, state, dry_run)
                },
            ),
            StageDefinition::new(
                stage_03_training_framework::NAME,
                format!(
                    "replace {} with {}",
                    self.cfg.packages.legacy_framework,
                    self.cfg.packages.framework_requirement()
                ),
                move |state: &mut RunState, dry_run| {
                    stage_03_training_framework::run(self, state, dry_run)
                },
            ),
        ];
        if !self.options.skip_verify {
            stages.push(StageDefinition::new(
                stage_04_verify::NAME,
                format!(
                    "check {} is installed and {} is gone",
                    self.cfg.packages.framework_requirement(),
                    self.cfg.packages.legacy_framework
                ),
                move |state: &mut RunState, dry_run| stage_04_verify::run(self, state, dry_run),
            ));
        }
        stages
    }
}
