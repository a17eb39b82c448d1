//! NVMe scratch disk bootstrap.
//!
//! The same five-step plan is either rendered into the user's shell startup
//! file (deferred; the default) or executed immediately through the HAL.
//! Formatting and mounting are allowed to fail because a previous run may have
//! prepared the disk already; every other step is fatal.

use crate::config::DiskConfig;
use crate::errors::ProvisionError;
use anyhow::{Context, Result};
use std::fmt;
use trainprep_hal::{FormatOptions, MountOptions, SystemHal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskAction {
    List,
    Format,
    CreateDir,
    SetMode,
    Mount,
}

impl fmt::Display for DiskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiskAction::List => "list block devices",
            DiskAction::Format => "format",
            DiskAction::CreateDir => "create mount point",
            DiskAction::SetMode => "set mount point permissions",
            DiskAction::Mount => "mount",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    Fatal,
    Suppressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskStep {
    pub action: DiskAction,
    pub failure: FailureMode,
}

impl DiskStep {
    const fn fatal(action: DiskAction) -> Self {
        Self {
            action,
            failure: FailureMode::Fatal,
        }
    }

    const fn suppressed(action: DiskAction) -> Self {
        Self {
            action,
            failure: FailureMode::Suppressed,
        }
    }

    /// The shell line for this step, `|| true` appended when suppressed.
    pub fn shell_line(&self, cfg: &DiskConfig) -> String {
        let sudo = if cfg.sudo { "sudo " } else { "" };
        let device = cfg.device.display();
        let mount_point = cfg.mount_point.display();
        let command = match self.action {
            DiskAction::List => format!("{sudo}lsblk -f"),
            DiskAction::Format => format!("{sudo}mkfs -t {} -F {device}", cfg.fstype),
            DiskAction::CreateDir => format!("{sudo}mkdir -p {mount_point}"),
            DiskAction::SetMode => format!("{sudo}chmod {:04o} {mount_point}", cfg.mode),
            DiskAction::Mount => format!("{sudo}mount {device} {mount_point}"),
        };
        match self.failure {
            FailureMode::Fatal => command,
            FailureMode::Suppressed => format!("{command} || true"),
        }
    }
}

/// The ordered disk plan.
pub fn steps() -> Vec<DiskStep> {
    vec![
        DiskStep::fatal(DiskAction::List),
        DiskStep::suppressed(DiskAction::Format),
        DiskStep::fatal(DiskAction::CreateDir),
        DiskStep::fatal(DiskAction::SetMode),
        DiskStep::suppressed(DiskAction::Mount),
    ]
}

/// Render `steps` as a newline-terminated shell block.
pub fn render_block(cfg: &DiskConfig, steps: &[DiskStep]) -> String {
    let mut block = String::new();
    for step in steps {
        block.push_str(&step.shell_line(cfg));
        block.push('\n');
    }
    block
}

/// What an immediate bootstrap run skipped over.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiskOutcome {
    pub suppressed: Vec<String>,
}

/// Run `steps` now. `confirmed` must be set for a non-dry run because the
/// format step destroys whatever is on the device.
pub fn execute_now<H: SystemHal + ?Sized>(
    hal: &H,
    cfg: &DiskConfig,
    steps: &[DiskStep],
    confirmed: bool,
    dry_run: bool,
) -> Result<DiskOutcome> {
    let formats = steps.iter().any(|s| s.action == DiskAction::Format);
    if formats && !dry_run && !confirmed {
        return Err(ProvisionError::MissingYesIKnow.into());
    }

    let mut outcome = DiskOutcome::default();
    for step in steps {
        let result = run_step(hal, cfg, step.action, confirmed, dry_run);
        match (result, step.failure) {
            (Ok(()), _) => {}
            (Err(err), FailureMode::Suppressed) => {
                log::warn!("⚠️  {} failed (ignored): {:#}", step.action, err);
                outcome.suppressed.push(format!("{}: {:#}", step.action, err));
            }
            (Err(err), FailureMode::Fatal) => {
                return Err(err.context(format!("disk bootstrap: {} failed", step.action)));
            }
        }
    }
    Ok(outcome)
}

fn run_step<H: SystemHal + ?Sized>(
    hal: &H,
    cfg: &DiskConfig,
    action: DiskAction,
    confirmed: bool,
    dry_run: bool,
) -> Result<()> {
    match action {
        DiskAction::List => {
            if dry_run {
                log::info!("DRY RUN: lsblk -f");
                return Ok(());
            }
            let listing = hal.lsblk_fs(None).context("lsblk -f")?;
            for line in listing.lines() {
                log::info!("  {}", line);
            }
        }
        DiskAction::Format => {
            let opts = FormatOptions::new(dry_run, confirmed).with_args(vec!["-F".to_string()]);
            hal.format_ext4(&cfg.device, &opts)
                .with_context(|| format!("mkfs.ext4 {}", cfg.device.display()))?;
        }
        DiskAction::CreateDir => {
            hal.create_dir_all(&cfg.mount_point, dry_run)
                .with_context(|| format!("mkdir -p {}", cfg.mount_point.display()))?;
        }
        DiskAction::SetMode => {
            hal.set_mode(&cfg.mount_point, cfg.mode, dry_run)
                .with_context(|| {
                    format!("chmod {:04o} {}", cfg.mode, cfg.mount_point.display())
                })?;
        }
        DiskAction::Mount => {
            if !dry_run && hal.is_mounted(&cfg.mount_point)? {
                log::info!(
                    "💾 {} is already mounted, leaving it in place",
                    cfg.mount_point.display()
                );
                return Ok(());
            }
            hal.mount_device(
                &cfg.device,
                &cfg.mount_point,
                Some(&cfg.fstype),
                MountOptions::new(),
                dry_run,
            )
            .with_context(|| {
                format!(
                    "mount {} {}",
                    cfg.device.display(),
                    cfg.mount_point.display()
                )
            })?;
        }
    }
    Ok(())
}
