//! Defer the NVMe disk setup to the next interactive shell.

use super::Provisioner;
use crate::disk_bootstrap;
use crate::shell_rc;
use crate::state_manager::RunState;
use anyhow::Result;
use trainprep_hal::SystemHal;

pub const NAME: &str = "01_disk_bootstrap";

pub fn run<H: SystemHal + ?Sized>(
    p: &Provisioner<'_, H>,
    _state: &mut RunState,
    dry_run: bool,
) -> Result<()> {
    let block = disk_bootstrap::render_block(&p.cfg.disk, &disk_bootstrap::steps());
    let dedupe = p.options.dedupe_rc || p.cfg.shell.dedupe;
    shell_rc::append_block(&p.paths.rc_file, &block, dedupe, dry_run)?;
    Ok(())
}
