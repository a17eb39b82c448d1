//! CLI argument parsing for trainprep
//!
//! With no subcommand the full provisioning sequence runs.

use crate::config::ProvisionConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "trainprep", version)]
#[command(about = "Provision a GPU training image layer")]
#[command(long_about = "Provision a GPU training image layer.\n\n\
    Defers NVMe scratch disk setup to the next interactive shell, installs the\n\
    documentation tooling under the compiled constraints file and replaces the\n\
    legacy training framework with the pinned lightweight one.\n\n\
    Run without a subcommand to perform the full sequence.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// TOML config file (defaults reproduce the stock image layer)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log every action without changing anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Persist completed stages here and skip them on the next run
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// Override the scratch disk device (e.g. /dev/nvme2n1)
    #[arg(long, global = true)]
    pub device: Option<PathBuf>,

    /// Override the scratch disk mount point
    #[arg(long, global = true)]
    pub mount_point: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 🚀 Full provisioning sequence (default)
    Run {
        /// Do not check installed package versions afterwards
        #[arg(long)]
        skip_verify: bool,

        /// Do not append the disk block if an identical one is already present
        #[arg(long)]
        dedupe_rc: bool,
    },

    /// 💾 Only the scratch disk setup
    DiskBootstrap {
        /// Execute the steps now instead of writing them to the shell startup file
        #[arg(long)]
        now: bool,

        /// Confirm formatting the device (required with --now unless --dry-run)
        #[arg(long)]
        yes_i_know: bool,

        /// Do not append the disk block if an identical one is already present
        #[arg(long)]
        dedupe_rc: bool,
    },

    /// 🗒️ Print the stages, shell block and package commands, change nothing
    Plan,

    /// 🔍 Read-only environment checks
    Preflight {
        /// Also require the tools used by `disk-bootstrap --now`
        #[arg(long)]
        disk_tools: bool,
    },

    /// ✅ Check the installed framework versions
    Verify,
}

impl Cli {
    /// The subcommand, `run` when none was given.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run {
            skip_verify: false,
            dedupe_rc: false,
        })
    }

    /// Apply CLI overrides on top of the loaded config.
    pub fn apply_overrides(&self, cfg: &mut ProvisionConfig) {
        if let Some(device) = &self.device {
            cfg.disk.device = device.clone();
        }
        if let Some(mount_point) = &self.mount_point {
            cfg.disk.mount_point = mount_point.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["trainprep"]).unwrap();
        assert_eq!(
            cli.command(),
            Command::Run {
                skip_verify: false,
                dedupe_rc: false
            }
        );
        assert!(!cli.dry_run);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "trainprep",
            "disk-bootstrap",
            "--now",
            "--yes-i-know",
            "--dry-run",
            "--device",
            "/dev/nvme2n1",
        ])
        .unwrap();
        assert!(cli.dry_run);
        assert_eq!(
            cli.command(),
            Command::DiskBootstrap {
                now: true,
                yes_i_know: true,
                dedupe_rc: false
            }
        );

        let mut cfg = ProvisionConfig::default();
        cli.apply_overrides(&mut cfg);
        assert_eq!(cfg.disk.device, PathBuf::from("/dev/nvme2n1"));
        assert_eq!(cfg.disk.mount_point, PathBuf::from("/mnt/local_storage"));
    }

    #[test]
    fn rejects_unknown_subcommand() {
        assert!(Cli::try_parse_from(["trainprep", "flash"]).is_err());
    }
}
