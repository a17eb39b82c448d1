//! Fake HAL implementation for testing.
//!
//! Records every operation without executing it, so provisioning can be tested
//! without root, without a spare NVMe disk and without network access. Failures
//! can be injected per operation to exercise the fatal/suppressed split.

use super::{DirOps, FormatOps, FormatOptions, MountOps, MountOptions, ProbeOps, ProcessOps};
use crate::{HalError, HalResult};
use std::collections::{HashMap, HashSet};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Operation records for testing and verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Lsblk {
        disk: Option<PathBuf>,
    },
    FormatExt4 {
        device: PathBuf,
        extra_args: Vec<String>,
    },
    CreateDir {
        path: PathBuf,
    },
    SetMode {
        path: PathBuf,
        mode: u32,
    },
    Mount {
        device: PathBuf,
        target: PathBuf,
        fstype: Option<String>,
    },
    Command {
        program: String,
        args: Vec<String>,
        /// `None` when the caller set no limit.
        timeout_secs: Option<u64>,
    },
}

impl Operation {
    /// `program arg1 arg2 ...` for command records, `None` otherwise.
    pub fn command_line(&self) -> Option<String> {
        match self {
            Operation::Command { program, args, .. } => {
                let mut line = program.clone();
                for arg in args {
                    line.push(' ');
                    line.push_str(arg);
                }
                Some(line)
            }
            _ => None,
        }
    }
}

/// Where an injected failure fires.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Lsblk,
    Format,
    CreateDir,
    SetMode,
    Mount,
    /// A command whose program matches and whose arguments start with `args_prefix`.
    Command {
        program: String,
        args_prefix: Vec<String>,
    },
}

#[derive(Debug, Clone, Default)]
struct FakeHalState {
    operations: Vec<Operation>,
    mounted_paths: HashSet<PathBuf>,
    failures: Vec<FailPoint>,
    stdout: HashMap<String, Vec<u8>>,
}

/// Fake HAL implementation that records operations without executing them.
#[derive(Debug, Clone, Default)]
pub struct FakeHal {
    state: Arc<Mutex<FakeHalState>>,
}

impl FakeHal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeHalState> {
        match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<Operation> {
        self.lock().operations.clone()
    }

    /// Command lines of every recorded command, in order.
    pub fn command_lines(&self) -> Vec<String> {
        self.lock()
            .operations
            .iter()
            .filter_map(Operation::command_line)
            .collect()
    }

    /// Get the number of operations recorded.
    pub fn operation_count(&self) -> usize {
        self.lock().operations.len()
    }

    /// Check if a specific operation was recorded.
    pub fn has_operation(&self, check: impl Fn(&Operation) -> bool) -> bool {
        self.lock().operations.iter().any(check)
    }

    /// Clear recorded operations and simulated mounts. Injected failures stay.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.operations.clear();
        state.mounted_paths.clear();
    }

    /// Make every later operation hitting `point` fail.
    pub fn fail_on(&self, point: FailPoint) {
        self.lock().failures.push(point);
    }

    /// Convenience for [`FailPoint::Command`].
    pub fn fail_command(&self, program: &str, args_prefix: &[&str]) {
        self.fail_on(FailPoint::Command {
            program: program.to_string(),
            args_prefix: args_prefix.iter().map(|s| s.to_string()).collect(),
        });
    }

    /// Canned stdout returned by captured runs of `program`.
    pub fn set_stdout(&self, program: &str, stdout: impl Into<Vec<u8>>) {
        self.lock()
            .stdout
            .insert(program.to_string(), stdout.into());
    }

    /// Pretend `target` is already a mount point.
    pub fn mark_mounted(&self, target: impl Into<PathBuf>) {
        self.lock().mounted_paths.insert(target.into());
    }

    fn should_fail(&self, point: &FailPoint) -> bool {
        self.lock().failures.iter().any(|f| f == point)
    }

    fn command_should_fail(&self, program: &str, args: &[&str]) -> bool {
        self.lock().failures.iter().any(|f| match f {
            FailPoint::Command {
                program: p,
                args_prefix,
            } => {
                p == program
                    && args_prefix.len() <= args.len()
                    && args_prefix.iter().zip(args).all(|(a, b)| a == b)
            }
            _ => false,
        })
    }

    fn record_operation(&self, op: Operation) {
        self.lock().operations.push(op);
    }
}

fn injected_failure(program: &str) -> HalError {
    HalError::CommandFailed {
        program: program.to_string(),
        code: Some(1),
        stderr: "injected failure".to_string(),
    }
}

impl FakeHal {
    fn run_command(&self, program: &str, args: &[&str], timeout: Option<Duration>) -> Output {
        self.record_operation(Operation::Command {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            timeout_secs: timeout.map(|t| t.as_secs()),
        });

        let code = if self.command_should_fail(program, args) {
            1
        } else {
            0
        };
        let stdout = self.lock().stdout.get(program).cloned().unwrap_or_default();

        Output {
            status: ExitStatus::from_raw(code << 8),
            stdout,
            stderr: Vec::new(),
        }
    }
}

impl ProcessOps for FakeHal {
    fn command_output(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> HalResult<Output> {
        Ok(self.run_command(program, args, Some(timeout)))
    }

    fn command_status(
        &self,
        program: &str,
        args: &[&str],
        timeout: Option<Duration>,
    ) -> HalResult<()> {
        if !self.run_command(program, args, timeout).status.success() {
            return Err(injected_failure(program));
        }
        Ok(())
    }
}

impl ProbeOps for FakeHal {
    fn lsblk_fs(&self, disk: Option<&Path>) -> HalResult<String> {
        self.record_operation(Operation::Lsblk {
            disk: disk.map(Path::to_path_buf),
        });
        if self.should_fail(&FailPoint::Lsblk) {
            return Err(injected_failure("lsblk"));
        }
        Ok("NAME    FSTYPE LABEL UUID MOUNTPOINTS\nnvme1n1\n".to_string())
    }
}

impl FormatOps for FakeHal {
    fn format_ext4(&self, device: &Path, opts: &FormatOptions) -> HalResult<()> {
        if !opts.dry_run && !opts.confirmed {
            return Err(HalError::SafetyLock);
        }

        if opts.dry_run {
            log::info!("FAKE HAL DRY RUN: mkfs.ext4 {}", device.display());
            return Ok(());
        }

        log::info!("FAKE HAL: mkfs.ext4 {}", device.display());

        self.record_operation(Operation::FormatExt4 {
            device: device.to_path_buf(),
            extra_args: opts.extra_args.clone(),
        });

        if self.should_fail(&FailPoint::Format) {
            return Err(HalError::CommandFailed {
                program: "mkfs.ext4".to_string(),
                code: Some(1),
                stderr: format!("The file {} does not exist", device.display()),
            });
        }
        Ok(())
    }
}

impl DirOps for FakeHal {
    fn create_dir_all(&self, path: &Path, dry_run: bool) -> HalResult<()> {
        if dry_run {
            log::info!("FAKE HAL DRY RUN: mkdir -p {}", path.display());
            return Ok(());
        }
        self.record_operation(Operation::CreateDir {
            path: path.to_path_buf(),
        });
        if self.should_fail(&FailPoint::CreateDir) {
            return Err(HalError::PermissionDenied(path.display().to_string()));
        }
        Ok(())
    }

    fn set_mode(&self, path: &Path, mode: u32, dry_run: bool) -> HalResult<()> {
        if dry_run {
            log::info!("FAKE HAL DRY RUN: chmod {:04o} {}", mode, path.display());
            return Ok(());
        }
        self.record_operation(Operation::SetMode {
            path: path.to_path_buf(),
            mode,
        });
        if self.should_fail(&FailPoint::SetMode) {
            return Err(HalError::PermissionDenied(path.display().to_string()));
        }
        Ok(())
    }
}

impl MountOps for FakeHal {
    fn mount_device(
        &self,
        device: &Path,
        target: &Path,
        fstype: Option<&str>,
        _options: MountOptions,
        dry_run: bool,
    ) -> HalResult<()> {
        if dry_run {
            log::info!(
                "FAKE HAL DRY RUN: mount {} -> {}",
                device.display(),
                target.display()
            );
            return Ok(());
        }

        log::info!(
            "FAKE HAL: mount {} -> {} (type: {:?})",
            device.display(),
            target.display(),
            fstype
        );

        self.record_operation(Operation::Mount {
            device: device.to_path_buf(),
            target: target.to_path_buf(),
            fstype: fstype.map(String::from),
        });

        if self.should_fail(&FailPoint::Mount) {
            return Err(HalError::Nix(nix::errno::Errno::ENOENT));
        }
        self.mark_mounted(target);
        Ok(())
    }

    fn is_mounted(&self, path: &Path) -> HalResult<bool> {
        Ok(self.lock().mounted_paths.contains(path))
    }
}
