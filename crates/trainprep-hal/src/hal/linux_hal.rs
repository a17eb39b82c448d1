//! Linux HAL implementation using real processes and system calls.

use super::{DirOps, FormatOps, FormatOptions, MountOps, MountOptions, ProbeOps, ProcessOps};
use crate::procfs::mountinfo;
use crate::{HalError, HalResult};
use std::fs;
use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Real HAL implementation for Linux hosts.
#[derive(Debug, Clone, Default)]
pub struct LinuxHal;

impl LinuxHal {
    pub fn new() -> Self {
        Self
    }
}

const MKFS: &str = "mkfs.ext4";
const MOUNTINFO: &str = "/proc/self/mountinfo";
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const FORMAT_TIMEOUT: Duration = Duration::from_secs(600);

/// Where a spawned child's stdout and stderr go.
#[derive(Clone, Copy, PartialEq, Eq)]
enum ChildIo {
    Capture,
    Inherit,
}

fn spawn(program: &str, cmd: &mut Command) -> HalResult<Child> {
    cmd.spawn().map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => HalError::CommandNotFound(program.to_string()),
        _ => HalError::Io(err),
    })
}

/// Wait for `child`, killing and reaping it once `limit` has passed. Without
/// a limit this blocks until the child exits.
fn wait_or_kill(
    program: &str,
    child: &mut Child,
    limit: Option<Duration>,
) -> HalResult<ExitStatus> {
    let Some(limit) = limit else {
        return Ok(child.wait()?);
    };
    if let Some(status) = child.wait_timeout(limit)? {
        return Ok(status);
    }
    let _ = child.kill();
    let _ = child.wait();
    Err(HalError::CommandTimeout {
        program: program.to_string(),
        timeout_secs: limit.as_secs(),
    })
}

/// Reads a child pipe to the end on its own thread.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn run_child(
    program: &str,
    cmd: &mut Command,
    limit: Option<Duration>,
    mode: ChildIo,
) -> HalResult<Output> {
    cmd.stdin(Stdio::null());
    if mode == ChildIo::Inherit {
        cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        let mut child = spawn(program, cmd)?;
        let status = wait_or_kill(program, &mut child, limit)?;
        return Ok(Output {
            status,
            stdout: Vec::new(),
            stderr: Vec::new(),
        });
    }

    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = spawn(program, cmd)?;
    // Both pipes must be emptied while waiting or a chatty child blocks.
    let out = drain(child.stdout.take());
    let err = drain(child.stderr.take());
    let status = wait_or_kill(program, &mut child, limit);
    let stdout = out.join().unwrap_or_default();
    let stderr = err.join().unwrap_or_default();
    Ok(Output {
        status: status?,
        stdout,
        stderr,
    })
}

/// Captured run of a tool whose non-zero exit is an error.
fn checked_output(program: &str, cmd: &mut Command, limit: Duration) -> HalResult<Output> {
    let output = run_child(program, cmd, Some(limit), ChildIo::Capture)?;
    if output.status.success() {
        return Ok(output);
    }
    Err(HalError::CommandFailed {
        program: program.to_string(),
        code: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

fn command(program: &str, args: &[&str]) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd
}

fn map_nix_err(err: nix::errno::Errno, target: &Path) -> HalError {
    use nix::errno::Errno;
    match err {
        Errno::EBUSY => HalError::DiskBusy,
        Errno::EACCES | Errno::EPERM => HalError::PermissionDenied(target.display().to_string()),
        other => HalError::Nix(other),
    }
}

impl ProcessOps for LinuxHal {
    fn command_output(&self, program: &str, args: &[&str], timeout: Duration) -> HalResult<Output> {
        run_child(
            program,
            &mut command(program, args),
            Some(timeout),
            ChildIo::Capture,
        )
    }

    /// Progress from the package manager reaches the operator live, so there
    /// is no stderr to attach on failure.
    fn command_status(
        &self,
        program: &str,
        args: &[&str],
        timeout: Option<Duration>,
    ) -> HalResult<()> {
        let mut cmd = command(program, args);
        let status = run_child(program, &mut cmd, timeout, ChildIo::Inherit)?.status;
        if status.success() {
            return Ok(());
        }
        Err(HalError::CommandFailed {
            program: program.to_string(),
            code: status.code(),
            stderr: "see command output above".to_string(),
        })
    }
}

impl MountOps for LinuxHal {
    fn mount_device(
        &self,
        device: &Path,
        target: &Path,
        fstype: Option<&str>,
        options: MountOptions,
        dry_run: bool,
    ) -> HalResult<()> {
        log::debug!(
            "mount {} on {} (type {:?}, options {:?})",
            device.display(),
            target.display(),
            fstype,
            options.options
        );
        if dry_run {
            log::info!("DRY RUN: mount {} {}", device.display(), target.display());
            return Ok(());
        }
        nix::mount::mount(
            Some(device),
            target,
            fstype,
            nix::mount::MsFlags::empty(),
            options.options.as_deref(),
        )
        .map_err(|errno| map_nix_err(errno, target))
    }

    fn is_mounted(&self, path: &Path) -> HalResult<bool> {
        let table = fs::read_to_string(MOUNTINFO)?;
        Ok(mountinfo::is_mounted_from_info(
            path,
            &mountinfo::parse_mountinfo(&table),
        ))
    }
}

impl FormatOps for LinuxHal {
    fn format_ext4(&self, device: &Path, opts: &FormatOptions) -> HalResult<()> {
        let mut cmd = Command::new(MKFS);
        cmd.args(&opts.extra_args).arg(device);

        if opts.dry_run {
            log::info!("DRY RUN: {:?}", cmd);
            return Ok(());
        }
        if !opts.confirmed {
            return Err(HalError::SafetyLock);
        }

        log::info!("💽 Formatting {} as ext4", device.display());
        checked_output(MKFS, &mut cmd, FORMAT_TIMEOUT).map(drop)
    }
}

impl DirOps for LinuxHal {
    fn create_dir_all(&self, path: &Path, dry_run: bool) -> HalResult<()> {
        if dry_run {
            log::info!("DRY RUN: mkdir -p {}", path.display());
            return Ok(());
        }
        fs::create_dir_all(path).map_err(|e| HalError::from_io_at(e, path))
    }

    fn set_mode(&self, path: &Path, mode: u32, dry_run: bool) -> HalResult<()> {
        if dry_run {
            log::info!("DRY RUN: chmod {:04o} {}", mode, path.display());
            return Ok(());
        }
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|e| HalError::from_io_at(e, path))
    }
}

impl ProbeOps for LinuxHal {
    fn lsblk_fs(&self, disk: Option<&Path>) -> HalResult<String> {
        let mut cmd = Command::new("lsblk");
        cmd.arg("-f").args(disk);
        let listing = checked_output("lsblk", &mut cmd, PROBE_TIMEOUT)?;
        Ok(String::from_utf8_lossy(&listing.stdout).into_owned())
    }
}
