//! Read-only checks run before provisioning touches anything.

use crate::config::{ProvisionConfig, ResolvedPaths};
use crate::errors::ProvisionError;
use anyhow::{bail, Context, Result};
use std::env;
use std::ffi::{CString, OsStr};
use std::fs;
use std::net::{TcpStream, ToSocketAddrs};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const GIB: u64 = 1 << 30;
/// Room for the CUDA wheels pip unpacks under HOME.
const MIN_FREE_GIB: u64 = 10;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
pub const SKIP_NETWORK_ENV: &str = "TRAINPREP_SKIP_NETWORK_CHECK";

#[derive(Clone, Debug)]
pub struct PreflightConfig {
    pub home: PathBuf,
    pub constraints: PathBuf,
    pub min_free_gib: u64,
    /// `(host, port)` of the tensor stack index.
    pub index_endpoint: Option<(String, u16)>,
    pub binaries: Vec<String>,
}

impl PreflightConfig {
    /// Checks for a full provisioning run. `disk_tools` adds the binaries the
    /// immediate disk bootstrap needs.
    pub fn for_provision(cfg: &ProvisionConfig, paths: &ResolvedPaths, disk_tools: bool) -> Self {
        let mut binaries = vec![cfg.packages.pip_bin()];
        if disk_tools {
            binaries.extend(["lsblk".to_string(), "mkfs.ext4".to_string()]);
        }
        Self {
            home: paths.home.clone(),
            constraints: paths.constraints.clone(),
            min_free_gib: MIN_FREE_GIB,
            index_endpoint: https_endpoint(&cfg.packages.tensor_index_url),
            binaries,
        }
    }
}

fn https_endpoint(url: &str) -> Option<(String, u16)> {
    let authority = url.strip_prefix("https://")?.split('/').next()?;
    if authority.is_empty() {
        return None;
    }
    Some(match authority.rsplit_once(':') {
        Some((host, port)) => (host.to_string(), port.parse().ok()?),
        None => (authority.to_string(), 443),
    })
}

pub fn run(cfg: &PreflightConfig) -> Result<()> {
    log::info!("🧪 Preflight checks");

    if !cfg.home.is_dir() {
        bail!("HOME ({}) is not a directory", cfg.home.display());
    }
    if !cfg.constraints.is_file() {
        return Err(ProvisionError::MissingConstraints(cfg.constraints.clone()).into());
    }
    log::info!("📄 Constraints file: {}", cfg.constraints.display());

    let free_gib = free_bytes(&cfg.home)? / GIB;
    if free_gib < cfg.min_free_gib {
        bail!(
            "Insufficient disk space under {}: {} GiB free, {} GiB required",
            cfg.home.display(),
            free_gib,
            cfg.min_free_gib
        );
    }

    let search_path = env::var_os("PATH").unwrap_or_default();
    for name in &cfg.binaries {
        let found = locate_binary(name, &search_path)?;
        log::info!("🔧 {} -> {}", name, found.display());
    }

    match &cfg.index_endpoint {
        Some(_) if env::var_os(SKIP_NETWORK_ENV).is_some() => {
            log::info!("Skipping network check ({} is set)", SKIP_NETWORK_ENV);
        }
        Some((host, port)) => probe_tcp(host, *port)?,
        None => {}
    }

    log::info!("✅ Preflight complete");
    Ok(())
}

/// Resolve `name` the way a shell would and insist on an executable file.
fn locate_binary(name: &str, search_path: &OsStr) -> Result<PathBuf> {
    let candidate = if name.contains('/') {
        Some(PathBuf::from(name)).filter(|p| p.exists())
    } else {
        env::split_paths(search_path)
            .map(|dir| dir.join(name))
            .find(|p| p.exists())
    };
    let Some(path) = candidate else {
        bail!("Required binary '{}' not found in PATH", name);
    };

    let meta = fs::metadata(&path).with_context(|| format!("cannot stat {}", path.display()))?;
    if !meta.is_file() || meta.permissions().mode() & 0o111 == 0 {
        bail!(
            "Required binary '{}' at {} is not executable",
            name,
            path.display()
        );
    }
    Ok(path)
}

fn probe_tcp(host: &str, port: u16) -> Result<()> {
    let target = format!("{host}:{port}");
    let reachable = target
        .to_socket_addrs()
        .with_context(|| format!("cannot resolve {}", target))?
        .any(|addr| TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT).is_ok());
    if !reachable {
        bail!("Package index {} is unreachable", target);
    }
    log::info!("🌐 {} reachable", target);
    Ok(())
}

/// Bytes available to an unprivileged user on the filesystem holding `path`.
#[allow(clippy::unnecessary_cast)]
fn free_bytes(path: &Path) -> Result<u64> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .with_context(|| format!("path contains a NUL byte: {}", path.display()))?;
    // SAFETY: statvfs only writes into the zeroed struct we own.
    let mut fs_stat: libc::statvfs = unsafe { std::mem::zeroed() };
    if unsafe { libc::statvfs(c_path.as_ptr(), &mut fs_stat) } != 0 {
        return Err(std::io::Error::last_os_error())
            .with_context(|| format!("statvfs {}", path.display()));
    }
    Ok(fs_stat.f_bavail as u64 * fs_stat.f_frsize as u64)
}
