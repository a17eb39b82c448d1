//! Provisioning configuration.
//!
//! Every field has a default matching the stock image layer, so running with no
//! config file reproduces the standard provisioning sequence. A TOML file can
//! override any subset; CLI flags are applied on top by the caller.

use crate::errors::ProvisionError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Overrides the configured pip binary (used by tests to point at a mock).
pub const PIP_BIN_ENV: &str = "TRAINPREP_PIP_BIN";

pub const DEFAULT_DEVICE: &str = "/dev/nvme1n1";
pub const DEFAULT_MOUNT_POINT: &str = "/mnt/local_storage";
pub const DEFAULT_TENSOR_INDEX_URL: &str = "https://download.pytorch.org/whl/cu118";
pub const DEFAULT_FRAMEWORK_VERSION: &str = "2.0.3";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisionConfig {
    pub disk: DiskConfig,
    pub shell: ShellConfig,
    pub packages: PackageConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiskConfig {
    pub device: PathBuf,
    pub mount_point: PathBuf,
    pub fstype: String,
    /// Permission bits for the mount point.
    pub mode: u32,
    /// Prefix rendered shell lines with `sudo`.
    pub sudo: bool,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
            mount_point: PathBuf::from(DEFAULT_MOUNT_POINT),
            fstype: "ext4".to_string(),
            mode: 0o777,
            sudo: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShellConfig {
    /// Relative paths resolve against `$HOME`.
    pub rc_file: PathBuf,
    /// Skip the append when an identical block is already present.
    pub dedupe: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            rc_file: PathBuf::from(".bashrc"),
            dedupe: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageConfig {
    pub pip: String,
    /// Relative paths resolve against `$HOME`.
    pub constraints: PathBuf,
    pub docs: Vec<String>,
    pub legacy_framework: String,
    pub tensor_stack: Vec<String>,
    pub tensor_index_url: String,
    pub framework: String,
    pub framework_version: String,
    /// Upper bound for a single pip install or uninstall. `0` means no limit.
    pub install_timeout_secs: u64,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            pip: "pip3".to_string(),
            constraints: PathBuf::from("requirements_compiled.txt"),
            docs: vec!["myst-parser".to_string(), "myst-nb".to_string()],
            legacy_framework: "pytorch-lightning".to_string(),
            tensor_stack: vec![
                "torch".to_string(),
                "torchvision".to_string(),
                "torchaudio".to_string(),
            ],
            tensor_index_url: DEFAULT_TENSOR_INDEX_URL.to_string(),
            framework: "lightning".to_string(),
            framework_version: DEFAULT_FRAMEWORK_VERSION.to_string(),
            install_timeout_secs: 0,
        }
    }
}

impl PackageConfig {
    /// The pip executable, honouring [`PIP_BIN_ENV`].
    pub fn pip_bin(&self) -> String {
        env::var(PIP_BIN_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.pip.clone())
    }

    /// `framework==version`
    pub fn framework_requirement(&self) -> String {
        format!("{}=={}", self.framework, self.framework_version)
    }

    /// `None` unless a limit was configured.
    pub fn install_timeout(&self) -> Option<Duration> {
        (self.install_timeout_secs > 0).then(|| Duration::from_secs(self.install_timeout_secs))
    }
}

/// Host paths derived from the config and `$HOME`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub home: PathBuf,
    pub rc_file: PathBuf,
    pub constraints: PathBuf,
}

impl ProvisionConfig {
    /// Load from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cfg = match path {
            Some(path) => {
                let content = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                Self::from_toml(&content)
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))?
            }
            None => Self::default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<(), ProvisionError> {
        let invalid = |msg: &str| Err(ProvisionError::InvalidConfig(msg.to_string()));

        if self.disk.device.as_os_str().is_empty() {
            return invalid("disk.device must not be empty");
        }
        if !self.disk.mount_point.is_absolute() {
            return invalid("disk.mount_point must be an absolute path");
        }
        if self.disk.fstype != "ext4" {
            return invalid("disk.fstype: only ext4 is supported");
        }
        if self.disk.mode > 0o7777 {
            return invalid("disk.mode must be a permission mask (<= 0o7777)");
        }
        if self.packages.pip.trim().is_empty() {
            return invalid("packages.pip must not be empty");
        }
        if self.packages.framework.trim().is_empty()
            || self.packages.framework_version.trim().is_empty()
        {
            return invalid("packages.framework and packages.framework_version are required");
        }
        if !self.packages.tensor_index_url.starts_with("https://") {
            return invalid("packages.tensor_index_url must be an https:// URL");
        }
        Ok(())
    }

    pub fn resolve(&self, home: &Path) -> ResolvedPaths {
        ResolvedPaths {
            home: home.to_path_buf(),
            rc_file: home.join(&self.shell.rc_file),
            constraints: home.join(&self.packages.constraints),
        }
    }
}

/// `$HOME`, required for every run.
pub fn home_dir() -> Result<PathBuf, ProvisionError> {
    env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .ok_or(ProvisionError::HomeNotSet)
}
