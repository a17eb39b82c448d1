//! Python package manager invocations.
//!
//! All pip calls go through [`ProcessOps`] so stages can be tested against the
//! fake HAL, and through one [`PipCommand`] type so `plan` prints exactly what
//! `run` executes.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use trainprep_hal::ProcessOps;

const LIST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipCommand {
    Install {
        packages: Vec<String>,
        constraints: Option<PathBuf>,
        index_url: Option<String>,
    },
    Uninstall {
        package: String,
    },
    List,
}

impl PipCommand {
    pub fn install(packages: &[String]) -> Self {
        PipCommand::Install {
            packages: packages.to_vec(),
            constraints: None,
            index_url: None,
        }
    }

    pub fn with_constraints(mut self, path: impl Into<PathBuf>) -> Self {
        if let PipCommand::Install { constraints, .. } = &mut self {
            *constraints = Some(path.into());
        }
        self
    }

    pub fn with_index_url(mut self, url: impl Into<String>) -> Self {
        if let PipCommand::Install { index_url, .. } = &mut self {
            *index_url = Some(url.into());
        }
        self
    }

    pub fn args(&self) -> Vec<String> {
        match self {
            PipCommand::Install {
                packages,
                constraints,
                index_url,
            } => {
                let mut args = vec!["install".to_string()];
                if let Some(path) = constraints {
                    args.push("-c".to_string());
                    args.push(path.display().to_string());
                }
                args.extend(packages.iter().cloned());
                if let Some(url) = index_url {
                    args.push("--index-url".to_string());
                    args.push(url.clone());
                }
                args
            }
            PipCommand::Uninstall { package } => {
                vec!["uninstall".to_string(), "-y".to_string(), package.clone()]
            }
            PipCommand::List => vec!["list".to_string(), "--format=json".to_string()],
        }
    }
}

impl fmt::Display for PipCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.args().join(" "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
}

/// PEP 503 name normalisation: lowercase, runs of `-`, `_`, `.` become `-`.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator = false;
    for ch in name.chars() {
        if matches!(ch, '-' | '_' | '.') {
            if !in_separator {
                out.push('-');
            }
            in_separator = true;
        } else {
            out.extend(ch.to_lowercase());
            in_separator = false;
        }
    }
    out
}

/// Parse `pip list --format=json` output.
pub fn parse_list_json(stdout: &str) -> Result<Vec<InstalledPackage>> {
    serde_json::from_str(stdout.trim()).context("Failed to parse `pip list --format=json` output")
}

pub struct Pip<'a, H: ProcessOps + ?Sized> {
    hal: &'a H,
    bin: String,
    timeout: Option<Duration>,
    dry_run: bool,
}

impl<'a, H: ProcessOps + ?Sized> Pip<'a, H> {
    /// `timeout` bounds each install or uninstall; `None` lets pip run until it
    /// finishes.
    pub fn new(
        hal: &'a H,
        bin: impl Into<String>,
        timeout: Option<Duration>,
        dry_run: bool,
    ) -> Self {
        Self {
            hal,
            bin: bin.into(),
            timeout,
            dry_run,
        }
    }

    /// Full command line as an operator would type it.
    pub fn command_line(&self, cmd: &PipCommand) -> String {
        format!("{} {}", self.bin, cmd)
    }

    /// Run `cmd`; any failure is returned.
    pub fn run(&self, cmd: &PipCommand) -> Result<()> {
        let line = self.command_line(cmd);
        if self.dry_run {
            log::info!("DRY RUN: {}", line);
            return Ok(());
        }
        log::info!("📦 {}", line);
        let args = cmd.args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.hal
            .command_status(&self.bin, &args, self.timeout)
            .with_context(|| format!("`{}` failed", line))
    }

    /// Run `cmd`, logging and swallowing a failure. Returns whether it succeeded.
    pub fn run_best_effort(&self, cmd: &PipCommand) -> bool {
        match self.run(cmd) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("⚠️  {:#} (ignored)", err);
                false
            }
        }
    }

    /// Installed distributions. Read-only, so it runs in dry-run mode too.
    pub fn list(&self) -> Result<Vec<InstalledPackage>> {
        let cmd = PipCommand::List;
        let args = cmd.args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self
            .hal
            .command_output(&self.bin, &args, LIST_TIMEOUT)
            .with_context(|| format!("`{}` failed", self.command_line(&cmd)))?;
        if !output.status.success() {
            anyhow::bail!(
                "`{}` exited with {}: {}",
                self.command_line(&cmd),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        parse_list_json(&String::from_utf8_lossy(&output.stdout))
    }
}
