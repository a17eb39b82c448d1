//! Post-install check of the framework swap.

use super::Provisioner;
use crate::config::PackageConfig;
use crate::errors::ProvisionError;
use crate::pip::{normalize_name, InstalledPackage};
use crate::state_manager::RunState;
use anyhow::Result;
use trainprep_hal::SystemHal;

pub const NAME: &str = "04_verify";

/// The replacement framework must be present at exactly the pinned version and
/// the legacy framework must be gone.
pub fn check_installed(
    installed: &[InstalledPackage],
    packages: &PackageConfig,
) -> Result<(), ProvisionError> {
    let find = |name: &str| {
        let wanted = normalize_name(name);
        installed.iter().find(|pkg| normalize_name(&pkg.name) == wanted)
    };

    let mut problems = Vec::new();
    match find(&packages.framework) {
        Some(pkg) if pkg.version == packages.framework_version => {}
        Some(pkg) => problems.push(format!(
            "{} is {} (expected {})",
            packages.framework, pkg.version, packages.framework_version
        )),
        None => problems.push(format!("{} is not installed", packages.framework)),
    }
    if let Some(pkg) = find(&packages.legacy_framework) {
        problems.push(format!(
            "{} {} is still installed",
            packages.legacy_framework, pkg.version
        ));
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ProvisionError::VerificationFailed(problems.join("; ")))
    }
}

pub fn verify<H: SystemHal + ?Sized>(p: &Provisioner<'_, H>) -> Result<()> {
    let installed = p.pip(false).list()?;
    check_installed(&installed, &p.cfg.packages)?;
    log::info!(
        "✅ {} installed, {} absent",
        p.cfg.packages.framework_requirement(),
        p.cfg.packages.legacy_framework
    );
    Ok(())
}

pub fn run<H: SystemHal + ?Sized>(
    p: &Provisioner<'_, H>,
    _state: &mut RunState,
    dry_run: bool,
) -> Result<()> {
    if dry_run {
        log::info!("DRY RUN: skipping verification, nothing was installed");
        return Ok(());
    }
    verify(p)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(name: &str, version: &str) -> InstalledPackage {
        InstalledPackage {
            name: name.to_string(),
            version: version.to_string(),
        }
    }

    #[test]
    fn accepts_exact_pin_without_legacy() {
        let installed = vec![pkg("torch", "2.3.0"), pkg("lightning", "2.0.3")];
        check_installed(&installed, &PackageConfig::default()).unwrap();
    }

    #[test]
    fn rejects_other_version() {
        let installed = vec![pkg("lightning", "2.1.0")];
        let err = check_installed(&installed, &PackageConfig::default()).unwrap_err();
        assert!(err.to_string().contains("lightning is 2.1.0 (expected 2.0.3)"));
    }

    #[test]
    fn rejects_missing_framework() {
        let err = check_installed(&[], &PackageConfig::default()).unwrap_err();
        assert!(err.to_string().contains("lightning is not installed"));
    }

    #[test]
    fn rejects_leftover_legacy_package_under_any_spelling() {
        let installed = vec![pkg("lightning", "2.0.3"), pkg("PyTorch_Lightning", "1.9.5")];
        let err = check_installed(&installed, &PackageConfig::default()).unwrap_err();
        assert!(err
            .to_string()
            .contains("pytorch-lightning 1.9.5 is still installed"));
    }
}
