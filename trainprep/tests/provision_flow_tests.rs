mod common;

use clap::Parser;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use trainprep::cli::Cli;
use trainprep::config::{ProvisionConfig, PIP_BIN_ENV};
use trainprep::errors::ProvisionError;
use trainprep::execute;
use trainprep_hal::{FailPoint, FakeHal, Operation};

const RC_BLOCK: &str = "\
sudo lsblk -f
sudo mkfs -t ext4 -F /dev/nvme1n1 || true
sudo mkdir -p /mnt/local_storage
sudo chmod 0777 /mnt/local_storage
sudo mount /dev/nvme1n1 /mnt/local_storage || true
";

const INSTALLED_OK: &str = r#"[
  {"name": "torch", "version": "2.3.0+cu118"},
  {"name": "lightning", "version": "2.0.3"},
  {"name": "myst-nb", "version": "1.0.0"}
]"#;

fn home_with_constraints() -> TempDir {
    let home = TempDir::new().expect("temp home");
    fs::write(
        home.path().join("requirements_compiled.txt"),
        "myst-parser==1.0.0\nmyst-nb==1.0.0\n",
    )
    .expect("write constraints");
    home
}

fn fake_hal() -> FakeHal {
    let hal = FakeHal::new();
    hal.set_stdout("pip3", INSTALLED_OK);
    hal
}

fn cli(args: &[&str]) -> Cli {
    let mut argv = vec!["trainprep"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).expect("parse cli")
}

fn run(args: &[&str], home: &Path, hal: &FakeHal) -> anyhow::Result<()> {
    let cli = cli(args);
    let mut cfg = ProvisionConfig::default();
    cli.apply_overrides(&mut cfg);
    execute(&cli, &cfg, home, hal)
}

fn bashrc(home: &Path) -> String {
    fs::read_to_string(home.join(".bashrc")).unwrap_or_default()
}

#[test]
fn full_run_executes_commands_in_order() {
    let _lock = common::env_lock();
    std::env::remove_var(PIP_BIN_ENV);
    let home = home_with_constraints();
    let hal = fake_hal();

    run(&[], home.path(), &hal).expect("provisioning should succeed");

    let constraints = home.path().join("requirements_compiled.txt");
    assert_eq!(
        hal.command_lines(),
        vec![
            format!(
                "pip3 install -c {} myst-parser myst-nb",
                constraints.display()
            ),
            "pip3 uninstall -y pytorch-lightning".to_string(),
            "pip3 install torch torchvision torchaudio --index-url https://download.pytorch.org/whl/cu118"
                .to_string(),
            "pip3 install lightning==2.0.3".to_string(),
            "pip3 list --format=json".to_string(),
        ]
    );
    assert_eq!(bashrc(home.path()), RC_BLOCK);
}

#[test]
fn default_run_never_time_limits_pip_installs() {
    let _lock = common::env_lock();
    std::env::remove_var(PIP_BIN_ENV);
    let home = home_with_constraints();
    let hal = fake_hal();

    run(&[], home.path(), &hal).unwrap();

    let install_limits: Vec<Option<u64>> = hal
        .operations()
        .into_iter()
        .filter_map(|op| match op {
            Operation::Command {
                args, timeout_secs, ..
            } if args[0] != "list" => Some(timeout_secs),
            _ => None,
        })
        .collect();
    assert_eq!(install_limits, vec![None; 4]);
}

#[test]
fn deferred_run_never_touches_the_disk() {
    let _lock = common::env_lock();
    std::env::remove_var(PIP_BIN_ENV);
    let home = home_with_constraints();
    let hal = fake_hal();

    run(&[], home.path(), &hal).unwrap();

    assert!(!hal.has_operation(|op| !matches!(op, Operation::Command { .. })));
}

#[test]
fn running_twice_succeeds_and_duplicates_block() {
    let _lock = common::env_lock();
    std::env::remove_var(PIP_BIN_ENV);
    let home = home_with_constraints();
    let hal = fake_hal();

    run(&[], home.path(), &hal).expect("first run");
    run(&[], home.path(), &hal).expect("second run");

    assert_eq!(bashrc(home.path()), RC_BLOCK.repeat(2));
}

#[test]
fn dedupe_rc_keeps_a_single_block() {
    let _lock = common::env_lock();
    std::env::remove_var(PIP_BIN_ENV);
    let home = home_with_constraints();
    let hal = fake_hal();

    run(&["run", "--dedupe-rc"], home.path(), &hal).unwrap();
    run(&["run", "--dedupe-rc"], home.path(), &hal).unwrap();

    assert_eq!(bashrc(home.path()), RC_BLOCK);
}

#[test]
fn existing_bashrc_is_appended_not_overwritten() {
    let _lock = common::env_lock();
    std::env::remove_var(PIP_BIN_ENV);
    let home = home_with_constraints();
    fs::write(home.path().join(".bashrc"), "export EDITOR=vim\n").unwrap();
    let hal = fake_hal();

    run(&[], home.path(), &hal).unwrap();

    assert_eq!(
        bashrc(home.path()),
        format!("export EDITOR=vim\n{RC_BLOCK}")
    );
}

#[test]
fn missing_constraints_stops_before_any_install() {
    let _lock = common::env_lock();
    std::env::remove_var(PIP_BIN_ENV);
    let home = TempDir::new().unwrap();
    let hal = fake_hal();

    let err = run(&[], home.path(), &hal).expect_err("must fail");

    assert!(matches!(
        err.downcast_ref::<ProvisionError>(),
        Some(ProvisionError::MissingConstraints(_))
    ));
    assert_eq!(hal.operation_count(), 0, "no pip invocation expected");
    // The disk block precedes the package stages and is already written.
    assert_eq!(bashrc(home.path()), RC_BLOCK);
}

#[test]
fn legacy_uninstall_failure_is_tolerated() {
    let _lock = common::env_lock();
    std::env::remove_var(PIP_BIN_ENV);
    let home = home_with_constraints();
    let hal = fake_hal();
    hal.fail_command("pip3", &["uninstall"]);

    run(&[], home.path(), &hal).expect("absent legacy package is not fatal");

    assert!(hal
        .command_lines()
        .contains(&"pip3 install lightning==2.0.3".to_string()));
}

#[test]
fn tensor_stack_failure_aborts_before_framework_install() {
    let _lock = common::env_lock();
    std::env::remove_var(PIP_BIN_ENV);
    let home = home_with_constraints();
    let hal = fake_hal();
    hal.fail_command("pip3", &["install", "torch"]);

    let err = run(&[], home.path(), &hal).expect_err("must fail");

    assert!(format!("{err:#}").contains("stage '03_training_framework' failed"));
    let lines = hal.command_lines();
    assert!(!lines.iter().any(|l| l.contains("lightning==2.0.3")));
    assert!(!lines.iter().any(|l| l.contains("list")));
}

#[test]
fn docs_install_failure_is_fatal() {
    let _lock = common::env_lock();
    std::env::remove_var(PIP_BIN_ENV);
    let home = home_with_constraints();
    let hal = fake_hal();
    hal.fail_command("pip3", &["install", "-c"]);

    assert!(run(&[], home.path(), &hal).is_err());
    assert_eq!(hal.command_lines().len(), 1);
}

#[test]
fn wrong_framework_version_fails_verification() {
    let _lock = common::env_lock();
    std::env::remove_var(PIP_BIN_ENV);
    let home = home_with_constraints();
    let hal = FakeHal::new();
    hal.set_stdout(
        "pip3",
        r#"[{"name": "lightning", "version": "2.1.0"}, {"name": "pytorch-lightning", "version": "1.9.5"}]"#,
    );

    let err = run(&[], home.path(), &hal).expect_err("verification must fail");

    let msg = format!("{err:#}");
    assert!(msg.contains("lightning is 2.1.0 (expected 2.0.3)"));
    assert!(msg.contains("pytorch-lightning 1.9.5 is still installed"));
}

#[test]
fn skip_verify_does_not_list_packages() {
    let _lock = common::env_lock();
    std::env::remove_var(PIP_BIN_ENV);
    let home = home_with_constraints();
    let hal = FakeHal::new();

    run(&["run", "--skip-verify"], home.path(), &hal).unwrap();

    assert_eq!(hal.command_lines().len(), 4);
}

#[test]
fn dry_run_changes_nothing() {
    let _lock = common::env_lock();
    std::env::remove_var(PIP_BIN_ENV);
    let home = home_with_constraints();
    let hal = fake_hal();

    run(&["--dry-run"], home.path(), &hal).unwrap();

    assert_eq!(hal.operation_count(), 0);
    assert!(!home.path().join(".bashrc").exists());
}

#[test]
fn state_file_resumes_after_failure() {
    let _lock = common::env_lock();
    std::env::remove_var(PIP_BIN_ENV);
    let home = home_with_constraints();
    let state = home.path().join("state").join("trainprep.json");
    let state_arg = state.display().to_string();

    let failing = fake_hal();
    failing.fail_command("pip3", &["install", "torch"]);
    assert!(run(&["--state", &state_arg], home.path(), &failing).is_err());

    let hal = fake_hal();
    run(&["--state", &state_arg], home.path(), &hal).unwrap();

    // Disk block and docs tooling were done by the first attempt.
    assert_eq!(bashrc(home.path()), RC_BLOCK);
    assert!(!hal.command_lines().iter().any(|l| l.contains("myst-parser")));
    assert!(hal
        .command_lines()
        .contains(&"pip3 install lightning==2.0.3".to_string()));

    let saved = trainprep::state_manager::load_state(&state).unwrap().unwrap();
    assert_eq!(
        saved.completed_stages,
        vec![
            "01_disk_bootstrap",
            "02_docs_tooling",
            "03_training_framework",
            "04_verify"
        ]
    );
}

#[test]
fn disk_bootstrap_deferred_only_writes_bashrc() {
    let _lock = common::env_lock();
    std::env::remove_var(PIP_BIN_ENV);
    let home = TempDir::new().unwrap();
    let hal = fake_hal();

    run(&["disk-bootstrap"], home.path(), &hal).unwrap();

    assert_eq!(bashrc(home.path()), RC_BLOCK);
    assert_eq!(hal.operation_count(), 0);
}

#[test]
fn disk_bootstrap_now_requires_confirmation() {
    let home = TempDir::new().unwrap();
    let hal = fake_hal();

    let err = run(&["disk-bootstrap", "--now"], home.path(), &hal).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ProvisionError>(),
        Some(ProvisionError::MissingYesIKnow)
    ));
    assert_eq!(hal.operation_count(), 0);
}

#[test]
fn disk_bootstrap_now_tolerates_missing_device() {
    let home = TempDir::new().unwrap();
    let hal = fake_hal();
    hal.fail_on(FailPoint::Format);

    run(
        &[
            "disk-bootstrap",
            "--now",
            "--yes-i-know",
            "--device",
            "/dev/nvme9n9",
        ],
        home.path(),
        &hal,
    )
    .expect("format failure is suppressed");

    assert!(hal.has_operation(|op| matches!(op, Operation::Mount { .. })));
    assert!(!home.path().join(".bashrc").exists());
}

#[test]
fn disk_bootstrap_now_aborts_when_mount_point_cannot_be_created() {
    let home = TempDir::new().unwrap();
    let hal = fake_hal();
    hal.fail_on(FailPoint::CreateDir);

    let err = run(
        &["disk-bootstrap", "--now", "--yes-i-know"],
        home.path(),
        &hal,
    )
    .unwrap_err();

    assert!(format!("{err:#}").contains("Permission denied"));
    assert!(!hal.has_operation(|op| matches!(op, Operation::Mount { .. })));
}

#[test]
fn verify_subcommand_checks_installed_set() {
    let _lock = common::env_lock();
    std::env::remove_var(PIP_BIN_ENV);
    let home = TempDir::new().unwrap();
    let hal = fake_hal();

    run(&["verify"], home.path(), &hal).unwrap();

    assert_eq!(hal.command_lines(), vec!["pip3 list --format=json"]);
}
