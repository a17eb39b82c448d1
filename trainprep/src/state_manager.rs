use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use trainprep_workflow::{StateStore, WorkflowState};

type StageName = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunState {
    pub version: u32,
    pub dry_run: bool,
    pub current_stage: Option<StageName>,
    pub completed_stages: Vec<StageName>,
    /// Failures that were tolerated (uninstalling an absent package, formatting
    /// an already prepared disk, ...).
    #[serde(default)]
    pub suppressed_failures: Vec<String>,
}

impl RunState {
    pub fn new(dry_run: bool) -> Self {
        Self {
            version: 1,
            dry_run,
            current_stage: None,
            completed_stages: Vec::new(),
            suppressed_failures: Vec::new(),
        }
    }

    pub fn record_suppressed(&mut self, what: impl Into<String>) {
        self.suppressed_failures.push(what.into());
    }
}

impl WorkflowState for RunState {
    fn is_completed(&self, stage: &str) -> bool {
        self.completed_stages.iter().any(|s| s == stage)
    }

    fn set_current(&mut self, stage: &str) {
        self.current_stage = Some(stage.to_string());
    }

    fn mark_completed(&mut self, stage: &str) {
        if !self.is_completed(stage) {
            self.completed_stages.push(stage.to_string());
        }
        self.current_stage = None;
    }
}

/// Persists [`RunState`] as pretty JSON, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StateStore<RunState> for JsonStateStore {
    fn load(&self) -> Result<Option<RunState>> {
        load_state(&self.path)
    }

    fn save(&self, state: &RunState) -> Result<()> {
        save_state_atomic(&self.path, state)
    }
}

/// `None` when no run has recorded progress at `path` yet.
pub fn load_state(path: &Path) -> Result<Option<RunState>> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("reading {}", path.display())),
    };
    serde_json::from_slice(&raw)
        .map(Some)
        .with_context(|| format!("{} is not a trainprep state file", path.display()))
}

/// Write `state` next to `path` and rename it into place, so an interrupted
/// save leaves the previous state intact.
pub fn save_state_atomic(path: &Path, state: &RunState) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    let file = File::create(&staging).with_context(|| format!("creating {}", staging.display()))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, state).context("serializing run state")?;
    out.flush()?;
    out.get_ref()
        .sync_all()
        .with_context(|| format!("syncing {}", staging.display()))?;

    fs::rename(&staging, path)
        .with_context(|| format!("replacing {} with {}", path.display(), staging.display()))
}
