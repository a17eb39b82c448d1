use env_logger::Target;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Initialise `env_logger` at `info` (or `RUST_LOG`). When `log_file` is given
/// and can be opened for appending, logs go there; otherwise stderr.
pub fn init_with(log_file: Option<PathBuf>) {
    let target = log_file
        .as_deref()
        .and_then(|path| match open_log_file(path) {
            Ok(target) => Some(target),
            Err(err) => {
                eprintln!(
                    "trainprep: cannot open log file {} ({}), logging to stderr",
                    path.display(),
                    err
                );
                None
            }
        })
        .unwrap_or(Target::Stderr);

    let mut builder = env_logger::Builder::new();
    builder.filter_level(log::LevelFilter::Info);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.target(target);
    // A second init (tests, embedding) keeps the first logger.
    let _ = builder.try_init();
}

fn open_log_file(path: &Path) -> io::Result<Target> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    Ok(Target::Pipe(Box::new(file)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_log_file_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("trainprep.log");
        open_log_file(&path).unwrap();
        assert!(path.exists());
    }
}
