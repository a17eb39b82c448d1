//! Shell startup file edits.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Append `block` to the startup file at `path`, creating it if needed.
///
/// The file is only ever appended to. Without `dedupe` every call appends
/// another copy, so running provisioning twice leaves the block twice. With
/// `dedupe` an identical block already present is left alone.
///
/// Returns whether anything was written.
pub fn append_block(path: &Path, block: &str, dedupe: bool, dry_run: bool) -> Result<bool> {
    let existing = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    if dedupe && existing.contains(block) {
        log::info!(
            "🐚 {} already contains the disk bootstrap block, not appending",
            path.display()
        );
        return Ok(false);
    }

    if dry_run {
        log::info!("DRY RUN: append to {}:", path.display());
        for line in block.lines() {
            log::info!("DRY RUN:   {}", line);
        }
        return Ok(false);
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {} for appending", path.display()))?;

    // Keep the first appended command on its own line.
    if !existing.is_empty() && !existing.ends_with('\n') {
        file.write_all(b"\n")
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    file.write_all(block.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    log::info!(
        "🐚 Appended {} lines to {}",
        block.lines().count(),
        path.display()
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const BLOCK: &str = "echo one\necho two || true\n";

    #[test]
    fn creates_missing_file() {
        let dir = tempdir().unwrap();
        let rc = dir.path().join(".bashrc");

        assert!(append_block(&rc, BLOCK, false, false).unwrap());
        assert_eq!(fs::read_to_string(&rc).unwrap(), BLOCK);
    }

    #[test]
    fn preserves_existing_content() {
        let dir = tempdir().unwrap();
        let rc = dir.path().join(".bashrc");
        fs::write(&rc, "export PATH=$HOME/bin:$PATH\n").unwrap();

        append_block(&rc, BLOCK, false, false).unwrap();

        assert_eq!(
            fs::read_to_string(&rc).unwrap(),
            format!("export PATH=$HOME/bin:$PATH\n{BLOCK}")
        );
    }

    #[test]
    fn adds_separator_when_file_lacks_trailing_newline() {
        let dir = tempdir().unwrap();
        let rc = dir.path().join(".bashrc");
        fs::write(&rc, "alias ll='ls -l'").unwrap();

        append_block(&rc, BLOCK, false, false).unwrap();

        assert_eq!(
            fs::read_to_string(&rc).unwrap(),
            format!("alias ll='ls -l'\n{BLOCK}")
        );
    }

    #[test]
    fn appending_twice_duplicates_block() {
        let dir = tempdir().unwrap();
        let rc = dir.path().join(".bashrc");

        append_block(&rc, BLOCK, false, false).unwrap();
        append_block(&rc, BLOCK, false, false).unwrap();

        assert_eq!(fs::read_to_string(&rc).unwrap(), BLOCK.repeat(2));
    }

    #[test]
    fn dedupe_skips_identical_block() {
        let dir = tempdir().unwrap();
        let rc = dir.path().join(".bashrc");

        assert!(append_block(&rc, BLOCK, true, false).unwrap());
        assert!(!append_block(&rc, BLOCK, true, false).unwrap());

        assert_eq!(fs::read_to_string(&rc).unwrap(), BLOCK);
    }

    #[test]
    fn dry_run_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let rc = dir.path().join(".bashrc");

        assert!(!append_block(&rc, BLOCK, false, true).unwrap());
        assert!(!rc.exists());
    }
}
