//! Directory creation and permission operations.

use crate::HalResult;
use std::path::Path;

pub trait DirOps {
    /// Create `path` and any missing parents (`mkdir -p`).
    fn create_dir_all(&self, path: &Path, dry_run: bool) -> HalResult<()>;

    /// Set the permission bits of `path` (`chmod <mode>`).
    fn set_mode(&self, path: &Path, mode: u32, dry_run: bool) -> HalResult<()>;
}
