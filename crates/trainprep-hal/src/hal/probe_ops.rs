//! Device probing operations (lsblk).

use crate::HalResult;
use std::path::Path;

/// Probing operations trait.
pub trait ProbeOps {
    /// Return the `lsblk -f` listing, for every device or only `disk`.
    fn lsblk_fs(&self, disk: Option<&Path>) -> HalResult<String>;
}
