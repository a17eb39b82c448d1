//! HAL trait definitions and implementations.
//!
//! This module defines the traits provisioning needs from the host and provides
//! both a real ([`LinuxHal`]) and a recording ([`FakeHal`]) implementation.

pub mod dir_ops;
pub mod fake_hal;
pub mod format_ops;
pub mod linux_hal;
pub mod mount_ops;
pub mod probe_ops;
pub mod process_ops;

pub use dir_ops::DirOps;
pub use fake_hal::{FailPoint, FakeHal, Operation};
pub use format_ops::{FormatOps, FormatOptions};
pub use linux_hal::LinuxHal;
pub use mount_ops::{MountOps, MountOptions};
pub use probe_ops::ProbeOps;
pub use process_ops::ProcessOps;

/// Complete HAL combining all host operation traits.
pub trait SystemHal: ProcessOps + FormatOps + MountOps + DirOps + ProbeOps + Send + Sync {}

/// Automatically implement SystemHal for any type implementing all required traits.
impl<T> SystemHal for T where
    T: ProcessOps + FormatOps + MountOps + DirOps + ProbeOps + Send + Sync
{
}
