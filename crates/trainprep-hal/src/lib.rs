//! Host abstraction layer for trainprep.
//!
//! Everything that touches the machine (spawning the package manager, formatting
//! and mounting the NVMe disk, creating the mount point) goes through the traits
//! in [`hal`] so provisioning stages can be exercised against [`FakeHal`] in CI.

pub mod error;
pub mod hal;
pub mod procfs;

pub use error::{HalError, HalResult};
pub use hal::{
    DirOps, FailPoint, FakeHal, FormatOps, FormatOptions, LinuxHal, MountOps, MountOptions,
    Operation, ProbeOps, ProcessOps, SystemHal,
};
