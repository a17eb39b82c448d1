//! Process execution helpers.
//!
//! External commands are "world-touching" and must go through the HAL so the
//! provisioning sequence can be tested without spawning pip or mkfs.

use crate::HalResult;
use std::process::Output;
use std::time::Duration;

/// Process execution trait (external command runner).
pub trait ProcessOps {
    /// Run a command and capture stdout/stderr. A non-zero exit is *not* an
    /// error here; callers inspect `Output::status`.
    fn command_output(&self, program: &str, args: &[&str], timeout: Duration)
        -> HalResult<Output>;

    /// Run a command with inherited stdio. A non-zero exit maps to
    /// [`crate::HalError::CommandFailed`]. With `timeout` unset the command
    /// may run for as long as it needs.
    fn command_status(
        &self,
        program: &str,
        args: &[&str],
        timeout: Option<Duration>,
    ) -> HalResult<()>;
}
