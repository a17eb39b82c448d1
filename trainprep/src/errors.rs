use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for trainprep operations
pub type Result<T> = anyhow::Result<T>;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("HOME is not set; cannot locate the shell startup file or constraints file")]
    HomeNotSet,

    #[error("Constraints file not found: {0}")]
    MissingConstraints(PathBuf),

    #[error("Missing --yes-i-know flag. Formatting the disk is destructive!")]
    MissingYesIKnow,

    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
