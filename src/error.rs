//! Crate-level errors.
//!
//! Only a narrow set of failures ever escapes to the caller: startup
//! environment problems and config parsing. Everything that happens
//! inside a cycle (probe failures, stage failures, verification
//! mismatches, log I/O trouble) is absorbed into outcomes, counters and
//! error records instead.

use thiserror::Error;

use crate::git::GitError;

/// Fatal environment problems detected before the loop starts.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SetupError {
    #[error("no git repository found at or above {0}")]
    NotARepository(std::path::PathBuf),

    #[error("git is not usable here: {0}")]
    GitUnavailable(String),
}

/// Crate-level convenience error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
