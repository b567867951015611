//! Git invocation error types.

use thiserror::Error;

use crate::exec::ExecError;

/// Errors from invoking the external `git` tool.
///
/// A non-zero exit status is *not* represented here - callers inspect the
/// captured [`CmdOutput`](crate::exec::CmdOutput) and decide stage-level
/// failure semantics themselves.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GitError {
    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("git command failed: {context}: {message}")]
    Failed { context: &'static str, message: String },
}

impl GitError {
    pub fn failed(context: &'static str, message: impl Into<String>) -> Self {
        GitError::Failed {
            context,
            message: message.into(),
        }
    }
}
