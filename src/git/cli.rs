//! Bounded invocation of the external `git` tool.
//!
//! The daemon never parses structured git output beyond line-oriented
//! status codes and short hashes, so every operation is a thin wrapper
//! over one `git <args>` call through the shared bounded runner.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use super::error::GitError;
use crate::exec::{self, CmdOutput};

/// Seam over the external version-control tool.
///
/// Everything the pipeline and scheduler need is expressed through
/// [`GitOps::run`]; the named operations are convenience wrappers so call
/// sites read as intent rather than argument lists. Tests substitute a
/// scripted fake.
pub trait GitOps {
    /// Run `git` with the given arguments, bounded by the configured
    /// timeout. Non-zero exit is reported inside the `Ok` output.
    fn run(&self, args: &[&str]) -> Result<CmdOutput, GitError>;

    fn status_porcelain(&self) -> Result<CmdOutput, GitError> {
        self.run(&["status", "--porcelain"])
    }

    fn add_all(&self) -> Result<CmdOutput, GitError> {
        self.run(&["add", "."])
    }

    fn commit(&self, message: &str) -> Result<CmdOutput, GitError> {
        self.run(&["commit", "-m", message])
    }

    fn push(&self, remote: &str, branch: &str) -> Result<CmdOutput, GitError> {
        self.run(&["push", "-u", remote, branch])
    }

    fn rev_parse(&self, rev: &str) -> Result<CmdOutput, GitError> {
        self.run(&["rev-parse", rev])
    }

    fn rev_parse_short(&self, rev: &str) -> Result<CmdOutput, GitError> {
        self.run(&["rev-parse", "--short", rev])
    }

    fn ls_remote(&self, remote: &str, refspec: &str) -> Result<CmdOutput, GitError> {
        self.run(&["ls-remote", remote, refspec])
    }

    fn recent_log(&self, count: usize) -> Result<CmdOutput, GitError> {
        let count = format!("-{count}");
        self.run(&["log", "--oneline", &count])
    }

    fn config_get(&self, key: &str) -> Result<CmdOutput, GitError> {
        self.run(&["config", key])
    }

    fn current_branch(&self) -> Result<CmdOutput, GitError> {
        self.run(&["branch", "--show-current"])
    }
}

/// Real `git` runner rooted at a working tree.
pub struct GitCli {
    workdir: PathBuf,
    timeout: Duration,
}

impl GitCli {
    pub fn new(workdir: impl Into<PathBuf>, timeout: Duration) -> Self {
        GitCli {
            workdir: workdir.into(),
            timeout,
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }
}

impl GitOps for GitCli {
    fn run(&self, args: &[&str]) -> Result<CmdOutput, GitError> {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(&self.workdir);
        let out = exec::run_with_timeout(cmd, self.timeout)?;
        tracing::trace!(args = ?args, code = out.code, "git");
        Ok(out)
    }
}

/// Trimmed stdout of a command, or an error when it exited non-zero.
pub fn expect_line(
    result: Result<CmdOutput, GitError>,
    context: &'static str,
) -> Result<String, GitError> {
    let out = result?;
    if !out.success() {
        return Err(GitError::failed(context, out.error_text()));
    }
    Ok(out.stdout.trim().to_string())
}

/// Repository facts gathered for the operation-log summary section.
///
/// Every field degrades to a placeholder rather than failing: this data
/// is informational and must not abort a cycle.
#[derive(Debug, Clone)]
pub struct RepoInfo {
    pub branch: String,
    pub user: String,
    pub recent_commits: String,
}

impl RepoInfo {
    pub fn gather<G: GitOps + ?Sized>(git: &G) -> RepoInfo {
        let branch = expect_line(git.current_branch(), "current branch")
            .unwrap_or_else(|_| "unknown".to_string());

        let user = match (
            expect_line(git.config_get("user.name"), "user.name"),
            expect_line(git.config_get("user.email"), "user.email"),
        ) {
            (Ok(name), Ok(email)) => format!("{name} <{email}>"),
            _ => "not configured".to_string(),
        };

        let recent_commits = match git.recent_log(5) {
            Ok(out) if out.success() && !out.stdout.trim().is_empty() => {
                out.stdout.trim().to_string()
            }
            Ok(_) => "no commits yet".to_string(),
            Err(_) => "could not retrieve commits".to_string(),
        };

        RepoInfo {
            branch,
            user,
            recent_commits,
        }
    }
}
