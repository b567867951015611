//! External git integration.
//!
//! Provides:
//! - `GitOps` seam + `GitCli` bounded runner over the `git` tool
//! - Working-tree change classification (`ChangeSet`)

pub mod changes;
pub mod cli;
pub mod error;

pub use changes::{ChangeSet, summarize};
pub use cli::{GitCli, GitOps, RepoInfo, expect_line};
pub use error::GitError;
