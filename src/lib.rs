#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod git;
pub mod net;
pub mod oplog;
pub mod pipeline;
pub mod scheduler;
pub mod telemetry;
#[cfg(test)]
pub(crate) mod testing;
pub mod version;

pub use error::{Error, SetupError};
pub type Result<T> = std::result::Result<T, Error>;

// Re-export core types at crate root for convenience
pub use crate::config::Config;
pub use crate::git::{ChangeSet, GitCli, GitOps};
pub use crate::pipeline::{CycleOutcome, Stage, Verification, run_pipeline};
pub use crate::scheduler::{Daemon, SchedulerState, poll_interval, run_cycle};
pub use crate::version::{Version, VersionStore};
