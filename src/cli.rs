//! CLI surface for gitpulse.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use clap::{ArgAction, Parser, Subcommand};

use crate::config;
use crate::error::SetupError;
use crate::pipeline::CycleOutcome;
use crate::scheduler::Daemon;
use crate::version::VersionStore;
use crate::Result;

#[derive(Parser, Debug)]
#[command(
    name = "gitpulse",
    version,
    about = "Polling daemon that auto-commits, versions, and pushes a git working tree",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Repository path (default: discover from cwd).
    #[arg(long, global = true, value_name = "PATH")]
    pub repo: Option<PathBuf>,

    /// Debug output (repeat for more).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the polling daemon until interrupted.
    Run,

    /// Run a single check cycle, then exit.
    Check,

    /// Print the persisted version counter.
    Version,
}

pub fn parse_from<I, T>(args: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::parse_from(args)
}

pub fn run(cli: Cli) -> Result<()> {
    let start = match cli.repo {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let repo_root = config::discover_repo_root(&start)
        .ok_or_else(|| SetupError::NotARepository(start.clone()))?;
    let cfg = config::load_for_repo(&repo_root)?;

    match cli.command {
        Commands::Run => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let _ = signal_hook::flag::register(signal_hook::consts::SIGTERM, shutdown.clone());
            let _ = signal_hook::flag::register(signal_hook::consts::SIGINT, shutdown.clone());

            let mut daemon = Daemon::bootstrap(cfg, &repo_root, shutdown)?;
            daemon.run()
        }
        Commands::Check => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let mut daemon = Daemon::bootstrap(cfg, &repo_root, shutdown)?;
            let report = daemon.run_once();

            if !report.connected {
                println!("check #{}: offline, pipeline skipped", report.check);
                return Ok(());
            }
            match report.outcome {
                Some(CycleOutcome::NoChanges) => {
                    println!("check #{}: no changes to commit", report.check);
                }
                Some(CycleOutcome::Success {
                    version,
                    commit_hash,
                    verification,
                }) => {
                    println!(
                        "check #{}: pushed version {version} (commit {commit_hash}, verification {})",
                        report.check,
                        verification.as_str()
                    );
                }
                Some(CycleOutcome::Failure { stage, message }) => {
                    println!("check #{}: failed at {stage}: {message}", report.check);
                }
                None => {}
            }
            Ok(())
        }
        Commands::Version => {
            let path = if cfg.version_file.is_absolute() {
                cfg.version_file.clone()
            } else {
                repo_root.join(&cfg.version_file)
            };
            println!("{}", VersionStore::new(path).load());
            Ok(())
        }
    }
}
