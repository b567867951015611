//! Cycle scheduling and the daemon loop.
//!
//! One cycle is probe → (pipeline) → log → sleep. All counters live in
//! an explicit [`SchedulerState`] passed into and returned from
//! [`run_cycle`], so a single cycle is deterministic and unit-testable
//! with injected connectivity and git fakes; the side-effecting loop
//! driver ([`Daemon`]) stays thin.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::SetupError;
use crate::git::{GitCli, GitOps, expect_line, summarize};
use crate::net::{Connectivity, ProbeSet};
use crate::oplog::{ErrorFiles, OperationLog};
use crate::pipeline::{CycleOutcome, Stage, run_pipeline};
use crate::version::VersionStore;
use crate::Result;

/// Fallback branch when neither config nor detection yields one.
const DEFAULT_BRANCH: &str = "main";

/// Granularity of the interruptible inter-cycle wait.
const WAIT_SLICE: Duration = Duration::from_millis(500);

/// Counters threaded through cycles. No ambient globals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerState {
    /// Monotonic check counter; determines the polling phase.
    pub check_count: u64,
    /// Consecutive failed cycles; resets on success or at the ceiling.
    pub failed_operations: u32,
    /// Previous cycle's work was not confirmed complete.
    pub pending_operations: bool,
    /// Connectivity observed on the previous cycle.
    pub last_online: bool,
}

/// Polling cadence phase, a step function of call count.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PollPhase {
    Initial,
    Steady,
}

impl PollPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            PollPhase::Initial => "initial",
            PollPhase::Steady => "steady",
        }
    }
}

pub fn poll_phase(cfg: &Config, check_count: u64) -> PollPhase {
    if check_count <= cfg.initial_checks {
        PollPhase::Initial
    } else {
        PollPhase::Steady
    }
}

/// Interval before the next check. Two-phase step function of the call
/// count, not of wall-clock elapsed time.
pub fn poll_interval(cfg: &Config, check_count: u64) -> Duration {
    match poll_phase(cfg, check_count) {
        PollPhase::Initial => cfg.initial_interval(),
        PollPhase::Steady => cfg.normal_interval(),
    }
}

/// Everything one cycle produced, for logging and tests.
#[derive(Debug)]
pub struct CycleReport {
    pub check: u64,
    pub phase: PollPhase,
    pub connected: bool,
    /// `None` when offline (the pipeline never ran).
    pub outcome: Option<CycleOutcome>,
    pub transcript: Vec<String>,
    /// Retry ceiling reached this cycle; operations were suspended.
    pub suspended: bool,
}

/// Fold a pipeline outcome into the retry counters.
///
/// Returns true when the retry ceiling was reached and operations were
/// suspended for this round.
pub fn apply_outcome(state: &mut SchedulerState, outcome: &CycleOutcome, max_retries: u32) -> bool {
    if outcome.is_failure() {
        state.failed_operations += 1;
        if state.failed_operations >= max_retries {
            // Give up this round rather than retrying without bound.
            state.failed_operations = 0;
            state.pending_operations = false;
            return true;
        }
        state.pending_operations = true;
        return false;
    }
    state.failed_operations = 0;
    state.pending_operations = false;
    false
}

/// Run exactly one cycle: probe, and when online, the full pipeline.
pub fn run_cycle<C, G>(
    mut state: SchedulerState,
    cfg: &Config,
    probe: &C,
    git: &G,
    store: &VersionStore,
    branch: &str,
    excludes: &[String],
) -> (SchedulerState, CycleReport)
where
    C: Connectivity + ?Sized,
    G: GitOps + ?Sized,
{
    state.check_count += 1;
    let check = state.check_count;
    let phase = poll_phase(cfg, check);

    let connected = probe.is_reachable();
    if !connected {
        // Raise pending only on the online → offline transition.
        if state.last_online {
            tracing::warn!(check, "connectivity lost, suspending operations");
            state.pending_operations = true;
        }
        state.last_online = false;
        return (
            state,
            CycleReport {
                check,
                phase,
                connected: false,
                outcome: None,
                transcript: Vec::new(),
                suspended: false,
            },
        );
    }

    if !state.last_online && state.pending_operations {
        tracing::info!(check, "connectivity restored, executing pending operations");
    }
    state.last_online = true;

    let run = match summarize(git) {
        Ok(mut changes) => {
            // The daemon's own artifacts must never trigger a commit
            // cycle of their own, or every success would seed the next.
            changes.exclude(excludes);
            run_pipeline(git, store, branch, &changes)
        }
        Err(e) => {
            // Status inspection failing means we cannot even stage; count
            // it against the same retry budget as an add failure.
            let message = format!("status inspection failed: {e}");
            crate::pipeline::PipelineRun {
                outcome: CycleOutcome::Failure {
                    stage: Stage::Add,
                    message: message.clone(),
                },
                transcript: vec![message],
            }
        }
    };

    let suspended = apply_outcome(&mut state, &run.outcome, cfg.max_retries);
    if suspended {
        tracing::warn!(
            check,
            max_retries = cfg.max_retries,
            "maximum retries reached, suspending operations"
        );
    }

    (
        state,
        CycleReport {
            check,
            phase,
            connected: true,
            outcome: Some(run.outcome),
            transcript: run.transcript,
            suspended,
        },
    )
}

// =============================================================================
// Loop driver
// =============================================================================

/// The assembled daemon: real probes, real git, real log.
pub struct Daemon {
    cfg: Config,
    branch: String,
    git: GitCli,
    probe: ProbeSet,
    oplog: OperationLog,
    errors: ErrorFiles,
    store: VersionStore,
    /// Repo-relative paths of our own artifacts, excluded from change
    /// detection.
    excludes: Vec<String>,
    shutdown: Arc<AtomicBool>,
    state: SchedulerState,
}

impl Daemon {
    /// Validate the environment and wire up collaborators.
    ///
    /// Fatal here, before the loop: git not invocable. Branch detection
    /// falls back to config, then to `main`.
    pub fn bootstrap(
        cfg: Config,
        repo_root: &Path,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Daemon> {
        let git = GitCli::new(repo_root, cfg.git_timeout());

        expect_line(git.rev_parse("--git-dir"), "repository check")
            .map_err(|e| SetupError::GitUnavailable(e.to_string()))?;

        let branch = match cfg.branch.clone() {
            Some(branch) => branch,
            None => match expect_line(git.current_branch(), "branch detection") {
                Ok(branch) if !branch.is_empty() => branch,
                _ => {
                    tracing::warn!("could not detect current branch, using {DEFAULT_BRANCH}");
                    DEFAULT_BRANCH.to_string()
                }
            },
        };

        let probe = ProbeSet::host_default(cfg.probe_timeout());
        let oplog = OperationLog::new(
            anchor(repo_root, &cfg.log_file),
            cfg.max_log_lines,
            cfg.log_rotation_keep,
        );
        let errors = ErrorFiles::new(anchor(repo_root, &cfg.error_dir));
        let store = VersionStore::new(anchor(repo_root, &cfg.version_file));
        let excludes = [&cfg.log_file, &cfg.version_file, &cfg.error_dir]
            .into_iter()
            .filter(|p| p.is_relative())
            .map(|p| p.to_string_lossy().into_owned())
            .collect();

        Ok(Daemon {
            cfg,
            branch,
            git,
            probe,
            oplog,
            errors,
            store,
            excludes,
            shutdown,
            state: SchedulerState::default(),
        })
    }

    /// Replace the connectivity probe set (used to pin connectivity in
    /// tests and air-gapped setups).
    pub fn with_probe(mut self, probe: ProbeSet) -> Self {
        self.probe = probe;
        self
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn current_version(&self) -> crate::version::Version {
        self.store.load()
    }

    /// Run a single cycle and log it. Used by the `check` subcommand.
    pub fn run_once(&mut self) -> CycleReport {
        let state = std::mem::take(&mut self.state);
        let (state, report) = run_cycle(
            state,
            &self.cfg,
            &self.probe,
            &self.git,
            &self.store,
            &self.branch,
            &self.excludes,
        );
        self.state = state;
        self.log_cycle(&report);
        report
    }

    /// Drive the unbounded loop until shutdown.
    pub fn run(&mut self) -> Result<()> {
        let version = self.store.load();
        tracing::info!(
            %version,
            branch = %self.branch,
            initial_checks = self.cfg.initial_checks,
            "starting polling loop"
        );
        self.append_or_record(&format!(
            "GITPULSE STARTED - Version {version}\nBranch: {}\nInitial checks: {} (every {}s), then every {}s\nMax retries: {}\nLog file: {}",
            self.branch,
            self.cfg.initial_checks,
            self.cfg.initial_interval_secs,
            self.cfg.normal_interval_secs,
            self.cfg.max_retries,
            self.oplog.path().display(),
        ));

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            let report = self.run_once();
            let interval = poll_interval(&self.cfg, report.check);

            if report.check % 10 == 0 {
                match self.oplog.line_count() {
                    Ok(lines) => tracing::info!(
                        lines,
                        max = self.cfg.max_log_lines,
                        "operation log status"
                    ),
                    Err(e) => tracing::warn!(error = %e, "could not stat operation log"),
                }
            }

            tracing::debug!(
                check = report.check,
                phase = report.phase.as_str(),
                connected = report.connected,
                pending = self.state.pending_operations,
                failed = self.state.failed_operations,
                next_in_secs = interval.as_secs(),
                "cycle complete"
            );

            if !self.wait(interval) {
                break;
            }
        }

        let version = self.store.load();
        tracing::info!(total_checks = self.state.check_count, %version, "shutting down");
        self.append_or_record(&format!(
            "GITPULSE STOPPED\nTotal checks performed: {}\nFinal version: {version}\nFinal connectivity: {}\nPending operations: {}",
            self.state.check_count,
            if self.state.last_online { "online" } else { "offline" },
            yes_no(self.state.pending_operations),
        ));
        Ok(())
    }

    /// Render a cycle into the operation log.
    ///
    /// A single unexpected I/O failure here must not take the daemon
    /// down: it is written to an error record instead, and the loop
    /// continues.
    fn log_cycle(&self, report: &CycleReport) {
        if !report.connected {
            let entry = format!(
                "CHECK #{} - NO INTERNET\nStatus: internet disconnected\nPending operations: {}\nNext check in: {}s",
                report.check,
                yes_no(self.state.pending_operations),
                poll_interval(&self.cfg, report.check).as_secs(),
            );
            if let Err(e) = self.oplog.append_brief(&entry) {
                self.record_unexpected(&format!("failed to write operation log: {e}"));
            }
            return;
        }

        let outcome_line = match &report.outcome {
            Some(CycleOutcome::NoChanges) => "no changes to commit".to_string(),
            Some(CycleOutcome::Success {
                version,
                commit_hash,
                verification,
            }) => format!(
                "success (version {version}, commit {commit_hash}, verification {})",
                verification.as_str()
            ),
            Some(CycleOutcome::Failure { stage, message }) => {
                format!("failed at {stage}: {message}")
            }
            None => "skipped".to_string(),
        };

        let mut entry = format!(
            "CHECK #{}\nPhase: {}\nConnectivity: online\nOutcome: {}\nFailed attempts: {}\nPending operations: {}",
            report.check,
            report.phase.as_str(),
            outcome_line,
            self.state.failed_operations,
            yes_no(self.state.pending_operations),
        );
        if report.suspended {
            entry.push_str("\nRetry ceiling reached: operations suspended this round");
        }
        if !report.transcript.is_empty() {
            entry.push_str("\n\n");
            entry.push_str(&report.transcript.join("\n"));
        }

        if let Err(e) = self.oplog.append(&entry) {
            self.record_unexpected(&format!("failed to write operation log: {e}"));
        }

        if let Some(CycleOutcome::Failure { stage, message }) = &report.outcome {
            match self
                .errors
                .record(&format!("{stage} failed: {message}"), &self.cfg.snapshot())
            {
                Ok(record) => {
                    let _ = self.oplog.append_brief(&format!(
                        "ERROR: {stage} failed\nDetails saved to: {}",
                        record.display()
                    ));
                }
                Err(e) => tracing::error!(error = %e, "failed to write error record"),
            }
        }
    }

    fn append_or_record(&self, message: &str) {
        if let Err(e) = self.oplog.append(message) {
            self.record_unexpected(&format!("failed to write operation log: {e}"));
        }
    }

    fn record_unexpected(&self, message: &str) {
        tracing::error!("{message}");
        if let Err(e) = self.errors.record(message, &self.cfg.snapshot()) {
            tracing::error!(error = %e, "failed to write error record");
        }
    }

    /// Sleep in bounded slices, returning false when interrupted.
    fn wait(&self, interval: Duration) -> bool {
        let deadline = Instant::now() + interval;
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(WAIT_SLICE));
        }
    }
}

fn anchor(repo_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        repo_root.join(path)
    }
}

fn yes_no(v: bool) -> &'static str {
    if v { "yes" } else { "no" }
}
