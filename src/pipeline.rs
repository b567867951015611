//! Commit/push typestate machine.
//!
//! One connected cycle drives the pipeline once:
//! - Start → Staged → Committed → Pushed → verified outcome
//! - Each transition consumes `self`, returns the next phase
//! - Can't skip steps - enforced at compile time
//!
//! Key design:
//! - Empty change set short-circuits to `NoChanges` before any git call
//! - The version counter advances in memory before the commit but is
//!   persisted only after the commit succeeds, so a rejected commit
//!   never burns a version number
//! - A failed push leaves the version advanced: the commit exists
//!   locally and the scheduler retries the push on a later cycle
//! - Verification distinguishes `Verified`, `Mismatched` and `Unknown`
//!   instead of collapsing "could not read remote" into success

use std::fmt;

use crate::git::{ChangeSet, GitOps, RepoInfo, expect_line};
use crate::oplog;
use crate::version::{Version, VersionStore};

/// Pipeline step that can fail a cycle.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Stage {
    Add,
    Commit,
    Push,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Add => "add",
            Stage::Commit => "commit",
            Stage::Push => "push",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What comparing local HEAD against the remote tip established.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Verification {
    /// Local and remote tips match.
    Verified,
    /// Remote readable but pointing elsewhere. Warning, not failure -
    /// the push itself already reported success.
    Mismatched,
    /// Remote absent or unreadable; success cannot be disproved.
    Unknown,
}

impl Verification {
    pub fn as_str(self) -> &'static str {
        match self {
            Verification::Verified => "verified",
            Verification::Mismatched => "mismatched",
            Verification::Unknown => "unknown",
        }
    }
}

/// Result of one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Working tree clean; nothing ran.
    NoChanges,
    Success {
        version: Version,
        commit_hash: String,
        verification: Verification,
    },
    Failure {
        stage: Stage,
        message: String,
    },
}

impl CycleOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CycleOutcome::Failure { .. })
    }
}

/// A stage-level failure carrying the external tool's error text.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub message: String,
}

impl StageFailure {
    fn new(stage: Stage, message: impl Into<String>) -> Self {
        StageFailure {
            stage,
            message: message.into(),
        }
    }
}

impl From<StageFailure> for CycleOutcome {
    fn from(f: StageFailure) -> Self {
        CycleOutcome::Failure {
            stage: f.stage,
            message: f.message,
        }
    }
}

// =============================================================================
// Phase markers
// =============================================================================

/// Initial phase - changes known, nothing executed.
pub struct Start;

/// Working tree staged.
pub struct Staged;

/// Commit created and version persisted.
pub struct Committed {
    pub version: Version,
    pub commit_hash: String,
}

/// Commit pushed to the remote branch.
pub struct Pushed {
    pub version: Version,
    pub commit_hash: String,
}

/// One commit/push cycle with typestate-enforced phases.
pub struct PushCycle<'a, G: GitOps + ?Sized, Phase> {
    git: &'a G,
    phase: Phase,
}

impl<'a, G: GitOps + ?Sized> PushCycle<'a, G, Start> {
    pub fn new(git: &'a G) -> Self {
        PushCycle { git, phase: Start }
    }

    /// Stage everything, transition to Staged.
    pub fn stage(self) -> Result<PushCycle<'a, G, Staged>, StageFailure> {
        let out = self
            .git
            .add_all()
            .map_err(|e| StageFailure::new(Stage::Add, e.to_string()))?;
        if !out.success() {
            return Err(StageFailure::new(Stage::Add, out.error_text()));
        }
        Ok(PushCycle {
            git: self.git,
            phase: Staged,
        })
    }
}

impl<'a, G: GitOps + ?Sized> PushCycle<'a, G, Staged> {
    /// Commit with a versioned message, transition to Committed.
    ///
    /// The incremented version is persisted only after git reports the
    /// commit succeeded.
    pub fn commit(
        self,
        store: &VersionStore,
        digest: &str,
    ) -> Result<PushCycle<'a, G, Committed>, StageFailure> {
        let next = store.load().increment();
        let message = format!("Version {next} - {}\n{digest}", oplog::commit_stamp(oplog::now()));

        let out = self
            .git
            .commit(&message)
            .map_err(|e| StageFailure::new(Stage::Commit, e.to_string()))?;
        if !out.success() {
            // Version deliberately not persisted: no commit exists to
            // carry this number.
            return Err(StageFailure::new(Stage::Commit, out.error_text()));
        }

        if let Err(e) = store.save(next) {
            tracing::warn!(error = %e, "commit succeeded but version save failed");
        }

        let commit_hash = expect_line(self.git.rev_parse_short("HEAD"), "short hash")
            .unwrap_or_else(|_| "unknown".to_string());

        tracing::info!(version = %next, commit = %commit_hash, "committed");
        Ok(PushCycle {
            git: self.git,
            phase: Committed {
                version: next,
                commit_hash,
            },
        })
    }
}

impl<'a, G: GitOps + ?Sized> PushCycle<'a, G, Committed> {
    /// Push the branch, transition to Pushed.
    ///
    /// On failure the version stays advanced - the local commit is real
    /// and a later cycle re-attempts the push.
    pub fn push(self, branch: &str) -> Result<PushCycle<'a, G, Pushed>, StageFailure> {
        let out = self
            .git
            .push("origin", branch)
            .map_err(|e| StageFailure::new(Stage::Push, e.to_string()))?;
        if !out.success() {
            return Err(StageFailure::new(Stage::Push, out.error_text()));
        }
        let Committed {
            version,
            commit_hash,
        } = self.phase;
        Ok(PushCycle {
            git: self.git,
            phase: Pushed {
                version,
                commit_hash,
            },
        })
    }
}

impl<'a, G: GitOps + ?Sized> PushCycle<'a, G, Pushed> {
    /// Compare local HEAD against the remote tip and finish the cycle.
    pub fn verify(self, branch: &str) -> (CycleOutcome, VerifyDetail) {
        let detail = verify_push(self.git, branch);
        let Pushed {
            version,
            commit_hash,
        } = self.phase;
        if detail.verification == Verification::Mismatched {
            tracing::warn!(
                local = %detail.local.as_deref().unwrap_or("?"),
                remote = %detail.remote.as_deref().unwrap_or("?"),
                "push verification mismatch"
            );
        }
        (
            CycleOutcome::Success {
                version,
                commit_hash,
                verification: detail.verification,
            },
            detail,
        )
    }
}

/// Raw material from the verification read, for the log entry.
#[derive(Debug, Clone)]
pub struct VerifyDetail {
    pub verification: Verification,
    pub local: Option<String>,
    pub remote: Option<String>,
}

fn verify_push<G: GitOps + ?Sized>(git: &G, branch: &str) -> VerifyDetail {
    let local = expect_line(git.rev_parse("HEAD"), "local head").ok();

    let refspec = format!("refs/heads/{branch}");
    let remote = match git.ls_remote("origin", &refspec) {
        Ok(out) if out.success() => out
            .stdout
            .split_whitespace()
            .next()
            .map(|s| s.to_string()),
        _ => None,
    };

    let verification = match (&local, &remote) {
        (Some(l), Some(r)) if l == r => Verification::Verified,
        (Some(_), Some(_)) => Verification::Mismatched,
        // Remote (or even local HEAD) unreadable: cannot disprove the
        // push that git just reported as successful.
        _ => Verification::Unknown,
    };

    VerifyDetail {
        verification,
        local,
        remote,
    }
}

// =============================================================================
// Driver
// =============================================================================

/// Outcome plus the rendered per-stage transcript for the operation log.
pub struct PipelineRun {
    pub outcome: CycleOutcome,
    pub transcript: Vec<String>,
}

const SECTION_RULE: &str = "----------------------------------------";

fn section(transcript: &mut Vec<String>, title: &str) {
    transcript.push(title.to_string());
    transcript.push(SECTION_RULE.to_string());
}

/// Run the full stage → commit → push → verify sequence once.
///
/// All failures are absorbed into the returned outcome; nothing escapes
/// to the caller as an error.
pub fn run_pipeline<G: GitOps + ?Sized>(
    git: &G,
    store: &VersionStore,
    branch: &str,
    changes: &ChangeSet,
) -> PipelineRun {
    let mut transcript = Vec::new();

    if changes.is_empty() {
        transcript.push("No changes to commit".to_string());
        return PipelineRun {
            outcome: CycleOutcome::NoChanges,
            transcript,
        };
    }

    let digest = changes.digest();

    section(&mut transcript, "1. GIT ADD");
    let staged = match PushCycle::new(git).stage() {
        Ok(staged) => {
            transcript.push("git add completed".to_string());
            transcript.push(String::new());
            staged
        }
        Err(failure) => return fail(transcript, failure),
    };

    section(&mut transcript, "2. GIT COMMIT");
    let committed = match staged.commit(store, &digest) {
        Ok(committed) => {
            transcript.push("git commit completed".to_string());
            transcript.push(format!("Version: {}", committed.phase.version));
            transcript.push(format!("Commit hash: {}", committed.phase.commit_hash));
            transcript.push(format!("Change digest:\n{digest}"));
            transcript.push(String::new());
            committed
        }
        Err(failure) => return fail(transcript, failure),
    };

    section(&mut transcript, "3. GIT PUSH");
    let pushed = match committed.push(branch) {
        Ok(pushed) => {
            transcript.push("git push completed".to_string());
            transcript.push(format!("Branch: {branch}"));
            transcript.push(String::new());
            pushed
        }
        Err(failure) => return fail(transcript, failure),
    };

    section(&mut transcript, "4. PUSH VERIFICATION");
    let (outcome, detail) = pushed.verify(branch);
    transcript.push(match detail.verification {
        Verification::Verified => "Push verified: local and remote are synchronized".to_string(),
        Verification::Mismatched => "Warning: local and remote differ".to_string(),
        Verification::Unknown => "Could not verify push (no remote commit)".to_string(),
    });
    if let Some(local) = &detail.local {
        transcript.push(format!("Local commit:  {local}"));
    }
    if let Some(remote) = &detail.remote {
        transcript.push(format!("Remote commit: {remote}"));
    }
    transcript.push(String::new());

    section(&mut transcript, "5. REPOSITORY SUMMARY");
    let info = RepoInfo::gather(git);
    transcript.push(format!("Current branch: {}", info.branch));
    transcript.push(format!("Git user: {}", info.user));
    transcript.push(format!("Recent commits:\n{}", info.recent_commits));

    PipelineRun { outcome, transcript }
}

fn fail(mut transcript: Vec<String>, failure: StageFailure) -> PipelineRun {
    transcript.push(format!(
        "{} stage failed: {}",
        failure.stage, failure.message
    ));
    PipelineRun {
        outcome: failure.into(),
        transcript,
    }
}
