//! End-to-end cycle scenarios against a real git repository.
//!
//! Each fixture is a working tree with a bare "remote" on the local
//! filesystem; connectivity is pinned with a fixed probe so cycles run
//! without touching the network.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tempfile::TempDir;

use gitpulse::net::{ProbeSet, ProbeStrategy};
use gitpulse::{Config, CycleOutcome, Daemon, Stage};

struct Online;

impl ProbeStrategy for Online {
    fn name(&self) -> &'static str {
        "online"
    }
    fn check(&self) -> bool {
        true
    }
}

fn online_probe() -> ProbeSet {
    ProbeSet::new(vec![Box::new(Online)])
}

struct RepoFixture {
    repo_dir: TempDir,
    #[allow(dead_code)]
    remote_dir: TempDir,
}

impl RepoFixture {
    fn new() -> Self {
        let repo_dir = TempDir::new().expect("create repo dir");
        let remote_dir = TempDir::new().expect("create remote dir");

        git(remote_dir.path(), &["init", "--bare"]);

        git(repo_dir.path(), &["init"]);
        git(repo_dir.path(), &["checkout", "-b", "main"]);
        git(repo_dir.path(), &["config", "user.email", "test@test.com"]);
        git(repo_dir.path(), &["config", "user.name", "Test"]);
        let remote = remote_dir.path().to_str().unwrap().to_string();
        git(repo_dir.path(), &["remote", "add", "origin", &remote]);

        RepoFixture {
            repo_dir,
            remote_dir,
        }
    }

    fn path(&self) -> &Path {
        self.repo_dir.path()
    }

    fn config(&self) -> Config {
        Config {
            branch: Some("main".to_string()),
            ..Config::default()
        }
    }

    fn daemon(&self) -> Daemon {
        let shutdown = Arc::new(AtomicBool::new(false));
        Daemon::bootstrap(self.config(), self.path(), shutdown)
            .expect("bootstrap")
            .with_probe(online_probe())
    }

    fn write_version(&self, version: &str) {
        fs::write(self.path().join(".git_auto_version"), version).unwrap();
    }

    fn read_version(&self) -> String {
        fs::read_to_string(self.path().join(".git_auto_version"))
            .unwrap()
            .trim()
            .to_string()
    }

    fn log_contents(&self) -> String {
        fs::read_to_string(self.path().join("git_auto_log.txt")).unwrap_or_default()
    }

    fn log_entry_count(&self) -> usize {
        self.log_contents().matches("CHECK #").count()
    }
}

fn git(dir: &Path, args: &[&str]) {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("run git");
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
}

#[test]
fn clean_tree_yields_no_changes_and_one_log_entry() {
    let fixture = RepoFixture::new();
    fs::write(fixture.path().join("seed.txt"), "seed").unwrap();
    git(fixture.path(), &["add", "."]);
    git(fixture.path(), &["commit", "-m", "seed"]);
    fixture.write_version("1.1.3");

    let mut daemon = fixture.daemon();
    let report = daemon.run_once();

    assert!(report.connected);
    assert_eq!(report.outcome, Some(CycleOutcome::NoChanges));
    assert_eq!(fixture.read_version(), "1.1.3");
    assert_eq!(fixture.log_entry_count(), 1);
}

#[test]
fn untracked_file_is_committed_pushed_and_versioned() {
    let fixture = RepoFixture::new();
    fixture.write_version("1.1.3");
    fs::write(fixture.path().join("new.txt"), "hello").unwrap();

    let mut daemon = fixture.daemon();
    let report = daemon.run_once();

    match report.outcome {
        Some(CycleOutcome::Success {
            version,
            ref commit_hash,
            ..
        }) => {
            assert_eq!(version.to_string(), "1.1.4");
            assert!(!commit_hash.is_empty());
        }
        ref other => panic!("expected success, got {other:?}"),
    }

    assert_eq!(fixture.read_version(), "1.1.4");

    // The commit message embeds the new version and the digest. Note:
    // the version file itself was committed along with new.txt.
    let out = Command::new("git")
        .args(["log", "-1", "--format=%B"])
        .current_dir(fixture.path())
        .output()
        .unwrap();
    let message = String::from_utf8_lossy(&out.stdout);
    assert!(message.contains("Version 1.1.4"), "message: {message}");
    assert!(message.contains("new.txt"));

    // Five-section entry in the operation log.
    let log = fixture.log_contents();
    for header in [
        "1. GIT ADD",
        "2. GIT COMMIT",
        "3. GIT PUSH",
        "4. PUSH VERIFICATION",
        "5. REPOSITORY SUMMARY",
    ] {
        assert!(log.contains(header), "log missing {header}");
    }

    // The bare remote really received the branch.
    let out = Command::new("git")
        .args(["ls-remote", "origin", "refs/heads/main"])
        .current_dir(fixture.path())
        .output()
        .unwrap();
    assert!(!out.stdout.is_empty());
}

#[test]
fn second_cycle_after_success_sees_clean_tree() {
    let fixture = RepoFixture::new();
    fixture.write_version("1.1.3");
    fs::write(fixture.path().join("new.txt"), "hello").unwrap();

    let mut daemon = fixture.daemon();
    let first = daemon.run_once();
    assert!(matches!(first.outcome, Some(CycleOutcome::Success { .. })));

    let second = daemon.run_once();
    assert_eq!(second.outcome, Some(CycleOutcome::NoChanges));
    assert_eq!(second.check, 2);
    assert_eq!(fixture.read_version(), "1.1.4");
}

#[test]
fn failed_push_keeps_version_and_raises_pending() {
    let fixture = RepoFixture::new();
    fixture.write_version("1.1.3");
    // Point origin at a path that does not exist so push fails while
    // add/commit still succeed.
    git(
        fixture.path(),
        &["remote", "set-url", "origin", "/nonexistent/remote/path"],
    );
    fs::write(fixture.path().join("new.txt"), "hello").unwrap();

    let mut daemon = fixture.daemon();
    let report = daemon.run_once();

    match report.outcome {
        Some(CycleOutcome::Failure { stage, .. }) => assert_eq!(stage, Stage::Push),
        ref other => panic!("expected push failure, got {other:?}"),
    }

    // Commit happened, so the persisted version stays advanced.
    assert_eq!(fixture.read_version(), "1.1.4");
    assert!(daemon.state().pending_operations);
    assert_eq!(daemon.state().failed_operations, 1);

    // Failure left an error record behind.
    let error_dir = fixture.path().join("git_auto_errors");
    let records: Vec<_> = fs::read_dir(&error_dir).unwrap().collect();
    assert!(!records.is_empty());
}

#[test]
fn offline_cycle_logs_brief_entry_and_skips_pipeline() {
    let fixture = RepoFixture::new();
    fixture.write_version("1.1.3");
    fs::write(fixture.path().join("new.txt"), "hello").unwrap();

    let mut daemon = fixture.daemon().with_probe(ProbeSet::new(vec![]));
    let report = daemon.run_once();

    assert!(!report.connected);
    assert!(report.outcome.is_none());
    // Nothing was committed and the version is untouched.
    assert_eq!(fixture.read_version(), "1.1.3");
    assert!(fixture.log_contents().contains("NO INTERNET"));
}
