//! CLI surface tests.

use std::fs;
use std::process::Command as StdCommand;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn init_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    StdCommand::new("git")
        .args(["init"])
        .current_dir(dir.path())
        .output()
        .expect("git init");
    dir
}

#[test]
fn no_args_prints_help() {
    Command::cargo_bin("gitpulse")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn version_subcommand_prints_default_when_unset() {
    let dir = init_repo();
    Command::cargo_bin("gitpulse")
        .unwrap()
        .args(["version", "--repo"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("1.1.3"));
}

#[test]
fn version_subcommand_reads_persisted_counter() {
    let dir = init_repo();
    fs::write(dir.path().join(".git_auto_version"), "4.7.21\n").unwrap();
    Command::cargo_bin("gitpulse")
        .unwrap()
        .args(["version", "--repo"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("4.7.21"));
}

#[test]
fn outside_a_repository_fails() {
    let dir = TempDir::new().unwrap();
    Command::cargo_bin("gitpulse")
        .unwrap()
        .args(["version", "--repo"])
        .arg(dir.path())
        .assert()
        .failure();
}
