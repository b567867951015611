//! Scripted fakes shared by unit tests.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::exec::CmdOutput;
use crate::git::{GitError, GitOps};
use crate::net::Connectivity;

/// Scripted [`GitOps`] implementation.
///
/// Every command succeeds with empty output unless a response is
/// registered for its key. Keys are the git subcommand name, with
/// `rev-parse --short` distinguished as `"rev-parse-short"`.
#[derive(Default)]
pub struct ScriptedGit {
    responses: RefCell<HashMap<String, CmdOutput>>,
    calls: RefCell<Vec<Vec<String>>>,
}

fn key_for(args: &[&str]) -> String {
    if args.first() == Some(&"rev-parse") && args.contains(&"--short") {
        "rev-parse-short".to_string()
    } else {
        args.first().copied().unwrap_or_default().to_string()
    }
}

impl ScriptedGit {
    /// Make `key` succeed with the given stdout.
    pub fn respond_stdout(&self, key: &str, stdout: &str) {
        self.responses.borrow_mut().insert(
            key.to_string(),
            CmdOutput {
                code: 0,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        );
    }

    /// Make `key` fail with exit code 1 and the given stderr.
    pub fn respond_failure(&self, key: &str, stderr: &str) {
        self.responses.borrow_mut().insert(
            key.to_string(),
            CmdOutput {
                code: 1,
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        );
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn calls_for(&self, subcommand: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|args| args.first().map(String::as_str) == Some(subcommand))
            .count()
    }

    /// Message of the most recent `git commit -m <message>` call.
    pub fn last_commit_message(&self) -> Option<String> {
        self.calls
            .borrow()
            .iter()
            .rev()
            .find(|args| args.first().map(String::as_str) == Some("commit"))
            .and_then(|args| args.last().cloned())
    }
}

impl GitOps for ScriptedGit {
    fn run(&self, args: &[&str]) -> Result<CmdOutput, GitError> {
        self.calls
            .borrow_mut()
            .push(args.iter().map(|s| s.to_string()).collect());
        let key = key_for(args);
        Ok(self
            .responses
            .borrow()
            .get(&key)
            .cloned()
            .unwrap_or(CmdOutput {
                code: 0,
                stdout: String::new(),
                stderr: String::new(),
            }))
    }
}

/// Fixed connectivity answer.
pub struct FixedConnectivity(pub bool);

impl Connectivity for FixedConnectivity {
    fn is_reachable(&self) -> bool {
        self.0
    }
}
