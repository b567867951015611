//! Working-tree change classification and commit-message digest.

use super::cli::GitOps;
use super::error::GitError;

/// Maximum paths listed per bucket in the digest.
const DIGEST_CAP: usize = 5;

/// Pending working-tree changes bucketed by kind.
///
/// Computed fresh each connected cycle from `git status --porcelain`;
/// never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    pub fn total(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }

    /// Parse porcelain status lines.
    ///
    /// Each line is a 2-character status code, a space, then the path.
    /// `A` and `??` count as added, `M` as modified, `D` as deleted;
    /// anything else (renames, conflicts, ...) is ignored rather than
    /// treated as an error.
    pub fn from_porcelain(stdout: &str) -> ChangeSet {
        let mut changes = ChangeSet::default();
        for line in stdout.lines() {
            if line.trim().is_empty() || line.len() < 3 {
                continue;
            }
            let code = line[..2].trim();
            let path = line[3..].to_string();
            match code {
                "A" | "??" => changes.added.push(path),
                "M" => changes.modified.push(path),
                "D" => changes.deleted.push(path),
                _ => {}
            }
        }
        changes
    }

    /// Drop entries matching the given repo-relative paths (or living
    /// under them, for directories).
    ///
    /// Used to keep the daemon's own artifacts - version file, operation
    /// log, error records - from triggering commit cycles of their own.
    pub fn exclude(&mut self, paths: &[String]) {
        let excluded = |entry: &String| {
            let entry = entry.trim_end_matches('/');
            paths.iter().any(|p| {
                let p = p.trim_end_matches('/');
                entry == p || entry.starts_with(&format!("{p}/"))
            })
        };
        self.added.retain(|e| !excluded(e));
        self.modified.retain(|e| !excluded(e));
        self.deleted.retain(|e| !excluded(e));
    }

    /// Human-readable digest used in the commit message body.
    ///
    /// Lists up to five paths per bucket with an "and N more" suffix.
    /// Cosmetic only - nothing downstream parses this.
    pub fn digest(&self) -> String {
        let mut out = String::from("Working tree changes:\n");

        for (label, paths) in [
            ("Added files", &self.added),
            ("Modified files", &self.modified),
            ("Deleted files", &self.deleted),
        ] {
            if paths.is_empty() {
                continue;
            }
            out.push('\n');
            out.push_str(label);
            out.push_str(":\n");
            for path in paths.iter().take(DIGEST_CAP) {
                out.push_str("- ");
                out.push_str(path);
                out.push('\n');
            }
            if paths.len() > DIGEST_CAP {
                out.push_str(&format!("... and {} more files\n", paths.len() - DIGEST_CAP));
            }
        }

        out.trim_end().to_string()
    }
}

/// Inspect the working tree once and classify pending changes.
pub fn summarize<G: GitOps + ?Sized>(git: &G) -> Result<ChangeSet, GitError> {
    let out = git.status_porcelain()?;
    if !out.success() {
        return Err(GitError::failed("git status", out.error_text()));
    }
    Ok(ChangeSet::from_porcelain(&out.stdout))
}
