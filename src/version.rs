//! Monotonic three-part version counter.
//!
//! The counter is embedded in every commit message and persisted to a
//! single-line file between runs. Parsing is deliberately forgiving: a
//! cosmetic version string must never block the commit pipeline, so a
//! malformed value degrades to a fixed fallback instead of erroring.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Ordered (major, minor, patch) triple.
///
/// Patch and minor roll over at 99; major is unbounded.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    /// Starting point when no persisted version exists.
    pub const DEFAULT: Version = Version {
        major: 1,
        minor: 1,
        patch: 3,
    };

    /// Recovery value when a persisted version cannot be parsed.
    ///
    /// Equals `DEFAULT.increment()` so a corrupt file and a missing file
    /// converge on the same next commit version.
    pub const FALLBACK: Version = Version {
        major: 1,
        minor: 1,
        patch: 4,
    };

    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version {
            major,
            minor,
            patch,
        }
    }

    /// Next version in the progression.
    ///
    /// `1.1.3 -> 1.1.4`, `1.1.99 -> 1.2.0`, `1.99.99 -> 2.0.0`.
    pub fn increment(self) -> Version {
        if self.patch < 99 {
            Version::new(self.major, self.minor, self.patch + 1)
        } else if self.minor < 99 {
            Version::new(self.major, self.minor + 1, 0)
        } else {
            Version::new(self.major + 1, 0, 0)
        }
    }

    /// Parse a version string, falling back to [`Version::DEFAULT`] on
    /// anything that is not exactly three numeric dot-separated parts.
    ///
    /// Incrementing the fallback yields [`Version::FALLBACK`], which keeps
    /// the pipeline moving past a mangled version file.
    pub fn parse_or_default(s: &str) -> Version {
        match s.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(raw = s, "malformed version string, using default");
                Version::DEFAULT
            }
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid version string: {0:?}")]
pub struct ParseVersionError(String);

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(ParseVersionError(s.to_string()));
        }
        let parse = |p: &str| p.parse::<u64>().map_err(|_| ParseVersionError(s.into()));
        Ok(Version::new(
            parse(parts[0])?,
            parse(parts[1])?,
            parse(parts[2])?,
        ))
    }
}

/// File-backed version persistence.
pub struct VersionStore {
    path: PathBuf,
}

impl VersionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        VersionStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted version.
    ///
    /// Missing file, unreadable file, or empty content all degrade to
    /// [`Version::DEFAULT`] with a warning; this never fails the process.
    pub fn load(&self) -> Version {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => {
                tracing::warn!(path = %self.path.display(), "version file empty, using default");
                Version::DEFAULT
            }
            Ok(raw) => Version::parse_or_default(&raw),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "version file not readable, using default"
                );
                Version::DEFAULT
            }
        }
    }

    /// Persist a version.
    ///
    /// Writes to a sibling temp file and renames over the target, so a
    /// crash mid-write leaves either the old or the new value.
    pub fn save(&self, version: Version) -> std::io::Result<()> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, version.to_string())?;
        fs::rename(&tmp, &self.path)?;
        tracing::debug!(%version, path = %self.path.display(), "version saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_patch() {
        assert_eq!(
            Version::new(1, 1, 3).increment(),
            Version::new(1, 1, 4)
        );
    }

    #[test]
    fn increment_rolls_minor_at_99() {
        assert_eq!(
            Version::new(1, 1, 99).increment(),
            Version::new(1, 2, 0)
        );
    }

    #[test]
    fn increment_rolls_major_at_99_99() {
        assert_eq!(
            Version::new(1, 99, 99).increment(),
            Version::new(2, 0, 0)
        );
    }

    #[test]
    fn major_is_unbounded() {
        assert_eq!(
            Version::new(100, 99, 99).increment(),
            Version::new(101, 0, 0)
        );
    }

    #[test]
    fn malformed_version_increments_to_fallback() {
        let next = Version::parse_or_default("x.y.z").increment();
        assert_eq!(next, Version::FALLBACK);

        let next = Version::parse_or_default("1.2").increment();
        assert_eq!(next, Version::FALLBACK);

        let next = Version::parse_or_default("1.2.3.4").increment();
        assert_eq!(next, Version::FALLBACK);
    }

    #[test]
    fn display_round_trips() {
        let v = Version::new(12, 0, 7);
        assert_eq!(v.to_string().parse::<Version>().unwrap(), v);
    }

    #[test]
    fn store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionStore::new(dir.path().join("version"));
        let v = Version::new(2, 41, 9);
        store.save(v).unwrap();
        assert_eq!(store.load(), v);
    }

    #[test]
    fn store_missing_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionStore::new(dir.path().join("absent"));
        assert_eq!(store.load(), Version::DEFAULT);
    }

    #[test]
    fn store_empty_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("version");
        std::fs::write(&path, "  \n").unwrap();
        assert_eq!(VersionStore::new(path).load(), Version::DEFAULT);
    }

    #[test]
    fn store_tolerates_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("version");
        std::fs::write(&path, "3.4.5\n").unwrap();
        assert_eq!(VersionStore::new(path).load(), Version::new(3, 4, 5));
    }
}
