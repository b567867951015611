//! Operation log and error record files.
//!
//! The operation log is a human-readable, line-oriented append-only
//! file: each entry is a rule line, a `[timestamp]` line, another rule,
//! then the message block. The file is bounded - before every append the
//! log rotates down to its most recent lines once the configured maximum
//! is reached, leaving a marker block recording the rotation.
//!
//! Error records are one-file-per-error artifacts carrying the error
//! text, the active configuration snapshot, and the host platform.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use time::macros::format_description;

/// Lines added by a rotation marker block.
pub const MARKER_LINES: usize = 9;

const ENTRY_RULE_LEN: usize = 60;
const BRIEF_RULE_LEN: usize = 40;
const MARKER_RULE_LEN: usize = 80;

/// Local wall-clock time, falling back to UTC when the local offset
/// cannot be determined (e.g. multi-threaded test runners on Linux).
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// `YYYY-MM-DD HH:MM:SS`, for log entries.
pub fn stamp(at: OffsetDateTime) -> String {
    let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    at.format(&fmt).unwrap_or_else(|_| "unknown-time".into())
}

/// `YYYYmmdd_HHMMSS`, for error record file names.
pub fn compact_stamp(at: OffsetDateTime) -> String {
    let fmt = format_description!("[year][month][day]_[hour][minute][second]");
    at.format(&fmt).unwrap_or_else(|_| "unknown-time".into())
}

/// `dd.mm.yy HH:MM:SS`, the short form embedded in commit messages.
pub fn commit_stamp(at: OffsetDateTime) -> String {
    let fmt = format_description!("[day].[month].[year repr:last_two] [hour]:[minute]:[second]");
    at.format(&fmt).unwrap_or_else(|_| "unknown-time".into())
}

/// Size-bounded append-only operation log.
pub struct OperationLog {
    path: PathBuf,
    max_lines: usize,
    keep_lines: usize,
}

impl OperationLog {
    pub fn new(path: impl Into<PathBuf>, max_lines: usize, keep_lines: usize) -> Self {
        OperationLog {
            path: path.into(),
            max_lines,
            keep_lines,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a timestamped entry with the standard rule line.
    pub fn append(&self, message: &str) -> io::Result<()> {
        self.append_with_rule(message, ENTRY_RULE_LEN)
    }

    /// Append with the shorter rule used for minor entries (e.g. the
    /// offline check notices).
    pub fn append_brief(&self, message: &str) -> io::Result<()> {
        self.append_with_rule(message, BRIEF_RULE_LEN)
    }

    fn append_with_rule(&self, message: &str, rule_len: usize) -> io::Result<()> {
        // Rotate before adding new content so the bound holds after the
        // append settles.
        self.rotate_if_needed()?;

        let rule = "=".repeat(rule_len);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        write!(
            file,
            "\n{rule}\n[{}]\n{rule}\n{message}\n",
            stamp(now())
        )?;
        Ok(())
    }

    /// Current number of lines in the log, 0 when the file is absent.
    pub fn line_count(&self) -> io::Result<usize> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(contents.lines().count()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Truncate to the most recent `keep_lines` lines when the file has
    /// reached `max_lines`, then append a rotation marker block.
    fn rotate_if_needed(&self) -> io::Result<()> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        let lines: Vec<&str> = contents.lines().collect();
        if lines.len() < self.max_lines || lines.len() <= self.keep_lines {
            return Ok(());
        }

        let kept = &lines[lines.len() - self.keep_lines..];
        let mut rewritten = kept.join("\n");
        rewritten.push('\n');
        fs::write(&self.path, &rewritten)?;

        tracing::info!(
            path = %self.path.display(),
            previous = lines.len(),
            kept = kept.len(),
            "operation log rotated"
        );

        let rule = "=".repeat(MARKER_RULE_LEN);
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        write!(
            file,
            "\n{rule}\nLOG FILE ROTATED\nTime: {}\nPrevious size: {} lines\nNew size: {} lines\nRotation threshold: {} lines\n{rule}\n\n",
            stamp(now()),
            lines.len(),
            kept.len(),
            self.max_lines
        )?;
        Ok(())
    }
}

/// One-file-per-error records.
pub struct ErrorFiles {
    dir: PathBuf,
}

impl ErrorFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ErrorFiles { dir: dir.into() }
    }

    /// Write an error record named by timestamp, containing the error
    /// text, the active config snapshot, and the host platform.
    pub fn record(&self, error: &str, config_snapshot: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let at = now();
        let path = self.dir.join(format!("error_{}.txt", compact_stamp(at)));
        let mut file = fs::File::create(&path)?;
        write!(
            file,
            "Error time: {}\nError: {error}\nPlatform: {}\n\nConfig:\n{config_snapshot}\n",
            stamp(at),
            std::env::consts::OS
        )?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use time::macros::datetime;

    fn log_in(dir: &TempDir, max: usize, keep: usize) -> OperationLog {
        OperationLog::new(dir.path().join("op.log"), max, keep)
    }

    #[test]
    fn append_writes_timestamped_block() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir, 100, 50);
        log.append("CYCLE OK").unwrap();

        let contents = fs::read_to_string(log.path()).unwrap();
        assert!(contents.contains(&"=".repeat(60)));
        assert!(contents.contains("CYCLE OK"));
        assert!(contents.contains('['));
    }

    #[test]
    fn line_count_of_missing_file_is_zero() {
        let dir = TempDir::new().unwrap();
        assert_eq!(log_in(&dir, 100, 50).line_count().unwrap(), 0);
    }

    #[test]
    fn rotation_bounds_the_file() {
        let dir = TempDir::new().unwrap();
        let max = 40;
        let keep = 20;
        let log = log_in(&dir, max, keep);

        for i in 0..20 {
            log.append(&format!("entry {i}")).unwrap();
        }

        // Every append left the file within max plus one entry's worth
        // of lines (rotation runs before the append).
        let count = log.line_count().unwrap();
        assert!(count <= max + 8, "log has {count} lines");

        let contents = fs::read_to_string(log.path()).unwrap();
        assert!(contents.contains("LOG FILE ROTATED"));
        assert!(contents.contains(&format!("Rotation threshold: {max} lines")));
    }

    #[test]
    fn rotation_retains_keep_plus_marker() {
        let dir = TempDir::new().unwrap();
        let keep = 10;
        let log = log_in(&dir, 30, keep);

        // Fill past the threshold, then trigger rotation directly.
        let filler: String = (0..40).map(|i| format!("line {i}\n")).collect();
        fs::write(log.path(), filler).unwrap();
        log.rotate_if_needed().unwrap();

        assert_eq!(log.line_count().unwrap(), keep + MARKER_LINES);
        let contents = fs::read_to_string(log.path()).unwrap();
        // Most recent lines survived.
        assert!(contents.contains("line 39"));
        assert!(!contents.contains("line 29\n"));
    }

    #[test]
    fn below_threshold_never_rotates() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir, 1000, 500);
        for _ in 0..5 {
            log.append("small entry").unwrap();
        }
        let contents = fs::read_to_string(log.path()).unwrap();
        assert!(!contents.contains("LOG FILE ROTATED"));
    }

    #[test]
    fn error_record_contains_snapshot_and_platform() {
        let dir = TempDir::new().unwrap();
        let errors = ErrorFiles::new(dir.path().join("errors"));
        let path = errors.record("push exploded", "branch = \"main\"").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Error: push exploded"));
        assert!(contents.contains("branch = \"main\""));
        assert!(contents.contains(std::env::consts::OS));
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("error_"));
    }

    #[test]
    fn commit_stamp_format() {
        let at = datetime!(2025-03-09 14:05:07 UTC);
        assert_eq!(commit_stamp(at), "09.03.25 14:05:07");
        assert_eq!(stamp(at), "2025-03-09 14:05:07");
        assert_eq!(compact_stamp(at), "20250309_140507");
    }
}
