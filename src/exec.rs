//! Bounded external command execution.
//!
//! Every subprocess the daemon spawns goes through [`run_with_timeout`],
//! which enforces a wall-clock bound and kills the child on expiry. A
//! hung external tool must never stall the polling loop.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

/// How often the runner polls a child for exit while the deadline has
/// not passed.
const POLL_SLICE: Duration = Duration::from_millis(50);

/// Captured result of a finished external command.
#[derive(Debug, Clone)]
pub struct CmdOutput {
    /// Process exit code; -1 when terminated by a signal.
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CmdOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Error text for reporting: stderr, falling back to stdout, falling
    /// back to a generic message.
    pub fn error_text(&self) -> String {
        let err = self.stderr.trim();
        if !err.is_empty() {
            return err.to_string();
        }
        let out = self.stdout.trim();
        if !out.is_empty() {
            return out.to_string();
        }
        format!("command exited with code {}", self.code)
    }
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("i/o error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Run a command to completion, capturing stdout/stderr as lossy UTF-8.
///
/// The child is polled in small slices; once `timeout` elapses it is
/// killed and the call fails with [`ExecError::Timeout`].
pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<CmdOutput, ExecError> {
    let program = cmd.get_program().to_string_lossy().into_owned();

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
        program: program.clone(),
        source,
    })?;

    // Drain the pipes on separate threads so a chatty child cannot
    // deadlock against a full pipe buffer while we wait on it.
    let stdout_reader = spawn_drain(child.stdout.take());
    let stderr_reader = spawn_drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    // Join readers so their threads do not outlive the call.
                    let _ = stdout_reader.join();
                    let _ = stderr_reader.join();
                    return Err(ExecError::Timeout { program, timeout });
                }
                thread::sleep(POLL_SLICE);
            }
            Err(source) => {
                let _ = kill_and_reap(&mut child);
                let _ = stdout_reader.join();
                let _ = stderr_reader.join();
                return Err(ExecError::Io { program, source });
            }
        }
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();

    Ok(CmdOutput {
        code: status.code().unwrap_or(-1),
        stdout,
        stderr,
    })
}

fn spawn_drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn kill_and_reap(child: &mut Child) -> std::io::Result<()> {
    child.kill()?;
    child.wait()?;
    Ok(())
}
