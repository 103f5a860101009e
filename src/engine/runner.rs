//! Process execution seam between the engine and FFmpeg.

use crate::engine::core::{EncoderCommand, ProgressParser};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// PIDs of FFmpeg processes currently running for a batch
pub type PidRegistry = Arc<Mutex<HashSet<u32>>>;

/// How one FFmpeg invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    /// Full stderr, volumedetect reports land here
    pub stderr: String,
    pub cancelled: bool,
}

impl RunOutcome {
    pub fn succeeded(stderr: impl Into<String>) -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            stderr: stderr.into(),
            cancelled: false,
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: Some(exit_code),
            stderr: stderr.into(),
            cancelled: false,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            success: false,
            exit_code: None,
            stderr: String::new(),
            cancelled: true,
        }
    }

    /// The last few stderr lines, which carry FFmpeg's actual complaint.
    pub fn stderr_tail(&self, lines: usize) -> String {
        let all: Vec<&str> = self.stderr.lines().collect();
        let start = all.len().saturating_sub(lines);
        all[start..].join("\n")
    }
}

/// Executes synthesized commands. The engine never spawns processes directly.
pub trait ProcessRunner: Send {
    /// Run one command to completion, feeding `-progress` updates to `on_progress`.
    fn run(
        &mut self,
        command: &EncoderCommand,
        cancel: &CancelToken,
        on_progress: &mut dyn FnMut(&ProgressParser),
    ) -> Result<RunOutcome>;
}

/// Shared cancellation flag plus the PIDs to kill when it is raised.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    pids: PidRegistry,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Raise the flag and terminate every registered process.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        let pids: Vec<u32> = self
            .pids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .copied()
            .collect();
        for pid in pids {
            debug!(pid, "terminating ffmpeg");
            terminate(pid);
        }
    }

    pub fn register(&self, pid: u32) {
        self.pids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(pid);
    }

    pub fn unregister(&self, pid: u32) {
        self.pids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&pid);
    }

    pub fn registry(&self) -> PidRegistry {
        self.pids.clone()
    }
}

#[cfg(unix)]
fn terminate(pid: u32) {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) has no memory-safety preconditions
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc != 0 {
        warn!(pid, "failed to signal ffmpeg");
    }
}

#[cfg(not(unix))]
fn terminate(pid: u32) {
    let result = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Err(e) = result {
        warn!(pid, error = %e, "taskkill failed");
    }
}

/// FFmpeg exits gracefully on SIGINT/SIGTERM and prints
/// "Exiting normally, received signal N", so check both.
#[cfg(unix)]
pub fn was_user_cancelled(status: &ExitStatus, stderr: &str) -> bool {
    use std::os::unix::process::ExitStatusExt;

    if let Some(signal) = status.signal() {
        if matches!(signal, 2 | 3 | 15) {
            return true;
        }
    }
    stderr.contains("received signal 2")
        || stderr.contains("received signal 3")
        || stderr.contains("received signal 15")
}

#[cfg(not(unix))]
pub fn was_user_cancelled(_status: &ExitStatus, stderr: &str) -> bool {
    stderr.contains("received signal")
}

/// Spawns the real FFmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    program: PathBuf,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
        }
    }
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific ffmpeg binary instead of the one on PATH.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn prepare(&self, command: &EncoderCommand) -> Command {
        let mut cmd = Command::new(&self.program);
        // Machine-readable progress on stdout, diagnostics stay on stderr
        cmd.arg("-progress").arg("pipe:1").arg("-nostats");
        cmd.args(&command.args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }
}

impl ProcessRunner for FfmpegRunner {
    fn run(
        &mut self,
        command: &EncoderCommand,
        cancel: &CancelToken,
        on_progress: &mut dyn FnMut(&ProgressParser),
    ) -> Result<RunOutcome> {
        if cancel.is_cancelled() {
            return Ok(RunOutcome::cancelled());
        }

        debug!(command = %command, "spawning");
        let mut child = self
            .prepare(command)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.program.display()))?;

        let pid = child.id();
        cancel.register(pid);
        // cancel() may have run between the check above and registration
        if cancel.is_cancelled() {
            terminate(pid);
        }

        let stderr = child.stderr.take().context("Failed to capture stderr")?;
        let stderr_thread = std::thread::spawn(move || {
            let mut output = String::new();
            let reader = BufReader::new(stderr);
            for line in reader.lines().map_while(Result::ok) {
                output.push_str(&line);
                output.push('\n');
            }
            output
        });

        let stdout = child.stdout.take().context("Failed to capture stdout")?;
        let mut parser = ProgressParser::new();
        for line in BufReader::new(stdout).lines().map_while(Result::ok) {
            parser.parse_line(&line);
            on_progress(&parser);
        }

        let status = child.wait().context("Failed to wait for ffmpeg")?;
        cancel.unregister(pid);

        let stderr_output = stderr_thread
            .join()
            .unwrap_or_else(|_| "Failed to capture stderr".to_string());

        let cancelled = cancel.is_cancelled() || was_user_cancelled(&status, &stderr_output);
        Ok(RunOutcome {
            success: status.success() && !cancelled,
            exit_code: status.code(),
            stderr: stderr_output,
            cancelled,
        })
    }
}
