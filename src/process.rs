//! External solver invocation: scoped work directories, stdin-fed command
//! scripts and a bounded wait.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::CaseFailure;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Per-case working directory. Wiped on creation so stale files from an
/// earlier run cannot be mistaken for fresh output; removed on drop unless
/// kept.
#[derive(Debug)]
pub struct CaseWorkdir {
    path: PathBuf,
    keep: bool,
}

impl CaseWorkdir {
    pub fn create(path: impl Into<PathBuf>, keep: bool) -> io::Result<Self> {
        let path = path.into();
        if path.exists() {
            fs::remove_dir_all(&path)?;
        }
        fs::create_dir_all(&path)?;
        Ok(Self { path, keep })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, file: impl AsRef<Path>) -> PathBuf {
        self.path.join(file)
    }
}

impl Drop for CaseWorkdir {
    fn drop(&mut self) {
        if !self.keep {
            let _ = fs::remove_dir_all(&self.path);
        }
    }
}

/// Outcome of a completed (not timed out) invocation. The exit code alone
/// does not decide success.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
}

/// Seam between the executors and the solver binaries.
pub trait SolverRunner {
    /// Cheap availability check; false means fall back to mock mode.
    fn probe(&self) -> bool;

    /// Run once in `workdir` with `script` on stdin, stdout captured to
    /// `stdout_path`.
    fn run(
        &self,
        args: &[String],
        script: &str,
        workdir: &Path,
        stdout_path: &Path,
    ) -> Result<Invocation, CaseFailure>;
}

#[derive(Debug, Clone)]
pub struct ExternalSolver {
    pub executable: String,
    pub timeout: Duration,
    pub probe_timeout: Duration,
}

impl ExternalSolver {
    pub fn new(executable: impl Into<String>, timeout_s: f64, probe_timeout_s: f64) -> Self {
        Self {
            executable: executable.into(),
            timeout: Duration::from_secs_f64(timeout_s),
            probe_timeout: Duration::from_secs_f64(probe_timeout_s),
        }
    }

    fn spawn(&self, args: &[String], cwd: Option<&Path>, stdout: Stdio) -> io::Result<Child> {
        let mut cmd = Command::new(&self.executable);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(stdout)
            .stderr(Stdio::null());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd.spawn()
    }
}

fn feed_stdin(child: &mut Child, script: &str) {
    if let Some(mut stdin) = child.stdin.take() {
        // A solver that exits early closes the pipe; that is not our failure
        let _ = stdin.write_all(script.as_bytes());
    }
}

/// Poll until exit or timeout. On timeout the child is killed and reaped.
pub fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<ExitStatus, CaseFailure> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CaseFailure::Timeout {
                seconds: timeout.as_secs_f64(),
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

impl SolverRunner for ExternalSolver {
    fn probe(&self) -> bool {
        let mut child = match self.spawn(&[], None, Stdio::null()) {
            Ok(c) => c,
            Err(_) => return false,
        };
        feed_stdin(&mut child, "quit\n");
        wait_with_timeout(&mut child, self.probe_timeout).is_ok()
    }

    fn run(
        &self,
        args: &[String],
        script: &str,
        workdir: &Path,
        stdout_path: &Path,
    ) -> Result<Invocation, CaseFailure> {
        let stdout = File::create(stdout_path)?;
        let start = Instant::now();
        let mut child = self
            .spawn(args, Some(workdir), Stdio::from(stdout))
            .map_err(|e| CaseFailure::Spawn {
                message: format!("{}: {}", self.executable, e),
            })?;
        feed_stdin(&mut child, script);
        let status = wait_with_timeout(&mut child, self.timeout)?;
        Ok(Invocation {
            exit_code: status.code(),
            elapsed: start.elapsed(),
        })
    }
}
