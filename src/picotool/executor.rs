//! Command Executor
//!
//! Runs a composed picotool argument vector as a subprocess and classifies the
//! outcome. The picotool binary is located once at startup; every call spawns
//! the resolved path directly, captures stdout and stderr separately and waits
//! for exit without blocking the runtime.
//!
//! Failures are values, never panics:
//!
//! - [`PicotoolError::BinaryNotFound`]: picotool is not installed or the resolved
//!   path no longer exists
//! - [`PicotoolError::CommandFailed`]: picotool ran and exited non-zero; carries its
//!   stderr verbatim
//! - [`PicotoolError::ExecutionError`]: anything else at the OS level (permission
//!   denied, killed by a signal, timeout)

use async_trait::async_trait;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command as TokioCommand;
use tracing::{debug, info, warn};

/// Name searched for on `PATH` when no explicit path is configured
pub const PICOTOOL_BINARY: &str = "picotool";

/// Failure category, without the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    BinaryNotFound,
    CommandFailed,
    ExecutionError,
}

/// Classified picotool failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PicotoolError {
    /// picotool is not installed or not reachable at the resolved location
    #[error("picotool binary not found at: {0}")]
    BinaryNotFound(String),

    /// picotool ran and rejected the request; stderr is kept verbatim
    #[error("picotool command failed: {0}")]
    CommandFailed(String),

    /// OS-level fault spawning or talking to the process
    #[error("Error running picotool: {0}")]
    ExecutionError(String),
}

impl PicotoolError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::BinaryNotFound(_) => FailureKind::BinaryNotFound,
            Self::CommandFailed(_) => FailureKind::CommandFailed,
            Self::ExecutionError(_) => FailureKind::ExecutionError,
        }
    }

    /// The raw payload without the category prefix
    pub fn message(&self) -> &str {
        match self {
            Self::BinaryNotFound(m) | Self::CommandFailed(m) | Self::ExecutionError(m) => m,
        }
    }
}

/// Success text, or a classified failure
pub type ExecutionOutcome = Result<String, PicotoolError>;

/// Where picotool lives, decided once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PicotoolBinary {
    /// Absolute (or explicitly configured) path to execute
    Resolved(PathBuf),

    /// Nothing was found on `PATH`; every call fails without spawning
    Missing,
}

impl PicotoolBinary {
    /// Resolve the binary location.
    ///
    /// An explicitly configured path is trusted as-is, so a misconfigured path
    /// surfaces as `BinaryNotFound` on the first call rather than at startup.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        if let Some(path) = explicit {
            debug!("Using configured picotool path: {}", path.display());
            return Self::Resolved(path.to_path_buf());
        }

        match which::which(PICOTOOL_BINARY) {
            Ok(path) => {
                info!("Found picotool at {}", path.display());
                Self::Resolved(path)
            }
            Err(e) => {
                warn!("picotool not found in PATH ({}); all calls will fail until it is installed", e);
                Self::Missing
            }
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Resolved(path) => Some(path),
            Self::Missing => None,
        }
    }
}

impl fmt::Display for PicotoolBinary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved(path) => write!(f, "{}", path.display()),
            Self::Missing => write!(f, "{} (not found in PATH)", PICOTOOL_BINARY),
        }
    }
}

/// Raw result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when the process was terminated by a signal
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Spawns a program and collects its output.
///
/// The production implementation is [`TokioRunner`]; tests substitute stubs.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &Path, args: &[String]) -> io::Result<ProcessOutput>;
}

/// Runs commands with `tokio::process`, never through a shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioRunner;

#[async_trait]
impl CommandRunner for TokioRunner {
    async fn run(&self, program: &Path, args: &[String]) -> io::Result<ProcessOutput> {
        let output = TokioCommand::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Executes picotool invocations.
///
/// Immutable after construction; share it behind an `Arc` across request tasks.
#[derive(Clone)]
pub struct Executor {
    binary: PicotoolBinary,
    runner: Arc<dyn CommandRunner>,
    timeout: Option<Duration>,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("binary", &self.binary)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Executor {
    /// Create an executor that spawns real processes
    pub fn new(binary: PicotoolBinary) -> Self {
        Self::with_runner(binary, Arc::new(TokioRunner))
    }

    /// Create an executor with a custom process runner
    pub fn with_runner(binary: PicotoolBinary, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            binary,
            runner,
            timeout: None,
        }
    }

    /// Kill and fail commands that run longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> &PicotoolBinary {
        &self.binary
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run picotool with `tokens` as its argument vector.
    pub async fn execute(&self, tokens: &[String]) -> ExecutionOutcome {
        let Some(program) = self.binary.path() else {
            return Err(PicotoolError::BinaryNotFound(self.binary.to_string()));
        };

        let start = Instant::now();
        info!("Executing: {} {}", program.display(), tokens.join(" "));

        let run = self.runner.run(program, tokens);
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("picotool timed out after {:?}", limit);
                    return Err(PicotoolError::ExecutionError(format!(
                        "timed out after {:?}",
                        limit
                    )));
                }
            },
            None => run.await,
        };

        let output = match result {
            Ok(output) => output,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("picotool binary disappeared: {}", program.display());
                return Err(PicotoolError::BinaryNotFound(program.display().to_string()));
            }
            Err(e) => {
                warn!("Failed to run picotool: {}", e);
                return Err(PicotoolError::ExecutionError(e.to_string()));
            }
        };

        debug!(
            "picotool exited with {:?} after {}ms",
            output.code,
            start.elapsed().as_millis()
        );
        classify(output)
    }
}

/// Map a finished process to an outcome.
fn classify(output: ProcessOutput) -> ExecutionOutcome {
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    match output.code {
        Some(0) => Ok(stdout),
        Some(code) => {
            warn!("picotool failed (exit code: {}): {}", code, stderr);
            Err(PicotoolError::CommandFailed(stderr))
        }
        None => Err(PicotoolError::ExecutionError(
            "picotool was terminated by a signal".to_string(),
        )),
    }
}
