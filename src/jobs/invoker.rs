use super::error::JobError;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// What an external process left behind once it terminated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    /// Everything written to stderr, decoded lossily
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Launches the external analysis program and waits for it
///
/// Implementations return `Ok` for any process that ran to termination,
/// whatever its exit code; only launch and wait problems are errors.
#[async_trait::async_trait]
pub trait ProcessInvoker: Send + Sync {
    async fn invoke(&self, args: &[String]) -> Result<ProcessOutput, JobError>;
}

/// Runs jobs through a container runner such as `docker`
#[derive(Debug, Clone)]
pub struct ContainerInvoker {
    program: String,
    timeout: Option<Duration>,
}

impl ContainerInvoker {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Kill the process if it has not exited after `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait::async_trait]
impl ProcessInvoker for ContainerInvoker {
    async fn invoke(&self, args: &[String]) -> Result<ProcessOutput, JobError> {
        debug!(program = %self.program, args = %args.join(" "), "Spawning process");

        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| JobError::Launch {
                program: self.program.clone(),
                source,
            })?;

        // Dropping the wait future on timeout drops the child, which kills it
        let wait = child.wait_with_output();
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| JobError::TimedOut {
                    secs: limit.as_secs(),
                })?,
            None => wait.await,
        }
        .map_err(|source| JobError::Wait {
            program: self.program.clone(),
            source,
        })?;

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
