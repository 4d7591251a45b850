use super::error::JobError;
use super::invoker::ProcessInvoker;
use crate::session::marker::{self, MarkerState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// One launch of an external analysis program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInvocation {
    /// Stage name, also the marker prefix (`diarization`, `transcription`)
    pub name: String,
    /// Where the `<name>_*` markers are written
    pub results_dir: PathBuf,
    /// Argument vector for the container runner
    pub args: Vec<String>,
}

/// Runs a single job, bracketing it with marker files
///
/// `<name>_begun` is always on disk before the process starts. After the
/// process exits, exactly one of `<name>_ended` (exit code 0) or
/// `<name>_failed` (anything else) follows.
#[derive(Clone)]
pub struct JobRunner {
    invoker: Arc<dyn ProcessInvoker>,
}

impl JobRunner {
    pub fn new(invoker: Arc<dyn ProcessInvoker>) -> Self {
        Self { invoker }
    }

    pub async fn run(&self, job: &JobInvocation) -> Result<(), JobError> {
        Self::mark(job, MarkerState::Begun).await?;
        info!(job = %job.name, args = %job.args.join(" "), "Job started");

        match self.execute(job).await {
            Ok(()) => {
                Self::mark(job, MarkerState::Ended).await?;
                info!(job = %job.name, "Job finished");
                Ok(())
            }
            Err(e) => {
                error!(job = %job.name, error = %e, "Job failed");
                if let Err(marker_err) = Self::mark(job, MarkerState::Failed).await {
                    warn!(job = %job.name, error = %marker_err, "Could not record job failure");
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, job: &JobInvocation) -> Result<(), JobError> {
        let output = self.invoker.invoke(&job.args).await?;

        // Logged once, after termination, rather than streamed
        if !output.stderr.is_empty() {
            info!(job = %job.name, stderr = %output.stderr, "Process stderr");
        }

        if output.success() {
            Ok(())
        } else {
            Err(JobError::Exited {
                code: output.exit_code,
                stderr: output.stderr,
            })
        }
    }

    async fn mark(job: &JobInvocation, state: MarkerState) -> Result<(), JobError> {
        let name = marker::stage_marker(&job.name, state);
        marker::touch(&job.results_dir, &name)
            .await
            .map(|_| ())
            .map_err(|source| JobError::Marker {
                path: job.results_dir.join(&name),
                source,
            })
    }
}
