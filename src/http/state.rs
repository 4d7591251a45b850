use crate::config::{Config, JobsConfig, StorageConfig};
use crate::jobs::{ContainerInvoker, JobRegistry, JobRunner, ProcessInvoker};
use crate::session::{IdGenerator, UuidGenerator};
use std::sync::Arc;
use std::time::Duration;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Meeting id source
    pub ids: Arc<dyn IdGenerator>,

    /// Runs diarization/transcription jobs
    pub runner: JobRunner,

    /// Meetings with jobs in flight (meeting_id → record)
    pub registry: Arc<JobRegistry>,

    pub storage: Arc<StorageConfig>,
    pub jobs: Arc<JobsConfig>,
}

impl AppState {
    pub fn new(
        storage: StorageConfig,
        jobs: JobsConfig,
        ids: Arc<dyn IdGenerator>,
        invoker: Arc<dyn ProcessInvoker>,
    ) -> Self {
        Self {
            ids,
            runner: JobRunner::new(invoker),
            registry: Arc::new(JobRegistry::new()),
            storage: Arc::new(storage),
            jobs: Arc::new(jobs),
        }
    }

    /// Production wiring: UUID ids and the configured container runner
    pub fn from_config(config: &Config) -> Self {
        let invoker = ContainerInvoker::new(config.jobs.program.clone())
            .with_timeout(config.jobs.timeout_secs.map(Duration::from_secs));

        Self::new(
            config.storage.clone(),
            config.jobs.clone(),
            Arc::new(UuidGenerator),
            Arc::new(invoker),
        )
    }
}
