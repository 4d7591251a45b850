use super::runner::{JobInvocation, JobRunner};
use crate::session::{JobState, SessionStatus};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn, Instrument};

/// In-memory state of one meeting while it still has work in flight
pub struct MeetingRecord {
    meeting_id: String,
    results_dir: PathBuf,
    status: Mutex<SessionStatus>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MeetingRecord {
    pub fn meeting_id(&self) -> &str {
        &self.meeting_id
    }

    /// Apply a transition and persist it to `status.json`
    ///
    /// Updates are serialized per meeting, so concurrent jobs never
    /// interleave writes of the status file.
    pub async fn update<F>(&self, f: F) -> io::Result<()>
    where
        F: FnOnce(&mut SessionStatus),
    {
        let mut status = self.status.lock().await;
        f(&mut status);
        status.persist(&self.results_dir).await
    }

    pub async fn snapshot(&self) -> SessionStatus {
        self.status.lock().await.clone()
    }

    async fn set_job(&self, job: &str, state: JobState) {
        if let Err(e) = self.update(|s| s.set_job(job, state)).await {
            warn!(meeting_id = %self.meeting_id, job = %job, error = %e, "Failed to persist job status");
        }
    }
}

/// Process-wide registry of meetings with background jobs
///
/// Each dispatched job keeps its `JoinHandle` here, keyed by meeting id, so
/// callers can query progress or wait for completion. Meetings leave the
/// registry once all their jobs have finished; their `status.json` stays
/// on disk.
#[derive(Default)]
pub struct JobRegistry {
    meetings: RwLock<HashMap<String, Arc<MeetingRecord>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a meeting whose upload has just begun
    pub async fn open(&self, meeting_id: &str, results_dir: PathBuf) -> io::Result<Arc<MeetingRecord>> {
        let status = SessionStatus::new(meeting_id);
        status.persist(&results_dir).await?;

        let record = Arc::new(MeetingRecord {
            meeting_id: meeting_id.to_string(),
            results_dir,
            status: Mutex::new(status),
            tasks: Mutex::new(Vec::new()),
        });

        let mut meetings = self.meetings.write().await;
        meetings.insert(meeting_id.to_string(), Arc::clone(&record));

        Ok(record)
    }

    pub async fn get(&self, meeting_id: &str) -> Option<Arc<MeetingRecord>> {
        let meetings = self.meetings.read().await;
        meetings.get(meeting_id).cloned()
    }

    pub async fn status(&self, meeting_id: &str) -> Option<SessionStatus> {
        match self.get(meeting_id).await {
            Some(record) => Some(record.snapshot().await),
            None => None,
        }
    }

    /// Guard an upload in progress
    ///
    /// Unless the guard is disarmed, dropping it (e.g. because the client
    /// went away and the handler future was dropped) marks the upload failed
    /// and stops tracking the meeting.
    pub fn guard_upload(self: &Arc<Self>, record: &Arc<MeetingRecord>) -> UploadGuard {
        UploadGuard {
            registry: Arc::clone(self),
            record: Arc::clone(record),
            armed: true,
        }
    }

    /// Record an upload failure and stop tracking the meeting
    pub async fn abandon(&self, record: &MeetingRecord, reason: impl Into<String>) {
        let reason = reason.into();
        if let Err(e) = record.update(|s| s.upload_failed(reason)).await {
            warn!(meeting_id = %record.meeting_id, error = %e, "Failed to record upload failure");
        }
        self.remove(&record.meeting_id).await;
    }

    /// Stop tracking a meeting
    pub async fn remove(&self, meeting_id: &str) {
        let mut meetings = self.meetings.write().await;
        meetings.remove(meeting_id);
    }

    /// Number of meetings that still have jobs in flight
    pub async fn active_meetings(&self) -> usize {
        self.meetings.read().await.len()
    }

    /// Spawn every job as an independent task
    ///
    /// All jobs are marked pending before any starts, so a fast job can
    /// never make the meeting look settled while its sibling is queued.
    pub async fn dispatch(
        self: &Arc<Self>,
        record: &Arc<MeetingRecord>,
        runner: &JobRunner,
        jobs: impl IntoIterator<Item = JobInvocation>,
    ) {
        let jobs: Vec<JobInvocation> = jobs.into_iter().collect();

        let queued = record
            .update(|s| {
                for job in &jobs {
                    s.set_job(&job.name, JobState::Pending);
                }
            })
            .await;
        if let Err(e) = queued {
            warn!(meeting_id = %record.meeting_id, error = %e, "Failed to persist queued jobs");
        }

        let mut handles = Vec::with_capacity(jobs.len());
        for job in jobs {
            let registry = Arc::clone(self);
            let record = Arc::clone(record);
            let runner = runner.clone();
            let span = tracing::info_span!("job", meeting_id = %record.meeting_id, job = %job.name);

            let task = async move {
                record.set_job(&job.name, JobState::Running).await;

                let state = match runner.run(&job).await {
                    Ok(()) => JobState::Done,
                    Err(e) => JobState::Failed(e.to_string()),
                };
                record.set_job(&job.name, state).await;

                registry.release_if_settled(&record).await;
            };
            handles.push(tokio::spawn(task.instrument(span)));
        }

        record.tasks.lock().await.extend(handles);
    }

    async fn release_if_settled(&self, record: &MeetingRecord) {
        if record.snapshot().await.is_settled() {
            debug!(meeting_id = %record.meeting_id, "All jobs finished");
            self.remove(&record.meeting_id).await;
        }
    }

    /// Wait for every job dispatched for `meeting_id` so far
    pub async fn wait(&self, meeting_id: &str) {
        if let Some(record) = self.get(meeting_id).await {
            Self::join(&record).await;
        }
    }

    /// Wait for every in-flight job of every meeting
    pub async fn wait_all(&self) {
        let records: Vec<Arc<MeetingRecord>> = {
            let meetings = self.meetings.read().await;
            meetings.values().cloned().collect()
        };

        futures::future::join_all(records.iter().map(|r| Self::join(r))).await;
    }

    async fn join(record: &MeetingRecord) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *record.tasks.lock().await);

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!(meeting_id = %record.meeting_id, "Job task panicked: {}", e);
            }
        }
    }
}

/// Returned by [`JobRegistry::guard_upload`]
pub struct UploadGuard {
    registry: Arc<JobRegistry>,
    record: Arc<MeetingRecord>,
    armed: bool,
}

impl UploadGuard {
    /// The upload was stored; the meeting stays in the registry
    pub fn disarm(mut self) {
        self.armed = false;
    }

    /// Mark the upload failed with `reason` and release the meeting
    pub async fn fail(mut self, reason: impl Into<String>) {
        self.armed = false;
        self.registry.abandon(&self.record, reason).await;
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let meeting_id = self.record.meeting_id.clone();
        let registry = Arc::clone(&self.registry);
        let record = Arc::clone(&self.record);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(meeting_id = %meeting_id, "Upload abandoned before completion");
                handle.spawn(async move {
                    registry.abandon(&record, "Upload aborted before completion").await;
                });
            }
            Err(_) => {
                error!(meeting_id = %meeting_id, "Upload abandoned outside a runtime, status not updated");
            }
        }
    }
}
