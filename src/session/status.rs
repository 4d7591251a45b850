use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;

/// Name of the structured status record inside the results directory
pub const STATUS_FILE: &str = "status.json";

/// Progress of the upload phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    Uploading,
    Uploaded,
    Failed(String),
}

/// Progress of one background job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Done,
    Failed(String),
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }
}

/// Structured view of how far a meeting has progressed
///
/// Mirrors the marker files but lives in one document, so readers do not
/// have to infer state from which sentinels exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub meeting_id: String,
    pub upload: UploadState,
    /// Job name → state
    pub jobs: BTreeMap<String, JobState>,
    pub updated_at: DateTime<Utc>,
}

impl SessionStatus {
    pub fn new(meeting_id: impl Into<String>) -> Self {
        Self {
            meeting_id: meeting_id.into(),
            upload: UploadState::Uploading,
            jobs: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn upload_finished(&mut self) {
        self.upload = UploadState::Uploaded;
        self.touch();
    }

    pub fn upload_failed(&mut self, reason: impl Into<String>) {
        self.upload = UploadState::Failed(reason.into());
        self.touch();
    }

    pub fn set_job(&mut self, job: &str, state: JobState) {
        self.jobs.insert(job.to_string(), state);
        self.touch();
    }

    /// True once nothing more will happen to this meeting
    pub fn is_settled(&self) -> bool {
        match self.upload {
            UploadState::Failed(_) => true,
            UploadState::Uploading => false,
            UploadState::Uploaded => self.jobs.values().all(JobState::is_finished),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Atomically replace `<dir>/status.json`
    pub async fn persist(&self, dir: &Path) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(io::Error::other)?;
        let tmp = dir.join(format!(".{}.tmp", STATUS_FILE));
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, dir.join(STATUS_FILE)).await
    }

    /// Read `<dir>/status.json`, returning `None` when it does not exist
    pub async fn load(dir: &Path) -> io::Result<Option<Self>> {
        match tokio::fs::read(dir.join(STATUS_FILE)).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}
