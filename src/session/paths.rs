use crate::config::StorageConfig;
use std::path::PathBuf;

/// Fixed name of the uploaded recording inside the sound directory
pub const AUDIO_FILE_NAME: &str = "meeting.wav";

/// On-disk locations belonging to one meeting
#[derive(Debug, Clone)]
pub struct SessionPaths {
    pub meeting_id: String,
    /// `<sound_root>/<id>`
    pub sound_dir: PathBuf,
    /// `<results_root>/<id>`
    pub results_dir: PathBuf,
}

impl SessionPaths {
    pub fn new(storage: &StorageConfig, meeting_id: &str) -> Self {
        Self {
            meeting_id: meeting_id.to_string(),
            sound_dir: storage.sound_root.join(meeting_id),
            results_dir: storage.results_root.join(meeting_id),
        }
    }

    pub fn audio_file(&self) -> PathBuf {
        self.sound_dir.join(AUDIO_FILE_NAME)
    }

    pub fn marker(&self, name: &str) -> PathBuf {
        self.results_dir.join(name)
    }

    /// Create both directories, including missing parents
    pub async fn create_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.sound_dir).await?;
        tokio::fs::create_dir_all(&self.results_dir).await?;
        Ok(())
    }
}

/// Whether `id` is safe to join onto a storage root
///
/// Generated ids only ever contain ASCII alphanumerics and `-`; anything
/// else arriving from a URL is rejected before touching the filesystem.
pub fn is_valid_meeting_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
