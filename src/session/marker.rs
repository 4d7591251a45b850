//! Zero-byte progress markers
//!
//! Markers are only ever created, never removed or rewritten, so the
//! results directory doubles as an append-only audit trail that external
//! tools can watch.

use std::path::{Path, PathBuf};
use tracing::debug;

pub const UPLOAD_BEGUN: &str = "00_upload_begun";
pub const UPLOAD_FINISHED: &str = "01_upload_finished";
pub const TRANSCRIPTION_QUEUED: &str = "03_transcription_begun";

/// Stage suffixes used by background jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerState {
    Begun,
    Ended,
    Failed,
}

impl MarkerState {
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Begun => "begun",
            Self::Ended => "ended",
            Self::Failed => "failed",
        }
    }
}

/// `<stage>_<state>`, e.g. `diarization_begun`
pub fn stage_marker(stage: &str, state: MarkerState) -> String {
    format!("{}_{}", stage, state.suffix())
}

/// Create an empty marker file and close it immediately
pub async fn touch(dir: &Path, name: &str) -> std::io::Result<PathBuf> {
    let path = dir.join(name);
    let file = tokio::fs::File::create(&path).await?;
    drop(file);
    debug!(marker = %path.display(), "Marker written");
    Ok(path)
}
