//! Per-meeting bookkeeping
//!
//! A meeting (one uploaded recording) is identified by an opaque id that
//! names:
//! - `<sound_root>/<id>/meeting.wav` - the uploaded audio
//! - `<results_root>/<id>/` - progress markers, `status.json` and job output

pub mod id;
pub mod marker;
pub mod paths;
pub mod status;

pub use id::{IdGenerator, UuidGenerator};
pub use marker::MarkerState;
pub use paths::{is_valid_meeting_id, SessionPaths, AUDIO_FILE_NAME};
pub use status::{JobState, SessionStatus, UploadState, STATUS_FILE};
