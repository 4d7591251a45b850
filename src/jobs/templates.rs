//! Argument vectors for the two analysis containers
//!
//! Both containers see the shared volume at `container_root`, laid out as
//! `soundFiles/<id>/meeting.wav` for input and `diarizationResults/<id>/`
//! for output.

use super::runner::JobInvocation;
use crate::config::JobsConfig;
use crate::session::{SessionPaths, AUDIO_FILE_NAME};

pub const DIARIZATION: &str = "diarization";
pub const TRANSCRIPTION: &str = "transcription";

const SOUND_SUBDIR: &str = "soundFiles";
const RESULTS_SUBDIR: &str = "diarizationResults";

const DIARIZER_WORKDIR: &str = "/speaker-diarization";
const DIARIZER_SCRIPT: &str = "/speaker-diarization/spk-diarization2.py";

const TRANSCRIBER_CLASSPATH: &str = "/sphinx4-5prealpha-src/sphinx4-core/build/libs/sphinx4-core-5prealpha-SNAPSHOT.jar:/sphinx4-5prealpha-src/sphinx4-data/build/libs/sphinx4-data-5prealpha-SNAPSHOT.jar:.";
const TRANSCRIBER_CLASS: &str = "Transcriber";

fn container_audio_path(cfg: &JobsConfig, meeting_id: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        cfg.container_root, SOUND_SUBDIR, meeting_id, AUDIO_FILE_NAME
    )
}

fn container_output_path(cfg: &JobsConfig, meeting_id: &str, file: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        cfg.container_root, RESULTS_SUBDIR, meeting_id, file
    )
}

pub fn diarization_args(cfg: &JobsConfig, meeting_id: &str) -> Vec<String> {
    vec![
        "run".to_string(),
        format!("--volume={}", cfg.volume),
        format!("--workdir={}", DIARIZER_WORKDIR),
        cfg.diarizer_image.clone(),
        DIARIZER_SCRIPT.to_string(),
        container_audio_path(cfg, meeting_id),
        "-o".to_string(),
        container_output_path(cfg, meeting_id, "diarization.txt"),
    ]
}

pub fn transcription_args(cfg: &JobsConfig, meeting_id: &str) -> Vec<String> {
    vec![
        "run".to_string(),
        format!("--volume={}", cfg.volume),
        cfg.transcriber_image.clone(),
        "java".to_string(),
        "-Xmx2g".to_string(),
        "-cp".to_string(),
        TRANSCRIBER_CLASSPATH.to_string(),
        TRANSCRIBER_CLASS.to_string(),
        container_audio_path(cfg, meeting_id),
        container_output_path(cfg, meeting_id, "transcription.txt"),
    ]
}

/// Both jobs for one meeting, diarization first
pub fn meeting_jobs(cfg: &JobsConfig, session: &SessionPaths) -> [JobInvocation; 2] {
    [
        JobInvocation {
            name: DIARIZATION.to_string(),
            results_dir: session.results_dir.clone(),
            args: diarization_args(cfg, &session.meeting_id),
        },
        JobInvocation {
            name: TRANSCRIPTION.to_string(),
            results_dir: session.results_dir.clone(),
            args: transcription_args(cfg, &session.meeting_id),
        },
    ]
}
