use std::path::PathBuf;
use thiserror::Error;

/// Why a background job did not reach its `_ended` marker
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Failed to write marker {path:?}: {source}")]
    Marker {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process exited with {}", describe_exit(.code))]
    Exited { code: Option<i32>, stderr: String },

    #[error("Process still running after {secs}s, killed")]
    TimedOut { secs: u64 },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}
