// Integration tests for running external jobs
//
// A stub invoker stands in for the container runner and records what it
// saw, including whether the `_begun` marker was already on disk.

use anyhow::Result;
use meeting_intake::jobs::{
    JobError, JobInvocation, JobRegistry, JobRunner, ProcessInvoker, ProcessOutput,
};
use meeting_intake::session::{JobState, SessionStatus, UploadState};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Debug, Clone)]
struct Call {
    args: Vec<String>,
    begun_marker_present: bool,
}

/// Returns a fixed outcome and records each call
struct RecordingInvoker {
    watch_marker: PathBuf,
    outcome: Outcome,
    calls: Mutex<Vec<Call>>,
}

#[derive(Clone, Copy)]
enum Outcome {
    Exit(i32),
    LaunchFailure,
}

impl RecordingInvoker {
    fn new(watch_marker: PathBuf, outcome: Outcome) -> Arc<Self> {
        Arc::new(Self {
            watch_marker,
            outcome,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ProcessInvoker for RecordingInvoker {
    async fn invoke(&self, args: &[String]) -> Result<ProcessOutput, JobError> {
        self.calls.lock().unwrap().push(Call {
            args: args.to_vec(),
            begun_marker_present: self.watch_marker.exists(),
        });

        match self.outcome {
            Outcome::Exit(code) => Ok(ProcessOutput {
                exit_code: Some(code),
                stderr: format!("exited {}\n", code),
            }),
            Outcome::LaunchFailure => Err(JobError::Launch {
                program: "docker".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            }),
        }
    }
}

/// Collects formatted log output from the current thread's subscriber
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn invocation(name: &str, results_dir: &Path, args: &[&str]) -> JobInvocation {
    JobInvocation {
        name: name.to_string(),
        results_dir: results_dir.to_path_buf(),
        args: args.iter().map(|a| a.to_string()).collect(),
    }
}

#[tokio::test]
async fn test_begun_marker_written_before_invoke() -> Result<()> {
    let dir = TempDir::new()?;
    let invoker = RecordingInvoker::new(dir.path().join("diarization_begun"), Outcome::Exit(0));
    let runner = JobRunner::new(invoker.clone());

    let args = ["run", "--volume=/a:/b", "image", "input.wav", "-o", "out.txt"];
    runner
        .run(&invocation("diarization", dir.path(), &args))
        .await?;

    let calls = invoker.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].begun_marker_present);
    assert_eq!(calls[0].args, args);

    Ok(())
}

#[tokio::test]
async fn test_success_writes_ended_marker() -> Result<()> {
    let dir = TempDir::new()?;
    let invoker = RecordingInvoker::new(dir.path().join("transcription_begun"), Outcome::Exit(0));
    let runner = JobRunner::new(invoker);

    runner
        .run(&invocation("transcription", dir.path(), &["run"]))
        .await?;

    assert!(dir.path().join("transcription_begun").exists());
    assert!(dir.path().join("transcription_ended").exists());
    assert!(!dir.path().join("transcription_failed").exists());
    assert_eq!(std::fs::metadata(dir.path().join("transcription_ended"))?.len(), 0);

    Ok(())
}

#[tokio::test]
async fn test_nonzero_exit_is_failure() -> Result<()> {
    let dir = TempDir::new()?;
    let invoker = RecordingInvoker::new(dir.path().join("diarization_begun"), Outcome::Exit(2));
    let runner = JobRunner::new(invoker);

    let result = runner
        .run(&invocation("diarization", dir.path(), &["run"]))
        .await;

    match result {
        Err(JobError::Exited { code, stderr }) => {
            assert_eq!(code, Some(2));
            assert_eq!(stderr, "exited 2\n");
        }
        other => panic!("expected Exited, got {:?}", other),
    }
    assert!(dir.path().join("diarization_begun").exists());
    assert!(dir.path().join("diarization_failed").exists());
    assert!(!dir.path().join("diarization_ended").exists());

    Ok(())
}

#[tokio::test]
async fn test_launch_failure_is_failure() -> Result<()> {
    let dir = TempDir::new()?;
    let invoker =
        RecordingInvoker::new(dir.path().join("diarization_begun"), Outcome::LaunchFailure);
    let runner = JobRunner::new(invoker);

    let result = runner
        .run(&invocation("diarization", dir.path(), &["run"]))
        .await;

    assert!(matches!(result, Err(JobError::Launch { .. })));
    assert!(dir.path().join("diarization_failed").exists());
    assert!(!dir.path().join("diarization_ended").exists());

    Ok(())
}

#[tokio::test]
async fn test_unwritable_results_dir_skips_launch() -> Result<()> {
    let dir = TempDir::new()?;
    let missing = dir.path().join("missing");
    let invoker = RecordingInvoker::new(missing.join("diarization_begun"), Outcome::Exit(0));
    let runner = JobRunner::new(invoker.clone());

    let result = runner
        .run(&invocation("diarization", &missing, &["run"]))
        .await;

    assert!(matches!(result, Err(JobError::Marker { .. })));
    assert!(invoker.calls().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_failure_does_not_affect_other_session() -> Result<()> {
    let failing_dir = TempDir::new()?;
    let healthy_dir = TempDir::new()?;

    let failing = JobRunner::new(RecordingInvoker::new(
        failing_dir.path().join("diarization_begun"),
        Outcome::Exit(1),
    ));
    let healthy = JobRunner::new(RecordingInvoker::new(
        healthy_dir.path().join("diarization_begun"),
        Outcome::Exit(0),
    ));

    let failing_job = invocation("diarization", failing_dir.path(), &["run"]);
    let healthy_job = invocation("diarization", healthy_dir.path(), &["run"]);
    let (failed, succeeded) = tokio::join!(failing.run(&failing_job), healthy.run(&healthy_job));

    assert!(failed.is_err());
    assert!(succeeded.is_ok());
    assert!(healthy_dir.path().join("diarization_ended").exists());

    Ok(())
}

#[tokio::test]
async fn test_registry_tracks_jobs_until_settled() -> Result<()> {
    let dir = TempDir::new()?;
    let registry = Arc::new(JobRegistry::new());
    let runner = JobRunner::new(RecordingInvoker::new(
        dir.path().join("unused"),
        Outcome::Exit(0),
    ));

    let record = registry.open("meeting-1", dir.path().to_path_buf()).await?;
    assert_eq!(
        registry.status("meeting-1").await.map(|s| s.upload),
        Some(UploadState::Uploading)
    );

    record.update(|s| s.upload_finished()).await?;
    registry
        .dispatch(
            &record,
            &runner,
            [
                invocation("diarization", dir.path(), &["run", "a"]),
                invocation("transcription", dir.path(), &["run", "b"]),
            ],
        )
        .await;

    registry.wait("meeting-1").await;

    assert_eq!(registry.active_meetings().await, 0);
    assert!(registry.status("meeting-1").await.is_none());

    let persisted = SessionStatus::load(dir.path()).await?.expect("status.json");
    assert_eq!(persisted.upload, UploadState::Uploaded);
    assert_eq!(persisted.jobs.get("diarization"), Some(&JobState::Done));
    assert_eq!(persisted.jobs.get("transcription"), Some(&JobState::Done));
    assert!(persisted.is_settled());

    Ok(())
}

#[tokio::test]
async fn test_registry_records_job_failure() -> Result<()> {
    let dir = TempDir::new()?;
    let registry = Arc::new(JobRegistry::new());
    let runner = JobRunner::new(RecordingInvoker::new(
        dir.path().join("unused"),
        Outcome::Exit(137),
    ));

    let record = registry.open("meeting-2", dir.path().to_path_buf()).await?;
    record.update(|s| s.upload_finished()).await?;
    registry
        .dispatch(&record, &runner, [invocation("diarization", dir.path(), &["run"])])
        .await;
    registry.wait_all().await;

    let persisted = SessionStatus::load(dir.path()).await?.expect("status.json");
    assert_eq!(
        persisted.jobs.get("diarization"),
        Some(&JobState::Failed("Process exited with exit code 137".to_string()))
    );

    Ok(())
}

#[tokio::test]
async fn test_job_logs_carry_meeting_id() -> Result<()> {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer({
            let logs = logs.clone();
            move || logs.clone()
        })
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    // Current-thread runtime: spawned jobs run on this thread
    let _default = tracing::subscriber::set_default(subscriber);

    let dir = TempDir::new()?;
    let registry = Arc::new(JobRegistry::new());
    let runner = JobRunner::new(RecordingInvoker::new(
        dir.path().join("unused"),
        Outcome::Exit(1),
    ));

    let record = registry.open("meeting-3", dir.path().to_path_buf()).await?;
    record.update(|s| s.upload_finished()).await?;
    registry
        .dispatch(&record, &runner, [invocation("diarization", dir.path(), &["run"])])
        .await;
    registry.wait_all().await;

    let output = logs.contents();
    for message in ["Job started", "Process stderr", "Job failed"] {
        let line = output
            .lines()
            .find(|l| l.contains(message))
            .unwrap_or_else(|| panic!("no {:?} line in:\n{}", message, output));
        assert!(line.contains("meeting_id=meeting-3"), "{}", line);
    }

    Ok(())
}

#[tokio::test]
async fn test_upload_guard_marks_abandoned_upload_failed() -> Result<()> {
    let dir = TempDir::new()?;
    let registry = Arc::new(JobRegistry::new());

    let record = registry.open("meeting-4", dir.path().to_path_buf()).await?;
    let guard = registry.guard_upload(&record);
    drop(guard);

    // Cleanup runs on a spawned task
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while registry.active_meetings().await > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await?;

    let persisted = SessionStatus::load(dir.path()).await?.expect("status.json");
    assert!(matches!(persisted.upload, UploadState::Failed(_)));

    // A disarmed guard leaves the meeting alone
    let other = TempDir::new()?;
    let record = registry.open("meeting-5", other.path().to_path_buf()).await?;
    registry.guard_upload(&record).disarm();
    tokio::task::yield_now().await;
    assert_eq!(registry.active_meetings().await, 1);

    Ok(())
}
