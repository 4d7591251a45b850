//! External analysis jobs
//!
//! Each uploaded meeting gets two jobs, diarization and transcription,
//! run as containers against the stored recording:
//! - `ProcessInvoker` - launches the container runner and waits for it
//! - `JobRunner` - brackets one launch with `<job>_begun` / `<job>_ended` markers
//! - `JobRegistry` - keeps task handles and status per meeting, and guards
//!   uploads still in progress

mod error;
mod invoker;
mod registry;
mod runner;
pub mod templates;

pub use error::JobError;
pub use invoker::{ContainerInvoker, ProcessInvoker, ProcessOutput};
pub use registry::{JobRegistry, MeetingRecord, UploadGuard};
pub use runner::{JobInvocation, JobRunner};
