pub mod config;
pub mod error;
pub mod http;
pub mod jobs;
pub mod session;

pub use config::Config;
pub use error::IntakeError;
pub use http::{create_router, AppState};
pub use jobs::{ContainerInvoker, JobError, JobInvocation, JobRegistry, JobRunner, ProcessInvoker};
pub use session::{IdGenerator, SessionPaths, SessionStatus, UuidGenerator};
