//! HTTP API for meeting intake
//!
//! This module provides:
//! - POST /api/v1/upload - Store a recording and start diarization + transcription
//! - GET /meetings/:id/status - Query upload and job progress
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::tracking_url;
pub use routes::create_router;
pub use state::AppState;
