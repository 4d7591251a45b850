use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

/// JSON body returned for every failed request
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_id: Option<String>,
}

/// Failures scoped to a single HTTP request
///
/// None of these take the server down; each is logged with the meeting id
/// and turned into an error response for the caller only.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("{context}: {source}")]
    Storage {
        meeting_id: String,
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed upload: {reason}")]
    MalformedUpload { meeting_id: String, reason: String },

    #[error("Failed to read upload: {source}")]
    Multipart {
        meeting_id: String,
        #[source]
        source: MultipartError,
    },

    #[error("Meeting {0} not found")]
    NotFound(String),

    #[error("Request has no Host")]
    MissingHost,
}

impl IntakeError {
    pub fn storage(meeting_id: &str, context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Storage {
            meeting_id: meeting_id.to_string(),
            context: context.into(),
            source,
        }
    }

    pub fn malformed(meeting_id: &str, reason: impl Into<String>) -> Self {
        Self::MalformedUpload {
            meeting_id: meeting_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn meeting_id(&self) -> Option<&str> {
        match self {
            Self::Storage { meeting_id, .. }
            | Self::MalformedUpload { meeting_id, .. }
            | Self::Multipart { meeting_id, .. } => Some(meeting_id),
            Self::NotFound(id) => Some(id),
            Self::MissingHost => None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MalformedUpload { .. } => StatusCode::BAD_REQUEST,
            Self::Multipart { source, .. } => source.status(),
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MissingHost => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for IntakeError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(meeting_id = ?self.meeting_id(), error = %self, "Request failed");
        } else {
            tracing::warn!(meeting_id = ?self.meeting_id(), error = %self, "Request rejected");
        }

        let meeting_id = match &self {
            Self::NotFound(_) => None,
            other => other.meeting_id().map(str::to_owned),
        };

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
                meeting_id,
            }),
        )
            .into_response()
    }
}
