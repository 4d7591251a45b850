use super::state::AppState;
use crate::error::IntakeError;
use crate::jobs::templates;
use crate::session::marker::{self, TRANSCRIPTION_QUEUED, UPLOAD_BEGUN, UPLOAD_FINISHED};
use crate::session::{is_valid_meeting_id, SessionPaths, SessionStatus};
use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Json},
};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/upload
/// Store an uploaded meeting recording and start diarization + transcription
///
/// Responds with the tracking URL as soon as the audio is on disk; both
/// jobs keep running after the response has gone out.
#[tracing::instrument(skip_all, fields(meeting_id = tracing::field::Empty))]
pub async fn upload_meeting(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<String, IntakeError> {
    // Informational only for now; the job images are fixed
    info!(
        diarizer = ?header_value(&headers, "Diarizer"),
        transcriber = ?header_value(&headers, "Transcriber"),
        "Upload received"
    );

    let host = request_host(&headers, &uri)
        .ok_or(IntakeError::MissingHost)?
        .to_owned();

    let meeting_id = state.ids.generate();
    tracing::Span::current().record("meeting_id", meeting_id.as_str());

    let session = SessionPaths::new(&state.storage, &meeting_id);
    session.create_dirs().await.map_err(|e| {
        IntakeError::storage(&meeting_id, "Failed to create meeting directories", e)
    })?;

    let record = state
        .registry
        .open(&meeting_id, session.results_dir.clone())
        .await
        .map_err(|e| IntakeError::storage(&meeting_id, "Failed to write meeting status", e))?;
    let guard = state.registry.guard_upload(&record);

    if let Err(e) = receive_upload(&session, multipart).await {
        guard.fail(e.to_string()).await;
        return Err(e);
    }

    if let Err(e) = record.update(|s| s.upload_finished()).await {
        let e = IntakeError::storage(&meeting_id, "Failed to write meeting status", e);
        guard.fail(e.to_string()).await;
        return Err(e);
    }

    let url = tracking_url(&host, &meeting_id);

    // Kept for watchers that key off the numbered markers
    if let Err(e) = marker::touch(&session.results_dir, TRANSCRIPTION_QUEUED).await {
        let e = IntakeError::storage(&meeting_id, "Failed to write marker", e);
        guard.fail(e.to_string()).await;
        return Err(e);
    }

    let jobs = templates::meeting_jobs(&state.jobs, &session);
    state.registry.dispatch(&record, &state.runner, jobs).await;
    guard.disarm();

    info!(url = %url, "Upload stored, jobs dispatched");

    Ok(url)
}

/// Steps between `00_upload_begun` and `01_upload_finished`
async fn receive_upload(
    session: &SessionPaths,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(), IntakeError> {
    let meeting_id = session.meeting_id.as_str();

    marker::touch(&session.results_dir, UPLOAD_BEGUN)
        .await
        .map_err(|e| IntakeError::storage(meeting_id, "Failed to write marker", e))?;

    let mut multipart =
        multipart.map_err(|rejection| IntakeError::malformed(meeting_id, rejection.body_text()))?;

    let audio_path = session.audio_file();
    let mut parts = 0usize;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|source| multipart_error(meeting_id, source))?
    {
        if parts > 0 {
            // Single-part contract: a later part replaces the earlier audio
            warn!(part = parts, "Upload has more than one part, overwriting {:?}", audio_path);
        }
        parts += 1;

        let part_name = field.name().map(str::to_owned);
        let mut dst = tokio::fs::File::create(&audio_path)
            .await
            .map_err(|e| IntakeError::storage(meeting_id, "Failed to create audio file", e))?;

        let mut bytes = 0u64;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|source| multipart_error(meeting_id, source))?
        {
            dst.write_all(&chunk)
                .await
                .map_err(|e| IntakeError::storage(meeting_id, "Failed to write audio file", e))?;
            bytes += chunk.len() as u64;
        }

        dst.flush()
            .await
            .map_err(|e| IntakeError::storage(meeting_id, "Failed to write audio file", e))?;
        dst.sync_all()
            .await
            .map_err(|e| IntakeError::storage(meeting_id, "Failed to write audio file", e))?;

        debug!(part = ?part_name, bytes, "Audio part stored");
    }

    if parts == 0 {
        return Err(IntakeError::malformed(meeting_id, "No audio part in upload"));
    }

    marker::touch(&session.results_dir, UPLOAD_FINISHED)
        .await
        .map_err(|e| IntakeError::storage(meeting_id, "Failed to write marker", e))?;

    Ok(())
}

/// GET /meetings/:meeting_id/status
/// Structured progress of a meeting's upload and jobs
pub async fn get_meeting_status(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> Result<Json<SessionStatus>, IntakeError> {
    if !is_valid_meeting_id(&meeting_id) {
        return Err(IntakeError::NotFound(meeting_id));
    }

    if let Some(status) = state.registry.status(&meeting_id).await {
        return Ok(Json(status));
    }

    // Finished meetings are only on disk
    let session = SessionPaths::new(&state.storage, &meeting_id);
    match SessionStatus::load(&session.results_dir).await {
        Ok(Some(status)) => Ok(Json(status)),
        Ok(None) => Err(IntakeError::NotFound(meeting_id)),
        Err(e) => Err(IntakeError::storage(&meeting_id, "Failed to read meeting status", e)),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

// ============================================================================
// Helpers
// ============================================================================

/// `https://<host without port>?meeting=<id>`
pub fn tracking_url(host: &str, meeting_id: &str) -> String {
    format!("https://{}?meeting={}", strip_port(host), meeting_id)
}

fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 literal, e.g. `[::1]:8080`
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }

    host.split(':').next().unwrap_or(host)
}

/// The `Host` header, or the URI authority for HTTP/2 requests
///
/// Forwarding headers (`Forwarded`, `X-Forwarded-Host`) are not consulted.
fn request_host<'a>(headers: &'a HeaderMap, uri: &'a Uri) -> Option<&'a str> {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .filter(|host| !host.is_empty())
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn multipart_error(
    meeting_id: &str,
    source: axum::extract::multipart::MultipartError,
) -> IntakeError {
    IntakeError::Multipart {
        meeting_id: meeting_id.to_string(),
        source,
    }
}
