//! JSON payloads exchanged with the analysis service.
use serde::{Deserialize, Serialize};

use crate::{ApiError, Artifact, CheckResponse, FailureKind, JobStatus, TaskId};

const DEFAULT_FAILURE: &str = "analysis failed";

#[derive(Debug, Serialize)]
pub(crate) struct ScrapeBody<'a> {
    pub prompt: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StartReply {
    task_id: String,
}

impl StartReply {
    pub fn into_task_id(self) -> Result<TaskId, ApiError> {
        let id = self.task_id.trim();
        if id.is_empty() {
            return Err(ApiError::new(FailureKind::Decode, "empty task_id"));
        }
        Ok(TaskId::new(id))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum WireState {
    Pending,
    Failed,
    Complete,
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    status: WireState,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    status_message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl StatusPayload {
    fn into_status(self) -> JobStatus {
        // Missing and explicit null fields read the same.
        let progress = clamp_progress(self.progress.unwrap_or_default());
        let message = self.status_message.unwrap_or_default();
        match self.status {
            WireState::Pending => JobStatus::Pending { progress, message },
            WireState::Complete => JobStatus::Complete { progress, message },
            WireState::Failed => {
                let error = self
                    .error
                    .map(|err| err.trim().to_string())
                    .filter(|err| !err.is_empty())
                    .unwrap_or_else(|| DEFAULT_FAILURE.to_string());
                JobStatus::Failed {
                    progress,
                    message,
                    error,
                }
            }
        }
    }
}

fn clamp_progress(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

/// True for `application/json`, legacy `text/json` and structured `+json` media types.
pub(crate) fn is_json_content_type(content_type: Option<&str>) -> bool {
    let Some(ct) = content_type else {
        return false;
    };
    let essence = ct.split(';').next().unwrap_or(ct).trim();
    essence.eq_ignore_ascii_case("application/json")
        || essence.eq_ignore_ascii_case("text/json")
        || essence.to_ascii_lowercase().ends_with("+json")
}

pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
}

/// Decode a successful status-check body by its declared content type.
///
/// JSON bodies become [`CheckResponse::Status`]; anything else is the finished document.
pub fn decode_check_body(
    content_type: Option<&str>,
    body: Vec<u8>,
) -> Result<CheckResponse, ApiError> {
    if is_json_content_type(content_type) {
        let payload: StatusPayload = decode_json(&body)?;
        return Ok(CheckResponse::Status(payload.into_status()));
    }
    if body.is_empty() {
        return Err(ApiError::new(FailureKind::Decode, "empty document body"));
    }
    Ok(CheckResponse::Artifact(Artifact {
        bytes: body,
        content_type: content_type.map(str::to_string),
    }))
}
